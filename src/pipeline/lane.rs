//! Lane command formatting.
//!
//! A lane runs all of its branches in one launcher process. The command is
//! the launcher directive followed by every branch, one per continuation
//! line:
//!
//! ```text
//! gst-launch-1.0 -e \
//!   filesrc location=a.mp4 ! ... tee name=t1_1_cam1 t1_1_cam1. ! queue ! ... \
//!   filesrc location=b.mp4 ! ... tee name=t1_2_cam2 t1_2_cam2. ! queue ! ...
//! ```

use crate::error::Result;
use crate::pipeline::parser::parse_launch;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// The launcher binary every lane command starts with.
pub const LAUNCHER_BIN: &str = "gst-launch-1.0";
/// Launcher flag sending end-of-stream on interrupt.
pub const LAUNCHER_FLAGS: &str = "-e";

const CONTINUATION: &str = " \\\n  ";

/// Join a lane's branches into one launcher command.
///
/// Trailing link separators are stripped from every branch first. Returns an
/// empty string when there are no branches.
pub fn format_lane(branches: &[String]) -> String {
    let cleaned: Vec<&str> = branches
        .iter()
        .map(|b| strip_trailing_link(b))
        .filter(|b| !b.is_empty())
        .collect();
    if cleaned.is_empty() {
        return String::new();
    }
    format!(
        "{LAUNCHER_BIN} {LAUNCHER_FLAGS}{CONTINUATION}{}",
        cleaned.join(CONTINUATION)
    )
}

/// The branches of a lane command, launcher directive removed.
pub fn split_lane(command: &str) -> Vec<&str> {
    command
        .split(CONTINUATION)
        .skip(1)
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .collect()
}

fn strip_trailing_link(branch: &str) -> &str {
    let mut text = branch.trim();
    while let Some(rest) = text.strip_suffix('!') {
        text = rest.trim_end();
    }
    text
}

/// Wrap one branch so every element sits on its own line.
///
/// Linked elements end in ` ! \`; a chain that continues from a fan-out
/// starts on a fresh line with its `name.` reference.
pub fn format_multiline(branch: &str) -> Result<String> {
    let parsed = parse_launch(strip_trailing_link(branch))?;
    let mut lines = Vec::new();
    for chain in &parsed.chains {
        if let Some(origin) = &chain.origin {
            lines.push(format!("{origin}. !"));
        }
        let count = chain.elements.len();
        for (i, element) in chain.elements.iter().enumerate() {
            if i + 1 < count {
                lines.push(format!("{element} !"));
            } else {
                lines.push(element.to_string());
            }
        }
    }

    let last = lines.len().saturating_sub(1);
    Ok(lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let indent = if i == 0 { "" } else { "  " };
            let tail = if i < last { " \\" } else { "" };
            format!("{indent}{line}{tail}")
        })
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Lane name to launcher command, in lane order.
///
/// Serializes as a JSON object whose keys keep the order of the camera
/// document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaneCommands {
    entries: Vec<(String, String)>,
}

impl LaneCommands {
    /// No lanes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a lane; lanes keep insertion order.
    pub fn push(&mut self, lane: impl Into<String>, command: impl Into<String>) {
        self.entries.push((lane.into(), command.into()));
    }

    /// Command for a lane.
    pub fn get(&self, lane: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == lane)
            .map(|(_, cmd)| cmd.as_str())
    }

    /// Iterate `(lane, command)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(l, c)| (l.as_str(), c.as_str()))
    }

    /// Number of lanes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no lane produced a command.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pretty JSON object, two-space indent.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Serialize for LaneCommands {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (lane, command) in &self.entries {
            map.serialize_entry(lane, command)?;
        }
        map.end()
    }
}
