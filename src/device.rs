//! Per-device environment profiles.
//!
//! Each device class has a dotenv-style profile file (`all-cpu.env`,
//! `all-gpu.env`, `all-npu.env`) whose values are spliced into the elements
//! that run on that device. Profiles are read once, when
//! [`DeviceProfiles::load`] is called; lookups afterwards never touch the
//! filesystem and never fail.

use crate::element::{Element, ElementKind, PropertyValue};
use crate::error::{Error, Result};
use crate::pipeline::parser::{parse_chain, parse_properties};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use winnow::Parser;
use winnow::ascii::{space0, space1};
use winnow::combinator::{alt, delimited, opt, preceded};
use winnow::error::ContextError;
use winnow::token::{rest, take_till, take_while};

type WResult<T> = std::result::Result<T, ContextError>;

/// Profile key overriding the decode element(s).
pub const DECODE: &str = "DECODE";
/// Profile key with detector pre-processing options.
pub const PRE_PROCESS: &str = "PRE_PROCESS";
/// Profile key with extra detector options.
pub const DETECTION_OPTIONS: &str = "DETECTION_OPTIONS";
/// Profile key with classifier pre-processing options.
pub const CLASSIFICATION_PRE_PROCESS: &str = "CLASSIFICATION_PRE_PROCESS";

/// Device classes with a profile file, and the file name.
pub const PROFILE_FILES: [(&str, &str); 3] = [
    ("CPU", "all-cpu.env"),
    ("NPU", "all-npu.env"),
    ("GPU", "all-gpu.env"),
];

static EMPTY: DeviceEnv = DeviceEnv {
    vars: BTreeMap::new(),
};

/// Option name to value mapping for one device.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceEnv {
    vars: BTreeMap<String, String>,
}

impl DeviceEnv {
    /// Build from explicit pairs.
    pub fn from_pairs<K: Into<String>, V: Into<String>>(
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Parse profile file text.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(Self {
            vars: parse_profile(text)?,
        })
    }

    /// Raw value of an option.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Whether the profile is empty.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Decode element(s) for branches starting on this device.
    ///
    /// Falls back to `decodebin` when unset or empty. A value that does not
    /// parse as a chain is kept as one verbatim fragment.
    pub fn decode(&self) -> Vec<Element> {
        match self.get(DECODE).map(str::trim) {
            None | Some("") => vec![Element::of_kind(ElementKind::DecodeBin)],
            Some(text) => parse_chain(text).unwrap_or_else(|e| {
                tracing::debug!(value = %text, error = %e, "DECODE kept verbatim");
                vec![Element::verbatim(text)]
            }),
        }
    }

    /// Detector pre-processing options.
    pub fn pre_process(&self) -> ProfileOptions {
        self.options(PRE_PROCESS)
    }

    /// Extra detector options.
    pub fn detection_options(&self) -> ProfileOptions {
        self.options(DETECTION_OPTIONS)
    }

    /// Classifier pre-processing options.
    pub fn classification_pre_process(&self) -> ProfileOptions {
        self.options(CLASSIFICATION_PRE_PROCESS)
    }

    fn options(&self, key: &str) -> ProfileOptions {
        let Some(text) = self.get(key) else {
            return ProfileOptions::Typed(Vec::new());
        };
        match parse_properties(text) {
            Ok(props) => ProfileOptions::Typed(props),
            Err(e) => {
                tracing::debug!(key, value = %text, error = %e, "profile options kept verbatim");
                ProfileOptions::Verbatim(text.trim().to_string())
            }
        }
    }
}

/// Options read from one profile key.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileOptions {
    /// `key=value` pairs.
    Typed(Vec<(String, PropertyValue)>),
    /// Text that is not a plain property list, appended as written.
    Verbatim(String),
}

impl ProfileOptions {
    /// Append the options to an element.
    pub fn apply_to(self, element: Element) -> Element {
        match self {
            ProfileOptions::Typed(props) => element.with_all(props),
            ProfileOptions::Verbatim(text) => element.with_raw(text),
        }
    }
}

/// Profiles for every known device class.
#[derive(Debug, Clone, Default)]
pub struct DeviceProfiles {
    profiles: HashMap<String, DeviceEnv>,
}

impl DeviceProfiles {
    /// No profiles at all; every device resolves to an empty mapping.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Read every profile file present under `dir`.
    ///
    /// Missing or unreadable files are skipped.
    pub fn load(dir: &Path) -> Self {
        let mut profiles = HashMap::new();
        for (device, file) in PROFILE_FILES {
            let path = dir.join(file);
            let text = match fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    tracing::debug!(device, path = %path.display(), error = %e, "no device profile");
                    continue;
                }
            };
            match DeviceEnv::parse(&text) {
                Ok(env) => {
                    tracing::debug!(device, keys = env.vars.len(), "loaded device profile");
                    profiles.insert(device.to_string(), env);
                }
                Err(e) => {
                    tracing::warn!(device, path = %path.display(), error = %e, "skipping malformed device profile");
                }
            }
        }
        Self { profiles }
    }

    /// Register a profile for a device class.
    pub fn insert(&mut self, device: &str, env: DeviceEnv) {
        self.profiles.insert(device.to_uppercase(), env);
    }

    /// The profile for a device, matched case-insensitively.
    ///
    /// Unknown devices resolve to an empty mapping.
    pub fn resolve(&self, device: &str) -> &DeviceEnv {
        self.profiles.get(&device.to_uppercase()).unwrap_or(&EMPTY)
    }
}

/// Parse dotenv-style text into a key/value map.
///
/// Supports `KEY=VALUE`, an optional `export ` prefix, `#` comment lines,
/// trailing ` #` comments on unquoted values, and single or double quotes.
pub fn parse_profile(text: &str) -> Result<BTreeMap<String, String>> {
    let mut vars = BTreeMap::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = assignment
            .parse(line)
            .map_err(|e| Error::Parse(format!("profile line {}: {e}", number + 1)))?;
        vars.insert(key, value);
    }
    Ok(vars)
}

/// Parse `[export ]KEY = value`.
fn assignment(input: &mut &str) -> WResult<(String, String)> {
    let _ = opt(("export", space1)).parse_next(input)?;
    let key: &str = take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_')
        .parse_next(input)?;
    let _ = (space0, '=', space0).parse_next(input)?;
    let value = alt((quoted, unquoted)).parse_next(input)?;
    Ok((key.to_string(), value))
}

/// A quoted value; anything after the closing quote must be a comment.
fn quoted(input: &mut &str) -> WResult<String> {
    let value: &str = alt((
        delimited('"', take_till(0.., '"'), '"'),
        delimited('\'', take_till(0.., '\''), '\''),
    ))
    .parse_next(input)?;
    let _ = space0.parse_next(input)?;
    let _ = opt(preceded('#', rest)).parse_next(input)?;
    if !input.is_empty() {
        return Err(ContextError::new());
    }
    Ok(value.to_string())
}

/// The rest of the line up to a ` #` comment.
fn unquoted(input: &mut &str) -> WResult<String> {
    if input.starts_with(['"', '\'']) {
        return Err(ContextError::new());
    }
    let line = std::mem::take(input);
    let value = match line.find(" #") {
        Some(pos) => &line[..pos],
        None => line,
    };
    Ok(value.trim().to_string())
}
