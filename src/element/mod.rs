//! Typed pipeline element descriptors.
//!
//! An [`Element`] is a factory name plus an ordered list of properties. It is
//! only turned into launch text at the formatting boundary, through its
//! [`Display`](std::fmt::Display) implementation:
//!
//! ```rust
//! use lanegen::element::Element;
//!
//! let elem = Element::new("gvametaconvert").with("format", "json");
//! assert_eq!(elem.to_string(), "gvametaconvert format=json");
//! ```
//!
//! [`ElementKind`] is the closed set of kinds a workload step may request.

mod builder;

pub use builder::{BuiltElement, ElementBuilder};

use crate::error::{Error, Result};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// A property value attached to an element.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// A string value (quoted or unquoted).
    String(String),
    /// An integer value.
    Integer(i64),
    /// A floating-point value.
    Float(f64),
    /// A boolean value.
    Bool(bool),
}

impl PropertyValue {
    /// Get as a string, converting if necessary.
    pub fn as_string(&self) -> String {
        match self {
            PropertyValue::String(s) => s.clone(),
            PropertyValue::Integer(i) => i.to_string(),
            PropertyValue::Float(f) => f.to_string(),
            PropertyValue::Bool(b) => b.to_string(),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::String(s) if needs_quotes(s) => write!(f, "\"{s}\""),
            PropertyValue::String(s) => f.write_str(s),
            PropertyValue::Integer(i) => write!(f, "{i}"),
            PropertyValue::Float(v) => write!(f, "{v}"),
            PropertyValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Values that would split the element when written bare.
fn needs_quotes(s: &str) -> bool {
    s.is_empty() || s.chars().any(|c| c.is_whitespace() || matches!(c, '!' | '"' | '\''))
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<&Path> for PropertyValue {
    fn from(p: &Path) -> Self {
        PropertyValue::String(p.display().to_string())
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Integer(i)
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        PropertyValue::Float(f)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

/// One element of a launch chain: factory name plus ordered properties.
///
/// Property order is preserved and keys may repeat (`gvaattachroi` takes one
/// `roi=` per rectangle). Launch text that does not split into typed
/// properties is carried in `raw` and written after them unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// The element factory name (e.g. "gvadetect", "queue"), or a caps string.
    pub name: String,
    /// Properties as key-value pairs, in render order.
    pub properties: Vec<(String, PropertyValue)>,
    /// Untyped launch text following the properties.
    pub raw: Vec<String>,
}

impl Element {
    /// Create an element without properties.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            raw: Vec::new(),
        }
    }

    /// Launch text rendered exactly as given, in place of one element.
    pub fn verbatim(text: impl Into<String>) -> Self {
        Self::new(text)
    }

    /// Create a bare element for a recognized kind.
    pub fn of_kind(kind: ElementKind) -> Self {
        Self::new(kind.as_str())
    }

    /// Append a property.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    /// Append several already-typed properties.
    pub fn with_all(mut self, props: impl IntoIterator<Item = (String, PropertyValue)>) -> Self {
        self.properties.extend(props);
        self
    }

    /// Append launch text after the properties, unchanged.
    pub fn with_raw(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        if !text.trim().is_empty() {
            self.raw.push(text.trim().to_string());
        }
        self
    }

    /// Insert a property before all existing ones.
    pub fn with_leading(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(0, (key.into(), value.into()));
        self
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// The recognized kind of this element, if any.
    pub fn kind(&self) -> Option<ElementKind> {
        self.name.parse().ok()
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for (key, value) in &self.properties {
            write!(f, " {key}={value}")?;
        }
        for text in &self.raw {
            write!(f, " {text}")?;
        }
        Ok(())
    }
}

/// The element kinds a workload step may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Object detector (`gvadetect`).
    Detect,
    /// Object classifier (`gvaclassify`).
    Classify,
    /// Object tracker (`gvatrack`).
    Track,
    /// Region-of-interest attacher (`gvaattachroi`).
    AttachRoi,
    /// Metadata converter (`gvametaconvert`).
    MetaConvert,
    /// Metadata publisher (`gvametapublish`).
    MetaPublish,
    /// Overlay (`gvawatermark`).
    Watermark,
    /// FPS counter (`gvafpscounter`).
    FpsCounter,
    /// Display sink with FPS text (`fpsdisplaysink`).
    FpsDisplaySink,
    /// Buffering point (`queue`).
    Queue,
    /// Format converter (`videoconvert`).
    VideoConvert,
    /// Decoder (`decodebin`).
    DecodeBin,
    /// File source (`filesrc`).
    FileSrc,
    /// Null sink (`fakesink`).
    FakeSink,
}

impl ElementKind {
    /// Every recognized kind.
    pub const ALL: [ElementKind; 14] = [
        ElementKind::Detect,
        ElementKind::Classify,
        ElementKind::Track,
        ElementKind::AttachRoi,
        ElementKind::MetaConvert,
        ElementKind::MetaPublish,
        ElementKind::Watermark,
        ElementKind::FpsCounter,
        ElementKind::FpsDisplaySink,
        ElementKind::Queue,
        ElementKind::VideoConvert,
        ElementKind::DecodeBin,
        ElementKind::FileSrc,
        ElementKind::FakeSink,
    ];

    /// The element factory name.
    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::Detect => "gvadetect",
            ElementKind::Classify => "gvaclassify",
            ElementKind::Track => "gvatrack",
            ElementKind::AttachRoi => "gvaattachroi",
            ElementKind::MetaConvert => "gvametaconvert",
            ElementKind::MetaPublish => "gvametapublish",
            ElementKind::Watermark => "gvawatermark",
            ElementKind::FpsCounter => "gvafpscounter",
            ElementKind::FpsDisplaySink => "fpsdisplaysink",
            ElementKind::Queue => "queue",
            ElementKind::VideoConvert => "videoconvert",
            ElementKind::DecodeBin => "decodebin",
            ElementKind::FileSrc => "filesrc",
            ElementKind::FakeSink => "fakesink",
        }
    }

    /// Whether this kind runs a model.
    pub fn is_inference(self) -> bool {
        matches!(self, ElementKind::Detect | ElementKind::Classify)
    }
}

impl FromStr for ElementKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ElementKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::UnsupportedElementKind(s.to_string()))
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
