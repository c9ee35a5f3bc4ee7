//! Launch-syntax parser using winnow.
//!
//! Parses the text the compiler emits, and the fragments device profiles
//! contribute to it:
//!
//! ```text
//! filesrc location=/videos/a.mp4 ! decodebin ! videoconvert ! tee name=t1
//!     t1. ! queue ! fakesink sync=false
//! ```
//!
//! # Syntax
//!
//! - Elements are separated by `!`
//! - A caps string (`video/x-raw(memory:VAMemory)`) stands in for an element
//! - Properties are specified as `name=value` after the element name
//! - Values can be quoted strings, numbers, booleans, or bare words
//! - A chain may start with a fan-out reference `name.`
//! - A new chain starts wherever an element follows another without `!`
//! - `\` line continuations are treated as whitespace

use crate::element::{Element, PropertyValue};
use crate::error::{Error, Result};
use std::fmt;
use winnow::Parser;
use winnow::ascii::{alpha1, digit1, multispace0, multispace1};
use winnow::combinator::{alt, delimited, opt, repeat, separated};
use winnow::error::ContextError;
use winnow::token::{take_till, take_while};

type WResult<T> = std::result::Result<T, ContextError>;

/// One linear chain of a launch description.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    /// Fan-out point this chain hangs off, when it starts with `name.`.
    pub origin: Option<String>,
    /// The elements in order.
    pub elements: Vec<Element>,
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(origin) = &self.origin {
            write!(f, "{origin}. ! ")?;
        }
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 {
                f.write_str(" ! ")?;
            }
            write!(f, "{element}")?;
        }
        Ok(())
    }
}

/// A parsed launch description: one or more chains.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLaunch {
    /// Chains in textual order.
    pub chains: Vec<Chain>,
}

/// Parse a launch description.
///
/// # Example
///
/// ```rust
/// use lanegen::pipeline::parser::parse_launch;
///
/// let launch = parse_launch("filesrc location=a.mp4 ! decodebin ! fakesink").unwrap();
/// assert_eq!(launch.chains.len(), 1);
/// assert_eq!(launch.chains[0].elements[1].name, "decodebin");
/// ```
pub fn parse_launch(input: &str) -> Result<ParsedLaunch> {
    let joined = join_continuations(input);
    launch
        .parse(joined.trim())
        .map_err(|e| Error::Parse(format!("launch: {e}")))
}

/// Parse a full lane command, skipping the launcher and its flags.
pub fn parse_command(input: &str) -> Result<ParsedLaunch> {
    let joined = join_continuations(input);
    let mut rest = joined.trim();
    if let Some(stripped) = rest.strip_prefix(crate::pipeline::lane::LAUNCHER_BIN) {
        rest = stripped.trim_start();
        while let Some(flag) = rest.split_whitespace().next().filter(|w| w.starts_with('-')) {
            rest = rest[flag.len()..].trim_start();
        }
    }
    parse_launch(rest)
}

/// Parse a single chain of elements without fan-out references.
pub fn parse_chain(input: &str) -> Result<Vec<Element>> {
    let mut launch = parse_launch(input)?;
    match launch.chains.len() {
        1 if launch.chains[0].origin.is_none() => Ok(launch.chains.remove(0).elements),
        _ => Err(Error::Parse(format!("expected one chain: {input}"))),
    }
}

/// Parse a whitespace-separated list of `key=value` properties.
pub fn parse_properties(input: &str) -> Result<Vec<(String, PropertyValue)>> {
    properties
        .parse(input.trim())
        .map_err(|e| Error::Parse(format!("properties: {e}")))
}

fn join_continuations(input: &str) -> String {
    input.replace("\\\r\n", " ").replace("\\\n", " ")
}

/// Parse one or more chains.
fn launch(input: &mut &str) -> WResult<ParsedLaunch> {
    let chains = separated(1.., chain, multispace1).parse_next(input)?;

    multispace0.parse_next(input)?;
    if !input.is_empty() {
        return Err(ContextError::new());
    }

    Ok(ParsedLaunch { chains })
}

/// Parse a chain, optionally starting at a fan-out reference.
fn chain(input: &mut &str) -> WResult<Chain> {
    let origin = opt(origin).parse_next(input)?;
    let elements = separated(1.., element, link_separator).parse_next(input)?;
    Ok(Chain { origin, elements })
}

/// Parse `name. !`.
fn origin(input: &mut &str) -> WResult<String> {
    let name: &str = identifier.parse_next(input)?;
    let _ = '.'.parse_next(input)?;
    link_separator.parse_next(input)?;
    Ok(name.to_string())
}

/// Parse an element (name or caps + optional properties).
fn element(input: &mut &str) -> WResult<Element> {
    let name: &str = alt((caps, identifier)).parse_next(input)?;

    let properties: Vec<(String, PropertyValue)> = repeat(0.., property).parse_next(input)?;

    Ok(Element::new(name).with_all(properties))
}

/// Parse a caps string such as `video/x-raw(memory:VAMemory)`.
fn caps<'a>(input: &mut &'a str) -> WResult<&'a str> {
    (
        identifier,
        '/',
        take_while(1.., |c: char| !c.is_whitespace() && c != '!'),
    )
        .take()
        .parse_next(input)
}

/// Parse the link separator `!`.
fn link_separator(input: &mut &str) -> WResult<()> {
    let _ = multispace0.parse_next(input)?;
    let _ = '!'.parse_next(input)?;
    let _ = multispace0.parse_next(input)?;
    Ok(())
}

/// Parse an identifier (element name or property name).
fn identifier<'a>(input: &mut &'a str) -> WResult<&'a str> {
    (
        alt((alpha1::<_, ContextError>, "_")),
        take_while(0.., |c: char| c.is_alphanumeric() || c == '_' || c == '-'),
    )
        .take()
        .parse_next(input)
}

/// Parse zero or more properties up to the end of input.
fn properties(input: &mut &str) -> WResult<Vec<(String, PropertyValue)>> {
    let props = repeat(0.., property).parse_next(input)?;
    multispace0.parse_next(input)?;
    if !input.is_empty() {
        return Err(ContextError::new());
    }
    Ok(props)
}

/// Parse a property (` key=value`), leaving input untouched if there is none.
fn property(input: &mut &str) -> WResult<(String, PropertyValue)> {
    let checkpoint = *input;

    let _ = multispace0.parse_next(input)?;

    let key: &str = match identifier.parse_next(input) {
        Ok(k) => k,
        Err(_) => {
            *input = checkpoint;
            return Err(ContextError::new());
        }
    };

    if input.starts_with('=') {
        let _ = '='.parse_next(input)?;
    } else {
        // Not a property, backtrack
        *input = checkpoint;
        return Err(ContextError::new());
    }

    let value = property_value.parse_next(input)?;

    Ok((key.to_string(), value))
}

/// Parse a property value.
fn property_value(input: &mut &str) -> WResult<PropertyValue> {
    alt((
        quoted_string.map(PropertyValue::String),
        bounded(boolean).map(PropertyValue::Bool),
        bounded(float).map(PropertyValue::Float),
        bounded(integer).map(PropertyValue::Integer),
        bare_string.map(PropertyValue::String),
    ))
    .parse_next(input)
}

/// Accept a typed value only when it is the whole word (`10,20` is not `10`).
fn bounded<'a, O>(
    mut inner: impl Parser<&'a str, O, ContextError>,
) -> impl Parser<&'a str, O, ContextError> {
    move |input: &mut &'a str| -> WResult<O> {
        let checkpoint = *input;
        let value = inner.parse_next(input)?;
        match input.chars().next() {
            None => Ok(value),
            Some(c) if c.is_whitespace() || c == '!' => Ok(value),
            Some(_) => {
                *input = checkpoint;
                Err(ContextError::new())
            }
        }
    }
}

/// Parse a quoted string.
fn quoted_string(input: &mut &str) -> WResult<String> {
    alt((
        delimited('"', take_till(0.., '"'), '"'),
        delimited('\'', take_till(0.., '\''), '\''),
    ))
    .map(|s: &str| s.to_string())
    .parse_next(input)
}

/// Parse a boolean.
fn boolean(input: &mut &str) -> WResult<bool> {
    alt((
        "true".map(|_| true),
        "false".map(|_| false),
        "yes".map(|_| true),
        "no".map(|_| false),
    ))
    .parse_next(input)
}

/// Parse an integer.
fn integer(input: &mut &str) -> WResult<i64> {
    let negative = opt('-').parse_next(input)?;
    let digits: &str = digit1.parse_next(input)?;

    // Make sure this isn't a float (no decimal point follows)
    if input.starts_with('.') {
        return Err(ContextError::new());
    }

    let value: i64 = digits.parse().map_err(|_| ContextError::new())?;

    Ok(if negative.is_some() { -value } else { value })
}

/// Parse a float.
fn float(input: &mut &str) -> WResult<f64> {
    let negative = opt('-').parse_next(input)?;
    let int_part: &str = digit1.parse_next(input)?;
    let _ = '.'.parse_next(input)?;
    let frac_part: &str = digit1.parse_next(input)?;

    let s = format!(
        "{}{}.{}",
        if negative.is_some() { "-" } else { "" },
        int_part,
        frac_part
    );
    s.parse().map_err(|_| ContextError::new())
}

/// Parse a bare (unquoted) string value.
/// Stops at whitespace or `!`.
fn bare_string(input: &mut &str) -> WResult<String> {
    take_while(1.., |c: char| !c.is_whitespace() && c != '!')
        .map(|s: &str| s.to_string())
        .parse_next(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_element() {
        let result = parse_chain("fakesink").unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "fakesink");
        assert!(result[0].properties.is_empty());
    }

    #[test]
    fn test_parse_chain_with_properties() {
        let result =
            parse_chain("filesrc location=/videos/a.mp4 ! decodebin ! fakesink sync=false")
                .unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(
            result[0].properties[0],
            (
                "location".to_string(),
                PropertyValue::String("/videos/a.mp4".to_string())
            )
        );
        assert_eq!(
            result[2].properties[0],
            ("sync".to_string(), PropertyValue::Bool(false))
        );
    }

    #[test]
    fn test_parse_numbers() {
        let result = parse_chain("gvadetect threshold=0.5 batch-size=1 offset=-3").unwrap();
        assert_eq!(result[0].get("threshold"), Some(&PropertyValue::Float(0.5)));
        assert_eq!(result[0].get("batch-size"), Some(&PropertyValue::Integer(1)));
        assert_eq!(result[0].get("offset"), Some(&PropertyValue::Integer(-3)));
    }

    #[test]
    fn test_parse_roi_list_stays_string() {
        let result = parse_chain("gvaattachroi roi=10,20,30,40 roi=0,0,5,5").unwrap();
        let rois: Vec<_> = result[0].properties.iter().map(|(_, v)| v.clone()).collect();
        assert_eq!(
            rois,
            vec![
                PropertyValue::String("10,20,30,40".into()),
                PropertyValue::String("0,0,5,5".into())
            ]
        );
    }

    #[test]
    fn test_parse_word_prefixed_by_keyword() {
        let result = parse_chain("x mode=nonblocking flag=trueish").unwrap();
        assert_eq!(
            result[0].get("mode"),
            Some(&PropertyValue::String("nonblocking".into()))
        );
        assert_eq!(
            result[0].get("flag"),
            Some(&PropertyValue::String("trueish".into()))
        );
    }

    #[test]
    fn test_parse_quoted_string() {
        let result = parse_chain(r#"filesrc location="/path with spaces/file.mp4""#).unwrap();
        assert_eq!(
            result[0].properties[0].1,
            PropertyValue::String("/path with spaces/file.mp4".to_string())
        );
    }

    #[test]
    fn test_parse_fan_out() {
        let launch = parse_launch(
            "videoconvert ! tee name=t1 t1. ! queue ! fakesink sync=false t1. ! queue ! fakesink",
        )
        .unwrap();
        assert_eq!(launch.chains.len(), 3);
        assert_eq!(launch.chains[0].origin, None);
        assert_eq!(launch.chains[1].origin.as_deref(), Some("t1"));
        assert_eq!(launch.chains[2].origin.as_deref(), Some("t1"));
        assert_eq!(launch.chains[1].elements.len(), 2);
    }

    #[test]
    fn test_parse_parallel_heads() {
        let launch = parse_launch("filesrc location=a ! fakesink \\\n  filesrc location=b ! fakesink")
            .unwrap();
        assert_eq!(launch.chains.len(), 2);
        assert!(launch.chains.iter().all(|c| c.origin.is_none()));
        assert_eq!(launch.chains[1].elements[0].get("location").unwrap().as_string(), "b");
    }

    #[test]
    fn test_parse_command_skips_launcher() {
        let launch =
            parse_command("gst-launch-1.0 -e \\\n  filesrc location=a ! decodebin ! fakesink")
                .unwrap();
        assert_eq!(launch.chains.len(), 1);
        assert_eq!(launch.chains[0].elements[0].name, "filesrc");
    }

    #[test]
    fn test_chain_display_round_trip() {
        let text = "t1. ! queue ! gvametapublish method=file file-path=/r/rs-1_1_x.jsonl";
        let launch = parse_launch(text).unwrap();
        assert_eq!(launch.chains[0].to_string(), text);
    }

    #[test]
    fn test_parse_properties() {
        let props = parse_properties("pre-process-backend=va-surface-sharing nireq=4").unwrap();
        assert_eq!(props.len(), 2);
        assert_eq!(props[1], ("nireq".to_string(), PropertyValue::Integer(4)));
        assert!(parse_properties("").unwrap().is_empty());
        assert!(parse_properties("not a property").is_err());
    }

    #[test]
    fn test_parse_caps_element() {
        let text = "vah264dec ! vapostproc ! video/x-raw(memory:VAMemory),format=NV12 ! queue";
        let result = parse_chain(text).unwrap();
        assert_eq!(result.len(), 4);
        assert_eq!(result[2].name, "video/x-raw(memory:VAMemory),format=NV12");
        assert!(result[2].properties.is_empty());
        assert_eq!(parse_launch(text).unwrap().chains[0].to_string(), text);
    }

    #[test]
    fn test_parse_chain_rejects_fan_out() {
        assert!(parse_chain("t. ! queue").is_err());
        assert_eq!(parse_chain("vah264dec ! vapostproc").unwrap().len(), 2);
    }

    #[test]
    fn test_parse_empty_fails() {
        assert!(parse_launch("").is_err());
    }

    #[test]
    fn test_parse_just_link_fails() {
        assert!(parse_launch("!").is_err());
    }
}
