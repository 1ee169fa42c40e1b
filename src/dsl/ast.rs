//! Command records: the parsed form of one `COMMAND` line.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, TcadError};

/// Value of a command option.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    String(String),
    Double(f64),
}

impl OptionValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::String(s) => Some(s),
            OptionValue::Double(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            OptionValue::Double(v) => Some(*v),
            OptionValue::String(s) => super::lexer::parse_value(s),
        }
    }

    /// The value as text; numbers are formatted without quotes.
    pub fn to_text(&self) -> String {
        match self {
            OptionValue::String(s) => s.clone(),
            OptionValue::Double(v) => format_number(*v),
        }
    }
}

fn format_number(v: f64) -> String {
    let a = v.abs();
    if a != 0.0 && !(1e-4..1e15).contains(&a) {
        format!("{:e}", v)
    } else {
        format!("{}", v)
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::String(s) => {
                write!(f, "\"")?;
                for c in s.chars() {
                    match c {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        _ => write!(f, "{}", c)?,
                    }
                }
                write!(f, "\"")
            }
            OptionValue::Double(v) => write!(f, "{}", format_number(*v)),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        OptionValue::String(s.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        OptionValue::String(s)
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        OptionValue::Double(v)
    }
}

/// One `COMMAND <name> -key value ...` record. Options keep their order.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRecord {
    command: String,
    options: Vec<(String, OptionValue)>,
}

impl CommandRecord {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            options: Vec::new(),
        }
    }

    /// Builder form of [`CommandRecord::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Set an option, replacing an earlier value for the same key in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        let key = key.into();
        let value = value.into();
        match self.options.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.options.push((key, value)),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn options(&self) -> &[(String, OptionValue)] {
        &self.options
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.options.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(OptionValue::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(OptionValue::as_f64)
    }

    /// Text of an option of either kind, e.g. a node named `0`.
    pub fn get_text(&self, key: &str) -> Option<String> {
        self.get(key).map(OptionValue::to_text)
    }

    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.get_str(key).ok_or_else(|| self.missing(key))
    }

    pub fn require_text(&self, key: &str) -> Result<String> {
        self.get_text(key).ok_or_else(|| self.missing(key))
    }

    fn missing(&self, key: &str) -> TcadError {
        TcadError::MissingOption {
            command: self.command.clone(),
            option: key.to_string(),
        }
    }

    /// Options keyed by name.
    pub fn to_map(&self) -> BTreeMap<String, OptionValue> {
        self.options.iter().cloned().collect()
    }
}

impl fmt::Display for CommandRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "COMMAND {}", self.command)?;
        for (k, v) in &self.options {
            write!(f, " -{} {}", k, v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let r = CommandRecord::new("circuit_element")
            .with("name", "R1")
            .with("R", 1000.0)
            .with("C", 1e-12);
        assert_eq!(
            r.to_string(),
            "COMMAND circuit_element -name \"R1\" -R 1000 -C 1e-12"
        );
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut r = CommandRecord::new("x").with("a", 1.0).with("b", 2.0);
        r.set("a", 3.0);
        assert_eq!(r.get_f64("a"), Some(3.0));
        assert_eq!(r.options()[0].0, "a");
    }

    #[test]
    fn test_text_of_numeric_node() {
        let r = CommandRecord::new("x").with("n2", 0.0);
        assert_eq!(r.get_text("n2").unwrap(), "0");
        assert!(r.get_str("n2").is_none());
        assert!(matches!(
            r.require_str("n1"),
            Err(TcadError::MissingOption { .. })
        ));
    }

    #[test]
    fn test_string_escapes() {
        let v = OptionValue::from("a\"b");
        assert_eq!(v.to_string(), "\"a\\\"b\"");
    }
}
