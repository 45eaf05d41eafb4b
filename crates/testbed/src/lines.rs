use regex::Regex;
use std::fmt;
use testbed_core::{Error, Result};

/// Compiles `pattern` so that it must match a whole string.
pub(crate) fn full_match(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|e| Error::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Captured output, one entry per line.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Lines {
    lines: Vec<String>,
    name: Option<String>,
}

impl Lines {
    pub fn new(text: &str) -> Self {
        let lines = if text.is_empty() {
            Vec::new()
        } else {
            text.split('\n').map(str::to_string).collect()
        };
        Self { lines, name: None }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Whether any line fully matches `pattern`.
    pub fn contains(&self, pattern: &str) -> Result<bool> {
        let re = full_match(pattern)?;
        Ok(self.lines.iter().any(|line| re.is_match(line)))
    }

    /// Number of lines that fully match `pattern`.
    pub fn count(&self, pattern: &str) -> Result<usize> {
        let re = full_match(pattern)?;
        Ok(self.lines.iter().filter(|line| re.is_match(line)).count())
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }
}

impl fmt::Display for Lines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        if let Some(name) = &self.name {
            write!(f, "{name} ")?;
        }
        write!(f, "({} lines)", self.lines.len())?;
        for line in &self.lines {
            write!(f, "\n  [{line}]")?;
        }
        write!(f, "]")
    }
}

impl fmt::Debug for Lines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
