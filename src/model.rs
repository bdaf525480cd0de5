use indexmap::{IndexMap, IndexSet};

use crate::parser::trim_ascii;

/// Parsed `.env` contents in first-appearance order.
///
/// A key repeated later in the input keeps its original position and takes
/// the later value.
pub type EnvMap = IndexMap<String, String>;

/// A parsed `KEY=VALUE` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Entry {
    pub key: String,
    pub value: String,
    pub line: u32,
}

/// Summary of the load operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped_existing: usize,
    pub files_read: usize,
}

/// Handling of quoted values that do not close cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteMode {
    /// Treat the whole value, leading quote included, as unquoted text.
    #[default]
    Lenient,
    /// Reject the line with [`ParseErrorKind::UnterminatedQuote`].
    ///
    /// [`ParseErrorKind::UnterminatedQuote`]: crate::ParseErrorKind::UnterminatedQuote
    Strict,
}

/// Keys that must be present in the target environment after loading.
///
/// Built from a comma-separated string (`"DB_HOST, DB_USER,"`) or from a list
/// of names. Both forms are normalized the same way: names are trimmed of
/// ASCII whitespace, empty names are dropped, and duplicates keep their first
/// position. List entries are never split on commas.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequiredKeys {
    keys: IndexSet<String>,
}

impl RequiredKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split a comma-separated list of key names.
    pub fn parse_delimited(raw: &str) -> Self {
        raw.split(',').collect()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// Append more names, keeping declaration order.
    pub fn extend_from(&mut self, other: RequiredKeys) {
        self.keys.extend(other.keys);
    }
}

impl<S: AsRef<str>> FromIterator<S> for RequiredKeys {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let keys = iter
            .into_iter()
            .map(|key| trim_ascii(key.as_ref()).to_owned())
            .filter(|key| !key.is_empty())
            .collect();
        Self { keys }
    }
}

impl From<&str> for RequiredKeys {
    fn from(value: &str) -> Self {
        Self::parse_delimited(value)
    }
}

impl From<String> for RequiredKeys {
    fn from(value: String) -> Self {
        Self::parse_delimited(&value)
    }
}

impl From<&String> for RequiredKeys {
    fn from(value: &String) -> Self {
        Self::parse_delimited(value)
    }
}

impl From<Vec<String>> for RequiredKeys {
    fn from(value: Vec<String>) -> Self {
        value.into_iter().collect()
    }
}

impl From<&[&str]> for RequiredKeys {
    fn from(value: &[&str]) -> Self {
        value.iter().collect()
    }
}

impl<const N: usize> From<[&str; N]> for RequiredKeys {
    fn from(value: [&str; N]) -> Self {
        value.into_iter().collect()
    }
}
