//! Operator key controls.
//!
//! Stop, pause and resume keys are single printable ASCII characters. A key
//! spec is expanded into a match set so that matching is case-insensitive.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a key spec is not a single printable ASCII character.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("key must be a single character, got an empty string")]
    Empty,

    #[error("key must be a single character, got {0:?}")]
    MultipleCharacters(String),

    #[error("key must be a printable ASCII character, got {0:?}")]
    NotPrintableAscii(char),
}

/// A key read from the operator's terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPress {
    /// A printable character
    Char(char),
    /// Ctrl+C delivered as input while the terminal is in raw mode
    Interrupt,
}

/// Case-insensitive set of characters that trigger one operator control.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySet(BTreeSet<char>);

impl KeySet {
    /// A set that matches nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, c: char) -> bool {
        self.0.contains(&c)
    }

    pub fn chars(&self) -> impl Iterator<Item = char> + '_ {
        self.0.iter().copied()
    }
}

impl fmt::Display for KeySet {
    /// Shows the key the way an operator would type it (lowercase for letters).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = self
            .0
            .iter()
            .find(|c| !c.is_ascii_uppercase())
            .or_else(|| self.0.iter().next());
        match shown {
            Some(c) => write!(f, "{}", c),
            None => Ok(()),
        }
    }
}

impl FromStr for KeySet {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_key(s)
    }
}

/// Parse a user-supplied key into its match set.
///
/// Alphabetic keys match both cases (`"s"` matches `S` and `s`); any other
/// printable character matches only itself.
pub fn parse_key(input: &str) -> Result<KeySet, KeyError> {
    let mut chars = input.chars();
    let c = chars.next().ok_or(KeyError::Empty)?;
    if chars.next().is_some() {
        return Err(KeyError::MultipleCharacters(input.to_string()));
    }

    // Printable ASCII is 0x20..=0x7E
    if !(c.is_ascii_graphic() || c == ' ') {
        return Err(KeyError::NotPrintableAscii(c));
    }

    let mut set = BTreeSet::new();
    if c.is_ascii_alphabetic() {
        set.insert(c.to_ascii_uppercase());
        set.insert(c.to_ascii_lowercase());
    } else {
        set.insert(c);
    }
    Ok(KeySet(set))
}
