//! Excel-style cell error codes.
//!
//! These are the *values* a formula can produce (`#DIV/0!`, `#REF!`, …), not
//! the engine's own failure types; the engine wraps a `CellError` when a
//! compiled expression blows up mid-evaluation.

use std::{error::Error, fmt};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The recognised cell error codes.
///
/// Names are CamelCase; `Display` renders them exactly as a spreadsheet
/// shows them (`#DIV/0!`, …).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CellErrorKind {
    Null,
    Ref,
    Name,
    Value,
    Div,
    Na,
    Num,
    Circ,
}

impl fmt::Display for CellErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Null => "#NULL!",
            Self::Ref => "#REF!",
            Self::Name => "#NAME?",
            Self::Value => "#VALUE!",
            Self::Div => "#DIV/0!",
            Self::Na => "#N/A",
            Self::Num => "#NUM!",
            Self::Circ => "#CIRC!",
        })
    }
}

impl CellErrorKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "#null!" => Some(Self::Null),
            "#ref!" => Some(Self::Ref),
            "#name?" => Some(Self::Name),
            "#value!" => Some(Self::Value),
            "#div/0!" => Some(Self::Div),
            "#n/a" => Some(Self::Na),
            "#num!" => Some(Self::Num),
            "#circ!" => Some(Self::Circ),
            _ => None,
        }
    }
}

/// A cell error code plus an optional human explanation.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellError {
    pub kind: CellErrorKind,
    pub message: Option<String>,
}

impl From<CellErrorKind> for CellError {
    fn from(kind: CellErrorKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }
}

impl CellError {
    pub fn new(kind: CellErrorKind) -> Self {
        kind.into()
    }

    pub fn with_message<S: Into<String>>(mut self, msg: S) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Parse an error literal such as `#REF!`; unknown codes map to `#VALUE!`
    /// with the original text preserved in the message.
    pub fn from_error_string(s: &str) -> Self {
        match CellErrorKind::parse(s) {
            Some(kind) => Self::new(kind),
            None => Self::new(CellErrorKind::Value).with_message(format!("unknown error code {s}")),
        }
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(ref msg) = self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl Error for CellError {}

impl PartialEq<str> for CellError {
    fn eq(&self, other: &str) -> bool {
        self.kind.to_string() == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roundtrip() {
        for kind in [
            CellErrorKind::Null,
            CellErrorKind::Ref,
            CellErrorKind::Name,
            CellErrorKind::Value,
            CellErrorKind::Div,
            CellErrorKind::Na,
            CellErrorKind::Num,
            CellErrorKind::Circ,
        ] {
            assert_eq!(CellErrorKind::parse(&kind.to_string()), Some(kind));
        }
    }

    #[test]
    fn unknown_code_degrades_to_value() {
        let err = CellError::from_error_string("#BOGUS!");
        assert_eq!(err.kind, CellErrorKind::Value);
        assert!(err.message.unwrap().contains("#BOGUS!"));
    }
}
