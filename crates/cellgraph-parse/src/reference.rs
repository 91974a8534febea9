//! A1-style reference parsing.
//!
//! Turns operand text like `B2`, `$A$1:$C$10` or `'My Sheet'!A1` into a
//! structured [`ReferenceType`]. Only bounded cell and rectangular range
//! references are supported; whole-column (`A:A`) and whole-row (`1:1`)
//! spans are rejected.

use cellgraph_common::{Address, Coord, letters_to_col};
use std::error::Error;
use std::fmt::{self, Display};

/// A reference that could not be parsed, with the offending text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidReference {
    pub text: String,
    pub reason: String,
}

impl InvalidReference {
    fn new(text: &str, reason: impl Into<String>) -> Self {
        InvalidReference {
            text: text.to_string(),
            reason: reason.into(),
        }
    }
}

impl Display for InvalidReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid reference `{}`: {}", self.text, self.reason)
    }
}

impl Error for InvalidReference {}

/// A parsed cell or range reference. `sheet` is `None` when the formula did
/// not qualify the reference; the graph builder fills in the owning sheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReferenceType {
    Cell {
        sheet: Option<String>,
        row: u32,
        col: u32,
    },
    Range {
        sheet: Option<String>,
        start_row: u32,
        start_col: u32,
        end_row: u32,
        end_col: u32,
    },
}

impl ReferenceType {
    pub fn from_string(text: &str) -> Result<Self, InvalidReference> {
        let (sheet, rest) = extract_sheet_name(text)?;

        if let Some((start, end)) = rest.split_once(':') {
            let (start_row, start_col) = parse_cell_reference(text, start)?;
            let (end_row, end_col) = parse_cell_reference(text, end)?;
            if start_row > end_row || start_col > end_col {
                return Err(InvalidReference::new(text, "range start is after its end"));
            }
            Ok(ReferenceType::Range {
                sheet,
                start_row,
                start_col,
                end_row,
                end_col,
            })
        } else {
            let (row, col) = parse_cell_reference(text, rest)?;
            Ok(ReferenceType::Cell { sheet, row, col })
        }
    }

    pub fn sheet(&self) -> Option<&str> {
        match self {
            ReferenceType::Cell { sheet, .. } | ReferenceType::Range { sheet, .. } => {
                sheet.as_deref()
            }
        }
    }

    /// Resolve to a graph [`Address`], falling back to `default_sheet` for an
    /// unqualified reference. A 1×1 range collapses to a cell address.
    pub fn to_address(&self, default_sheet: &str) -> Address {
        let sheet = self.sheet().unwrap_or(default_sheet).to_string();
        match *self {
            ReferenceType::Cell { row, col, .. } => Address::Cell {
                sheet,
                coord: Coord::new(row, col),
            },
            ReferenceType::Range {
                start_row,
                start_col,
                end_row,
                end_col,
                ..
            } => {
                if start_row == end_row && start_col == end_col {
                    Address::Cell {
                        sheet,
                        coord: Coord::new(start_row, start_col),
                    }
                } else {
                    Address::Range {
                        sheet,
                        start: Coord::new(start_row, start_col),
                        end: Coord::new(end_row, end_col),
                    }
                }
            }
        }
    }
}

impl Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = self.sheet() {
            if sheet.contains(' ') {
                write!(f, "'{sheet}'!")?;
            } else {
                write!(f, "{sheet}!")?;
            }
        }
        match *self {
            ReferenceType::Cell { row, col, .. } => {
                write!(f, "{}", Coord::new(row, col))
            }
            ReferenceType::Range {
                start_row,
                start_col,
                end_row,
                end_col,
                ..
            } => write!(
                f,
                "{}:{}",
                Coord::new(start_row, start_col),
                Coord::new(end_row, end_col)
            ),
        }
    }
}

/// Split off an optional `Sheet!` or `'Quoted Sheet'!` prefix.
fn extract_sheet_name(text: &str) -> Result<(Option<String>, &str), InvalidReference> {
    if let Some(rest) = text.strip_prefix('\'') {
        // quoted sheet name; '' inside unescapes to a single quote
        let Some(close) = rest.find('\'') else {
            return Err(InvalidReference::new(text, "unterminated sheet quote"));
        };
        let name = rest[..close].replace("''", "'");
        let after = &rest[close + 1..];
        let Some(cell_part) = after.strip_prefix('!') else {
            return Err(InvalidReference::new(text, "expected `!` after sheet name"));
        };
        Ok((Some(name), cell_part))
    } else if let Some((sheet, cell_part)) = text.rsplit_once('!') {
        if sheet.is_empty() {
            return Err(InvalidReference::new(text, "empty sheet name"));
        }
        Ok((Some(sheet.to_string()), cell_part))
    } else {
        Ok((None, text))
    }
}

/// Parse a single `$A$1` style cell into 1-based (row, col).
fn parse_cell_reference(original: &str, cell: &str) -> Result<(u32, u32), InvalidReference> {
    let stripped: String = cell.chars().filter(|&c| c != '$').collect();
    let split = stripped
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| InvalidReference::new(original, "missing row number"))?;
    let (letters, digits) = stripped.split_at(split);

    let col = letters_to_col(letters)
        .ok_or_else(|| InvalidReference::new(original, "bad column letters"))?;
    let row: u32 = digits
        .parse()
        .map_err(|_| InvalidReference::new(original, "bad row number"))?;
    if row == 0 {
        return Err(InvalidReference::new(original, "row numbers start at 1"));
    }
    Ok((row, col))
}
