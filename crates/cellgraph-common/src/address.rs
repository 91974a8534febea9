//! Sheet-qualified cell and range addresses.
//!
//! An [`Address`] is the graph identity of a node: sheet name plus either a
//! single coordinate or a rectangular span. Addresses are totally ordered and
//! hashable so they can key the cellmap and be reported deterministically.

use once_cell::sync::Lazy;
use std::fmt;

// Column lookup table for common columns (A-ZZ = 702 columns)
static COLUMN_LOOKUP: Lazy<Vec<String>> = Lazy::new(|| {
    let mut cols = Vec::with_capacity(702);
    for c in b'A'..=b'Z' {
        cols.push(String::from(c as char));
    }
    for c1 in b'A'..=b'Z' {
        for c2 in b'A'..=b'Z' {
            cols.push(format!("{}{}", c1 as char, c2 as char));
        }
    }
    cols
});

/// Convert a 1-based column number to its letter form (`1` ⇒ `A`).
pub fn col_to_letters(mut num: u32) -> String {
    if num > 0 && num <= 702 {
        return COLUMN_LOOKUP[(num - 1) as usize].clone();
    }

    let mut result = String::with_capacity(3);
    while num > 0 {
        num -= 1;
        result.insert(0, ((num % 26) as u8 + b'A') as char);
        num /= 26;
    }
    result
}

/// Convert column letters to a 1-based column number (`"A"` ⇒ `1`).
///
/// Returns `None` for empty input, non-letters, or anything longer than the
/// three letters a real sheet column can carry.
pub fn letters_to_col(column: &str) -> Option<u32> {
    let bytes = column.as_bytes();
    if bytes.is_empty() || bytes.len() > 3 {
        return None;
    }

    let mut result = 0u32;
    for &b in bytes {
        if !b.is_ascii_alphabetic() {
            return None;
        }
        result = result
            .checked_mul(26)?
            .checked_add((b.to_ascii_uppercase() - b'A' + 1) as u32)?;
    }
    Some(result)
}

/// One grid coordinate. `row` and `col` are 1-based, matching A1 notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coord {
    pub row: u32,
    pub col: u32,
}

impl Coord {
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", col_to_letters(self.col), self.row)
    }
}

/// Graph identity of a node: a sheet-qualified cell or rectangular span.
///
/// Two addresses are equal iff sheet and position(s) match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Address {
    Cell { sheet: String, coord: Coord },
    Range { sheet: String, start: Coord, end: Coord },
}

impl Address {
    pub fn cell<S: Into<String>>(sheet: S, row: u32, col: u32) -> Self {
        Address::Cell {
            sheet: sheet.into(),
            coord: Coord::new(row, col),
        }
    }

    pub fn range<S: Into<String>>(sheet: S, start: Coord, end: Coord) -> Self {
        Address::Range {
            sheet: sheet.into(),
            start,
            end,
        }
    }

    pub fn sheet(&self) -> &str {
        match self {
            Address::Cell { sheet, .. } | Address::Range { sheet, .. } => sheet,
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(self, Address::Range { .. })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Cell { sheet, coord } => write!(f, "{sheet}!{coord}"),
            Address::Range { sheet, start, end } => write!(f, "{sheet}!{start}:{end}"),
        }
    }
}
