//! An in-memory workbook for tests and examples.

use cellgraph_common::{Address, Coord, LiteralValue, letters_to_col};
use rustc_hash::FxHashMap;

use crate::error::ResolveError;
use crate::resolver::{CellResolver, CellSnapshot, RangeSnapshot};

/// Parse `"B2"` into a [`Coord`]. Panics on bad input; test helper only.
pub fn coord(text: &str) -> Coord {
    let split = text
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or_else(|| panic!("`{text}` has no row number"));
    let (letters, digits) = text.split_at(split);
    Coord::new(
        digits.parse().unwrap_or_else(|_| panic!("bad row in `{text}`")),
        letters_to_col(letters).unwrap_or_else(|| panic!("bad column in `{text}`")),
    )
}

/// `"B2"` as a full address on `Sheet1`.
pub fn addr(text: &str) -> Address {
    let c = coord(text);
    Address::cell("Sheet1", c.row, c.col)
}

/// `"A1:B3"` as a full range address on `Sheet1`.
pub fn range_addr(text: &str) -> Address {
    let (start, end) = text.split_once(':').unwrap_or_else(|| panic!("`{text}` is not a range"));
    Address::range("Sheet1", coord(start), coord(end))
}

/// Workbook fixture with builder-style setup. All cells live on `Sheet1`
/// unless placed with [`TestWorkbook::with_cell_on`].
#[derive(Debug, Default, Clone)]
pub struct TestWorkbook {
    cells: FxHashMap<(String, Coord), CellSnapshot>,
}

impl TestWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_formula(mut self, at: &str, formula: &str) -> Self {
        self.cells.insert(
            ("Sheet1".to_string(), coord(at)),
            CellSnapshot::formula(formula),
        );
        self
    }

    pub fn with_value(mut self, at: &str, value: LiteralValue) -> Self {
        self.cells
            .insert(("Sheet1".to_string(), coord(at)), CellSnapshot::value(value));
        self
    }

    pub fn with_number(self, at: &str, n: f64) -> Self {
        self.with_value(at, LiteralValue::Number(n))
    }

    pub fn with_cell_on(mut self, sheet: &str, at: &str, snapshot: CellSnapshot) -> Self {
        self.cells.insert((sheet.to_string(), coord(at)), snapshot);
        self
    }
}

impl CellResolver for TestWorkbook {
    fn resolve_cell(&self, sheet: &str, coord: Coord) -> Result<CellSnapshot, ResolveError> {
        Ok(self
            .cells
            .get(&(sheet.to_string(), coord))
            .cloned()
            .unwrap_or_default())
    }

    fn resolve_range(
        &self,
        sheet: &str,
        start: Coord,
        end: Coord,
    ) -> Result<RangeSnapshot, ResolveError> {
        if start.row > end.row || start.col > end.col {
            return Err(ResolveError::new(
                sheet,
                format!("{start}:{end}"),
                "inverted range",
            ));
        }
        let mut cells = Vec::new();
        for row in start.row..=end.row {
            for col in start.col..=end.col {
                let c = Coord::new(row, col);
                cells.push((c, self.resolve_cell(sheet, c)?));
            }
        }
        Ok(RangeSnapshot {
            rows: end.row - start.row + 1,
            cols: end.col - start.col + 1,
            cells,
        })
    }
}
