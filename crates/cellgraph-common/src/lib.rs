pub mod address;
pub mod error;
pub mod value;

pub use address::{Address, Coord, col_to_letters, letters_to_col};
pub use error::{CellError, CellErrorKind};
pub use value::{LiteralValue, datetime_to_serial, serial_to_datetime};
