//! Cell-related types
//!
//! - [`CellValue`] - the value stored in a cell
//! - [`CellAddress`] - a cell's location (e.g. "A1")

mod address;
mod value;

pub use address::CellAddress;
pub use value::{CellError, CellValue, SharedString};
