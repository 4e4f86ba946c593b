//! Content model for generated slide content.
//!
//! Research interpreters produce these structures; the pptx module writes
//! them into DrawingML text frames and tables.

mod paragraph;
mod table;

pub use paragraph::*;
pub use table::*;
