//! File format parsers and readers

pub mod delimited;
pub mod reader;

pub use delimited::reader::{Rows, TabularFile};
pub use reader::{DelimitedConfig, Format, RowRecord};
