//! Delimited text (CSV, TSV) parsing

pub mod reader;
