//! Column type detection from a bounded sample of rows

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::formats::RowRecord;

/// Semantic type detected for a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectedType {
    Integer,
    Double,
    DateTime,
    Boolean,
    String,
}

impl DetectedType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectedType::Integer => "Integer",
            DetectedType::Double => "Double",
            DetectedType::DateTime => "DateTime",
            DetectedType::Boolean => "Boolean",
            DetectedType::String => "String",
        }
    }
}

impl fmt::Display for DetectedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column name to detected type, in header order
pub type DetectedSchema = IndexMap<String, DetectedType>;

static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?[0-9]+$").unwrap());
static DOUBLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?[0-9]+\.[0-9]+$").unwrap());
// Unanchored: "Invoice 2024-01-05 paid" is date-like.
static DATE_LIKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]{4}-[0-9]{2}-[0-9]{2}|[0-9]{2}/[0-9]{2}/[0-9]{4}").unwrap());

const BOOLEAN_TOKENS: [&str; 6] = ["true", "false", "yes", "no", "1", "0"];

/// Per-column tally of value shapes
#[derive(Debug, Default, PartialEq)]
struct ShapeCounts {
    int: usize,
    float: usize,
    date: usize,
    bool: usize,
    total: usize,
}

impl ShapeCounts {
    /// Count one non-empty value. The first matching shape wins.
    fn record(&mut self, value: &str) {
        self.total += 1;
        let value = value.trim();

        if INTEGER.is_match(value) {
            self.int += 1;
        } else if DOUBLE.is_match(value) {
            self.float += 1;
        } else if DATE_LIKE.is_match(value) {
            self.date += 1;
        } else if BOOLEAN_TOKENS
            .iter()
            .any(|token| value.eq_ignore_ascii_case(token))
        {
            self.bool += 1;
        }
    }

    /// Decide the column type; thresholds are strict and checked in order.
    fn decide(&self) -> DetectedType {
        if self.total == 0 {
            return DetectedType::String;
        }

        let total = self.total as f64;
        if self.date as f64 > total * 0.5 {
            DetectedType::DateTime
        } else if self.bool as f64 > total * 0.8 {
            DetectedType::Boolean
        } else if self.float as f64 > total * 0.5 {
            DetectedType::Double
        } else if self.int as f64 > total * 0.8 {
            DetectedType::Integer
        } else {
            DetectedType::String
        }
    }
}

/// Detect a type for every column from at most `sample_size` leading rows.
///
/// Columns with no non-empty sampled value default to `String`, so every
/// column in `columns` appears in the result. Never fails.
pub fn detect(rows: &[RowRecord], columns: &[String], sample_size: usize) -> DetectedSchema {
    let sample = &rows[..rows.len().min(sample_size)];

    columns
        .iter()
        .map(|column| {
            let mut counts = ShapeCounts::default();
            for value in sample.iter().filter_map(|row| row.get(column)) {
                if !value.is_empty() {
                    counts.record(value);
                }
            }
            (column.clone(), counts.decide())
        })
        .collect()
}
