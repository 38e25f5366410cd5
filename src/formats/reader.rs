use anyhow::Result;
use indexmap::IndexMap;

/// A single data row: header name to raw field value, in header order.
///
/// Headers whose field is missing from a short row are absent rather than
/// padded, so the key set of a row is always a subset of the file's headers.
pub type RowRecord = IndexMap<String, String>;

/// Configuration for delimited file reading (CSV, TSV, etc.)
#[derive(Debug, Clone)]
pub struct DelimitedConfig {
    pub delimiter: u8,
    pub quote: u8,
}

impl DelimitedConfig {
    /// Convert delimiter byte to string representation
    pub fn delimiter_as_string(&self) -> String {
        if self.delimiter == b'\t' {
            "\\t".to_string()
        } else {
            String::from_utf8(vec![self.delimiter])
                .unwrap_or_else(|_| format!("\\x{:02x}", self.delimiter))
        }
    }

    /// Create from string representations
    pub fn from_strings(delimiter: &str, quote: &str) -> Result<Self> {
        let delimiter_byte = if delimiter == "\\t" {
            b'\t'
        } else if delimiter.len() == 1 {
            delimiter.as_bytes()[0]
        } else {
            anyhow::bail!("Delimiter must be a single character or \\t");
        };

        let quote_byte = if quote.len() == 1 {
            quote.as_bytes()[0]
        } else {
            anyhow::bail!("Quote must be a single character");
        };

        Ok(Self {
            delimiter: delimiter_byte,
            quote: quote_byte,
        })
    }

    pub fn csv() -> Self {
        Self::default()
    }

    pub fn tsv() -> Self {
        Self {
            delimiter: b'\t',
            quote: b'"',
        }
    }
}

impl Default for DelimitedConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
        }
    }
}

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Tsv,
}

impl Format {
    /// Parse format from string (case-insensitive)
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(Format::Csv),
            "tsv" => Ok(Format::Tsv),
            _ => Err(anyhow::anyhow!(
                "Unsupported format: {}. Supported formats: csv, tsv",
                s
            )),
        }
    }

    /// Auto-detect file format from a path, falling back to CSV
    pub fn from_path(path: &str) -> Self {
        if path.to_lowercase().ends_with(".tsv") {
            Format::Tsv
        } else {
            Format::Csv
        }
    }

    pub fn config(self) -> DelimitedConfig {
        match self {
            Format::Csv => DelimitedConfig::csv(),
            Format::Tsv => DelimitedConfig::tsv(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delimiter_round_trip_through_strings() {
        let tsv = DelimitedConfig::tsv();
        assert_eq!(tsv.delimiter_as_string(), "\\t");

        let parsed = DelimitedConfig::from_strings("\\t", "\"").unwrap();
        assert_eq!(parsed.delimiter, b'\t');
        assert_eq!(parsed.quote, b'"');

        let semicolon = DelimitedConfig::from_strings(";", "'").unwrap();
        assert_eq!(semicolon.delimiter, b';');
        assert_eq!(semicolon.quote, b'\'');
    }

    #[test]
    fn test_invalid_delimiter_rejected() {
        assert!(DelimitedConfig::from_strings(",,", "\"").is_err());
        assert!(DelimitedConfig::from_strings(",", "").is_err());
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(Format::from_path("sales.csv"), Format::Csv);
        assert_eq!(Format::from_path("/tmp/SALES.TSV"), Format::Tsv);
        assert_eq!(Format::from_path("export.txt"), Format::Csv);
        assert_eq!(Format::parse("TSV").unwrap(), Format::Tsv);
        assert!(Format::parse("parquet").is_err());
    }
}
