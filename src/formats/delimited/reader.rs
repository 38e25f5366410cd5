use indexmap::IndexMap;

use crate::error::IngestError;
use crate::formats::reader::{DelimitedConfig, RowRecord};

/// A parsed delimited file: the header row plus the raw bytes the rows are
/// read from.
///
/// Rows are read lazily and [`TabularFile::rows`] can be called any number of
/// times, each call starting again from the first data row.
pub struct TabularFile {
    data: Vec<u8>,
    config: DelimitedConfig,
    headers: Vec<String>,
}

impl TabularFile {
    /// Parse the header row of `data`.
    ///
    /// The first line of the input is the header. An empty input, a blank
    /// first line, or a header whose names are all blank is rejected with
    /// [`IngestError::MalformedInput`].
    pub fn parse(data: Vec<u8>, config: DelimitedConfig) -> Result<Self, IngestError> {
        let first_line = data.split(|&b| b == b'\n').next().unwrap_or_default();
        if first_line.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(IngestError::MalformedInput(
                "file has no header row".to_string(),
            ));
        }

        let mut reader = csv_reader(&config, data.as_slice());
        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| IngestError::MalformedInput(format!("unreadable header row: {e}")))?
            .iter()
            .map(|h| h.to_string())
            .collect();

        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(IngestError::MalformedInput(
                "header row has no column names".to_string(),
            ));
        }

        Ok(Self {
            data,
            config,
            headers,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Iterate over the non-blank data rows in file order
    pub fn rows(&self) -> Rows<'_> {
        Rows {
            headers: &self.headers,
            records: csv_reader(&self.config, self.data.as_slice()).into_records(),
        }
    }
}

fn csv_reader<'a>(config: &DelimitedConfig, data: &'a [u8]) -> csv::Reader<&'a [u8]> {
    csv::ReaderBuilder::new()
        .delimiter(config.delimiter)
        .quote(config.quote)
        .has_headers(true)
        .flexible(true)
        .from_reader(data)
}

/// Lazy iterator over the data rows of a [`TabularFile`].
///
/// Blank rows (every field empty or whitespace) are skipped here, so nothing
/// downstream ever sees them.
pub struct Rows<'a> {
    headers: &'a [String],
    records: csv::StringRecordsIntoIter<&'a [u8]>,
}

impl Iterator for Rows<'_> {
    type Item = Result<RowRecord, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => return Some(Err(IngestError::MalformedInput(e.to_string()))),
            };

            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }

            // Fields past the last header are dropped; duplicate header names
            // keep the first column's value.
            let mut row = IndexMap::with_capacity(self.headers.len());
            for (header, value) in self.headers.iter().zip(record.iter()) {
                row.entry(header.clone())
                    .or_insert_with(|| value.to_string());
            }
            return Some(Ok(row));
        }
    }
}
