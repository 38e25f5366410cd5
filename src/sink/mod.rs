//! Replication of ingested rows into a push-dataset analytics sink
//!
//! The sink is optional and best-effort: nothing in here can fail an ingest
//! job. [`SinkClient`] holds the protocol (token, dataset creation, row
//! pushes) and talks through a [`SinkTransport`] so the HTTP layer can be
//! swapped out in tests.

pub mod client;
pub mod config;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

use once_cell::sync::Lazy;
use regex::Regex;

pub use client::SinkClient;
pub use config::{SinkConfig, SinkConfigBuilder};
pub use transport::{HttpTransport, SinkTransport, TokenRequest, TransportResponse};
pub use types::{SinkColumn, SinkDataType};

// ASCII whitespace only; a no-break space is dropped like any other symbol
static DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_ \t\n\x0B\x0C\r-]").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?-u:\s)+").unwrap());

/// Make a dataset name acceptable to the sink.
///
/// Drops everything except ASCII letters, digits, `_`, `-` and ASCII
/// whitespace, trims, then joins whitespace runs with `_`.
pub fn sanitize_dataset_name(name: &str) -> String {
    let kept = DISALLOWED.replace_all(name, "");
    WHITESPACE.replace_all(kept.trim(), "_").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_dataset_name() {
        let test_cases = [
            ("Jane's Salon #1 (2024)", "Janes_Salon_1_2024"),
            ("  padded   name  ", "padded_name"),
            ("already_fine-1", "already_fine-1"),
            ("tabs\tand\nnewlines", "tabs_and_newlines"),
            ("café menu", "caf_menu"),
            ("!!!", ""),
            ("Sales\u{00A0}Q1\u{3000}x", "SalesQ1x"),
        ];

        for (input, expected) in test_cases {
            assert_eq!(sanitize_dataset_name(input), expected, "input '{}'", input);
        }
    }
}
