// Public API
pub mod error;
pub mod formats;
pub mod ingest;
pub mod io;
pub mod runner;
pub mod schema;
pub mod sink;
pub mod store;
pub mod telemetry;

// Internal modules
mod config;
