//! I/O module
//!
//! Handles command CSV parsing and report output.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (row conversion, report serialization)
//! - `sync_reader` - Synchronous CSV reader with iterator interface
//! - `async_reader` - Asynchronous CSV reader with batch reading interface
//! - `error` - Fatal runner errors

pub mod async_reader;
pub mod csv_format;
pub mod error;
pub mod sync_reader;

pub use async_reader::AsyncReader;
pub use csv_format::{convert_csv_command, write_accounts_csv, write_loans_csv, CsvCommand};
pub use error::RunnerError;
pub use sync_reader::SyncReader;
