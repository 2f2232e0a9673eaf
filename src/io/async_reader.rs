//! Asynchronous CSV reader with batch interface
//!
//! Provides a streaming interface over ledger commands from a CSV source,
//! read in batches for the concurrent processing strategy.
//!
//! # Architecture
//!
//! ```text
//! CSV Reader → AsyncReader → Batches of LedgerCommands
//!                  ↓
//!           csv_format module
//!           (CsvCommand, convert_csv_command)
//! ```

use crate::core::LedgerCommand;
use crate::io::csv_format::{convert_csv_command, CsvCommand};
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use tracing::warn;

/// Asynchronous CSV reader
///
/// Invalid rows are logged and skipped; they never end a batch early.
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
    line_num: usize,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    /// Create a new AsyncReader from an async reader
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self {
            csv_reader,
            line_num: 0,
        }
    }

    /// Read a batch of commands
    ///
    /// Reads rows until `batch_size` commands have been converted or the
    /// input is exhausted.
    ///
    /// # Returns
    ///
    /// The successfully converted commands, in input order. An empty vector
    /// means the end of the input has been reached.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<LedgerCommand> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut rows = self.csv_reader.deserialize::<CsvCommand>();

        while batch.len() < batch_size {
            let Some(row) = rows.next().await else {
                break;
            };
            self.line_num += 1;
            let line = self.line_num + 1;

            match row {
                Ok(csv_row) => match convert_csv_command(csv_row) {
                    Ok(command) => batch.push(command),
                    Err(e) => warn!(line, error = %e, "skipping invalid command"),
                },
                Err(e) => warn!(line, error = %e, "skipping malformed CSV row"),
            }
        }

        batch
    }
}
