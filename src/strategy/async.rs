//! Asynchronous batch processing strategy
//!
//! Multi-threaded implementation of the ProcessingStrategy trait. Commands are
//! read in batches and each batch is handed to the `BatchProcessor`, which
//! runs independent commands in parallel.
//!
//! # Architecture
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent_batches)
//!     ├── AsyncReader (batch CSV reading)
//!     ├── BatchProcessor (wave splitting + lock-set partitioning)
//!     └── Ledger (shared via Arc)
//!         └── MemoryLedgerStore (row locks + transactional overlay)
//! ```
//!
//! Batches are processed one after another, so a command never runs before
//! a command that precedes it in a previous batch.

use crate::cli::ReportKind;
use crate::config::EngineConfig;
use crate::core::{BatchProcessor, Ledger};
use crate::io::async_reader::AsyncReader;
use crate::io::RunnerError;
use crate::strategy::{write_report, ProcessingStrategy};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Configuration for batch processing
///
/// Controls how commands are batched and how many command groups run in
/// parallel within each batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Number of commands per batch
    pub batch_size: usize,
    /// Maximum number of command groups processing concurrently
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig, falling back to defaults for zero values
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                batch_size,
                default = default.batch_size,
                "invalid batch size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                max_concurrent_batches,
                default = default.max_concurrent_batches,
                "invalid max concurrent batches, using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Asynchronous batch processing strategy
///
/// # Configuration
///
/// - `batch_size`: Number of commands per batch (default: 1000)
/// - `max_concurrent_batches`: Worker threads and parallel groups (default: CPU cores)
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    config: BatchConfig,
    engine: EngineConfig,
    report: ReportKind,
}

impl AsyncProcessingStrategy {
    pub fn new(config: BatchConfig, engine: EngineConfig, report: ReportKind) -> Self {
        Self {
            config,
            engine,
            report,
        }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    /// Run commands batch by batch, then write the report
    ///
    /// Fatal errors (file not found, I/O errors, runtime errors) are returned
    /// immediately. Malformed rows and failing commands are logged and
    /// processing continues.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), RunnerError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .build()
            .map_err(RunnerError::Runtime)?;

        runtime.block_on(async {
            let ledger = Arc::new(Ledger::in_memory(self.engine));
            let processor =
                BatchProcessor::new(Arc::clone(&ledger), self.config.max_concurrent_batches);

            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| RunnerError::open(input_path, e))?;

            // csv-async reads through the futures-io traits
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);

            let mut executed = 0usize;
            let mut failed = 0usize;

            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                if batch.is_empty() {
                    break;
                }

                for processed in processor.process_batch(batch).await {
                    executed += 1;
                    if let Err(e) = processed.result {
                        failed += 1;
                        warn!(command = %processed.command, error = %e, "command failed");
                    }
                }
            }

            info!(executed, failed, "async run complete");
            write_report(&ledger, self.report, output)
        })
    }
}
