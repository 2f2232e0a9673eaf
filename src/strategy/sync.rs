//! Synchronous processing strategy
//!
//! Single-threaded implementation of the ProcessingStrategy trait. Commands
//! are streamed from the CSV file one at a time and executed in input order.
//!
//! # Design
//!
//! The SyncProcessingStrategy focuses on orchestration, delegating:
//! - CSV parsing to `SyncReader` (iterator interface)
//! - Command execution to `Ledger` (business logic)
//! - Report output to `write_report` (format handling)

use crate::cli::ReportKind;
use crate::config::EngineConfig;
use crate::core::Ledger;
use crate::io::sync_reader::SyncReader;
use crate::io::RunnerError;
use crate::strategy::{write_report, ProcessingStrategy};
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Synchronous processing strategy
///
/// # Examples
///
/// ```no_run
/// use ledger_engine::cli::ReportKind;
/// use ledger_engine::config::EngineConfig;
/// use ledger_engine::strategy::{ProcessingStrategy, SyncProcessingStrategy};
/// use std::path::Path;
/// use std::io;
///
/// let strategy = SyncProcessingStrategy::new(EngineConfig::default(), ReportKind::Accounts);
/// let mut output = io::stdout();
///
/// strategy.process(Path::new("commands.csv"), &mut output)
///     .expect("Processing failed");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SyncProcessingStrategy {
    engine: EngineConfig,
    report: ReportKind,
}

impl SyncProcessingStrategy {
    pub fn new(engine: EngineConfig, report: ReportKind) -> Self {
        Self { engine, report }
    }
}

impl ProcessingStrategy for SyncProcessingStrategy {
    /// Run every command in input order, then write the report
    ///
    /// Fatal errors (file not found, I/O errors) are returned immediately.
    /// Malformed rows and failing commands are logged and processing continues.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), RunnerError> {
        let ledger = Ledger::in_memory(self.engine);
        let reader = SyncReader::new(input_path)?;

        let mut executed = 0usize;
        let mut failed = 0usize;

        for row in reader {
            match row {
                Ok(command) => {
                    executed += 1;
                    let description = command.to_string();
                    if let Err(e) = ledger.execute(command) {
                        failed += 1;
                        warn!(command = %description, error = %e, "command failed");
                    }
                }
                Err(e) => warn!(error = %e, "skipping CSV row"),
            }
        }

        info!(executed, failed, "sync run complete");
        write_report(&ledger, self.report, output)
    }
}
