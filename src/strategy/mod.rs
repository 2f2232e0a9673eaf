//! Processing strategy module for command runs
//!
//! This module defines the Strategy pattern for complete command-processing
//! pipelines, encompassing CSV parsing, ledger execution and report output.
//! Different implementations (sequential, concurrent batches) are selected at
//! runtime.

use crate::cli::{ReportKind, StrategyType};
use crate::config::EngineConfig;
use crate::core::Ledger;
use crate::io::{write_accounts_csv, write_loans_csv, RunnerError};
use std::io::Write;
use std::path::Path;

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Processing strategy trait for complete command-processing pipelines
///
/// Each strategy reads ledger commands from a CSV file, runs them against a
/// fresh in-memory ledger and writes the selected report to output.
pub trait ProcessingStrategy: Send + Sync {
    /// Process commands from input file and write the report to output
    ///
    /// # Arguments
    ///
    /// * `input_path` - Path to the input CSV file containing ledger commands
    /// * `output` - Mutable reference to a writer for the report
    ///
    /// # Returns
    ///
    /// * `Ok(())` if the run completed (individual commands may have failed)
    /// * `Err(RunnerError)` if a fatal error occurred (file not found, I/O error, etc.)
    ///
    /// Individual command failures are logged and do not abort the run.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), RunnerError>;
}

/// Write the selected report for the final ledger state
pub fn write_report(
    ledger: &Ledger,
    report: ReportKind,
    output: &mut dyn Write,
) -> Result<(), RunnerError> {
    match report {
        ReportKind::Accounts => write_accounts_csv(&ledger.accounts().all_accounts()?, output),
        ReportKind::Loans => write_loans_csv(&ledger.loans().all_loans()?, output),
    }
}

/// Create a processing strategy based on the specified strategy type
///
/// # Arguments
///
/// * `strategy_type` - The type of processing strategy to create (Sync or Async)
/// * `engine` - Ledger configuration shared by both strategies
/// * `report` - Which report to write once all commands have run
/// * `batch` - Optional configuration for async batch processing (ignored for sync)
///
/// # Returns
///
/// A boxed trait object implementing the ProcessingStrategy trait
pub fn create_strategy(
    strategy_type: StrategyType,
    engine: EngineConfig,
    report: ReportKind,
    batch: Option<BatchConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy::new(engine, report)),
        StrategyType::Async => Box::new(AsyncProcessingStrategy::new(
            batch.unwrap_or_default(),
            engine,
            report,
        )),
    }
}
