use crate::config::{EngineConfig, DEFAULT_STATEMENT_LIMIT};
use crate::strategy::BatchConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Replay banking ledger commands and report the final state
#[derive(Parser, Debug)]
#[command(name = "ledger-engine")]
#[command(about = "Replay banking ledger commands and report the final state", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing ledger commands
    #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
    pub input_file: PathBuf,

    /// Processing strategy to use
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Processing strategy: 'sync' for sequential or 'async' for concurrent batches"
    )]
    pub strategy: StrategyType,

    /// Number of commands per batch (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of commands per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Maximum number of concurrent command groups (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Maximum number of command groups processing concurrently (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    /// Report written to stdout after all commands have run
    #[arg(
        long = "report",
        value_name = "REPORT",
        default_value = "accounts",
        help = "Report to print: 'accounts' or 'loans'"
    )]
    pub report: ReportKind,

    /// Maximum number of transactions returned by a statement
    #[arg(
        long = "statement-limit",
        value_name = "COUNT",
        default_value_t = DEFAULT_STATEMENT_LIMIT,
        help = "Maximum number of transactions per statement"
    )]
    pub statement_limit: usize,

    /// Round the EMI to this many decimal places
    #[arg(
        long = "emi-scale",
        value_name = "PLACES",
        help = "Decimal places the EMI is rounded to (default: full precision)"
    )]
    pub emi_scale: Option<u32>,
}

/// Available processing strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

/// Available end-of-run reports
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportKind {
    Accounts,
    Loans,
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments
    ///
    /// Missing values fall back to defaults; zero values are replaced by the
    /// default with a warning.
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            BatchConfig::default()
        }
    }

    /// Create the ledger's EngineConfig from CLI arguments
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig::new(self.statement_limit, self.emi_scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::default_strategy(&["program", "input.csv"], StrategyType::Async)]
    #[case::explicit_sync(&["program", "--strategy", "sync", "input.csv"], StrategyType::Sync)]
    #[case::explicit_async(&["program", "--strategy", "async", "input.csv"], StrategyType::Async)]
    fn test_strategy_parsing(#[case] args: &[&str], #[case] expected: StrategyType) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.strategy, expected);
    }

    #[rstest]
    #[case::default_report(&["program", "input.csv"], ReportKind::Accounts)]
    #[case::loans(&["program", "--report", "loans", "input.csv"], ReportKind::Loans)]
    fn test_report_parsing(#[case] args: &[&str], #[case] expected: ReportKind) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.report, expected);
    }

    #[rstest]
    #[case::all_defaults(&["program", "input.csv"], 1000, num_cpus::get())]
    #[case::custom_batch_size(&["program", "--batch-size", "2000", "input.csv"], 2000, num_cpus::get())]
    #[case::custom_max_concurrent(&["program", "--max-concurrent", "8", "input.csv"], 1000, 8)]
    #[case::zero_batch_size(&["program", "--batch-size", "0", "input.csv"], 1000, num_cpus::get())]
    #[case::zero_max_concurrent(&["program", "--max-concurrent", "0", "input.csv"], 1000, num_cpus::get())]
    fn test_batch_config_conversion(
        #[case] args: &[&str],
        #[case] expected_batch_size: usize,
        #[case] expected_max_concurrent: usize,
    ) {
        let config = CliArgs::try_parse_from(args).unwrap().to_batch_config();

        assert_eq!(config.batch_size, expected_batch_size);
        assert_eq!(config.max_concurrent_batches, expected_max_concurrent);
    }

    #[rstest]
    #[case::defaults(&["program", "input.csv"], 100, None)]
    #[case::custom(&["program", "--statement-limit", "20", "--emi-scale", "2", "input.csv"], 20, Some(2))]
    #[case::zero_limit_falls_back(&["program", "--statement-limit", "0", "input.csv"], 100, None)]
    #[case::oversized_scale_ignored(&["program", "--emi-scale", "40", "input.csv"], 100, None)]
    fn test_engine_config_conversion(
        #[case] args: &[&str],
        #[case] expected_limit: usize,
        #[case] expected_scale: Option<u32>,
    ) {
        let config = CliArgs::try_parse_from(args).unwrap().to_engine_config();

        assert_eq!(config.statement_limit, expected_limit);
        assert_eq!(config.emi_scale, expected_scale);
    }

    #[rstest]
    #[case::missing_input(&["program"])]
    #[case::invalid_strategy(&["program", "--strategy", "invalid", "input.csv"])]
    #[case::invalid_report(&["program", "--report", "balances", "input.csv"])]
    #[case::negative_scale(&["program", "--emi-scale", "-1", "input.csv"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        assert!(CliArgs::try_parse_from(args).is_err());
    }
}
