//! Engine configuration
//!
//! `EngineConfig` is built once at startup (from CLI arguments) and handed to
//! the ledger components by value. Nothing in the crate reads configuration
//! from global state.

use tracing::warn;

/// Default number of transactions returned by a statement query
pub const DEFAULT_STATEMENT_LIMIT: usize = 100;

/// Largest scale a `rust_decimal::Decimal` can carry
pub const MAX_DECIMAL_SCALE: u32 = 28;

/// Tunables for the ledger core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum number of transactions returned by `GetStatements`
    pub statement_limit: usize,

    /// Decimal places the EMI is rounded to before the schedule is built
    ///
    /// `None` keeps full decimal precision.
    pub emi_scale: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            statement_limit: DEFAULT_STATEMENT_LIMIT,
            emi_scale: None,
        }
    }
}

impl EngineConfig {
    /// Create a new EngineConfig, falling back to defaults for invalid values
    ///
    /// # Arguments
    ///
    /// * `statement_limit` - Maximum statement length (0 falls back to the default)
    /// * `emi_scale` - Optional EMI rounding scale (values above 28 are ignored)
    pub fn new(statement_limit: usize, emi_scale: Option<u32>) -> Self {
        let default = Self::default();

        let statement_limit = if statement_limit == 0 {
            warn!(
                statement_limit,
                default = default.statement_limit,
                "invalid statement limit, using default"
            );
            default.statement_limit
        } else {
            statement_limit
        };

        let emi_scale = match emi_scale {
            Some(scale) if scale > MAX_DECIMAL_SCALE => {
                warn!(scale, "EMI scale exceeds decimal precision, keeping full precision");
                None
            }
            other => other,
        };

        Self {
            statement_limit,
            emi_scale,
        }
    }
}
