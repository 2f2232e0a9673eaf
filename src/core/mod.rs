//! Core ledger module
//!
//! This module contains the ledger and loan-amortization components:
//! - `traits` - Ledger Store capability traits (`LedgerStore`, `UnitOfWork`)
//! - `store` - In-memory transactional store
//! - `clock` - Time source abstraction
//! - `account_manager` - Balance mutation, transfers and deposits
//! - `loan_engine` - EMI computation, schedules and loan issuance
//! - `payment_processor` - Installment payment and loan completion
//! - `statement_reader` - Account transaction history
//! - `beneficiary_registry` - Payee registration
//! - `ledger` - Facade and command dispatch
//! - `batch_processor` - Concurrent command execution

pub mod account_manager;
pub mod batch_processor;
pub mod beneficiary_registry;
pub mod clock;
pub mod ledger;
pub mod loan_engine;
pub mod payment_processor;
pub mod statement_reader;
pub mod store;
pub mod traits;

pub use account_manager::AccountBalanceManager;
pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use beneficiary_registry::BeneficiaryRegistry;
pub use clock::{Clock, FixedClock, SystemClock};
pub use ledger::{CommandOutcome, Ledger, LedgerCommand};
pub use loan_engine::{calculate_emi, LoanAmortizationEngine};
pub use payment_processor::LoanPaymentProcessor;
pub use statement_reader::StatementReader;
pub use store::MemoryLedgerStore;
pub use traits::{LedgerStore, LockKey, UnitOfWork};
