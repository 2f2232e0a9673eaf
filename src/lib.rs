//! Banking Ledger & Loan-Amortization Engine
//! # Overview
//!
//! This library manages customer accounts, moves money between them and
//! issues equal-installment loans, keeping balances non-negative and every
//! multi-row change atomic. A command runner replays CSV files of ledger
//! commands through the engine with a sync or an async strategy.
//!
//! # Architecture
//!
//! - [`types`] - Core data types (Account, Transaction, Loan, LedgerError, ...)
//! - [`config`] - Explicit engine configuration
//! - [`core`] - Ledger components:
//!   - [`core::traits`] - Ledger Store capability traits
//!   - [`core::store`] - In-memory transactional store with row locks
//!   - [`core::account_manager`] - Transfers, deposits, account opening
//!   - [`core::loan_engine`] - EMI, schedules and loan issuance
//!   - [`core::payment_processor`] - Installment payment and loan completion
//!   - [`core::statement_reader`] - Account statements
//!   - [`core::beneficiary_registry`] - Payee registration
//!   - [`core::ledger`] - Facade and command dispatch
//! - [`io`] - Command CSV parsing and report output
//! - [`strategy`] - Sequential and concurrent processing pipelines
//! - [`cli`] - CLI arguments parsing
//!
//! # Commands
//!
//! - **open**: Open an account with a zero balance
//! - **deposit**: Credit external funds to an account
//! - **transfer**: Move funds between two accounts (never overdraws)
//! - **loan**: Issue a loan with its full monthly schedule
//! - **repay**: Pay one installment; the last one marks the loan repaid
//! - **beneficiary**: Register a payee account for a customer

pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod strategy;
pub mod types;

pub use config::EngineConfig;
pub use core::{
    calculate_emi, CommandOutcome, Ledger, LedgerCommand, LedgerStore, MemoryLedgerStore,
};
pub use io::{write_accounts_csv, write_loans_csv};
pub use types::{
    Account, AccountId, LedgerError, Loan, LoanId, LoanPayment, LoanStatus, LoanWithPayments,
    PaymentId, PaymentStatus, Transaction, TransactionId,
};
