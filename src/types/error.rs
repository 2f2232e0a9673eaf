//! Error types for the ledger
//!
//! Every ledger operation returns `Result<_, LedgerError>`. Errors are
//! structured so callers can branch on the failure kind without parsing text.
//!
//! # Error Categories
//!
//! - **Domain errors**: the request is refused (missing entity, insufficient
//!   funds, bad term, double payment, ...). The transactional scope is rolled
//!   back and nothing is committed.
//! - **Store failures**: the Ledger Store itself failed. Surfaced as-is, never
//!   retried by the core.

use super::ids::{AccountId, LoanId, PaymentId};
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

/// Kind of record a `NotFound` error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Account,
    Loan,
    Payment,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Account => "Account",
            Entity::Loan => "Loan",
            Entity::Payment => "Payment",
        };
        f.write_str(name)
    }
}

/// Main error type for the ledger
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// A referenced record does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: u64 },

    /// Source balance cannot cover the requested amount
    #[error("Insufficient funds in account {account}: available {available}, requested {requested}")]
    InsufficientFunds {
        account: AccountId,
        available: Decimal,
        requested: Decimal,
    },

    /// Transfer source and destination are the same account
    #[error("Cannot transfer from account {account} to itself")]
    SameAccount { account: AccountId },

    /// Loan term must be at least one month
    #[error("Invalid loan term {term}: must be at least one month")]
    InvalidTerm { term: i64 },

    /// Monetary amount must be strictly positive
    #[error("Invalid amount {amount} for {operation}: must be greater than zero")]
    InvalidAmount { amount: Decimal, operation: String },

    /// Interest rate must not be negative
    #[error("Invalid annual rate {rate}: must not be negative")]
    InvalidRate { rate: Decimal },

    /// A free-form input field failed validation
    #[error("Invalid {field}: {message}")]
    InvalidInput { field: String, message: String },

    /// The payment belongs to a different loan than the one supplied
    #[error("Payment {payment} belongs to loan {actual_loan}, not loan {expected_loan}")]
    Mismatch {
        payment: PaymentId,
        expected_loan: LoanId,
        actual_loan: LoanId,
    },

    /// The installment has already been paid
    #[error("Payment {payment} has already been paid")]
    AlreadyPaid { payment: PaymentId },

    /// Decimal arithmetic would overflow
    #[error("Arithmetic overflow in {operation}")]
    ArithmeticOverflow { operation: String },

    /// The Ledger Store failed
    #[error("Store failure: {message}")]
    StoreFailure { message: String },
}

// Helper functions for creating common errors

impl LedgerError {
    pub fn not_found(entity: Entity, id: u64) -> Self {
        LedgerError::NotFound { entity, id }
    }

    pub fn insufficient_funds(account: AccountId, available: Decimal, requested: Decimal) -> Self {
        LedgerError::InsufficientFunds {
            account,
            available,
            requested,
        }
    }

    pub fn same_account(account: AccountId) -> Self {
        LedgerError::SameAccount { account }
    }

    pub fn invalid_term(term: i64) -> Self {
        LedgerError::InvalidTerm { term }
    }

    pub fn invalid_amount(amount: Decimal, operation: &str) -> Self {
        LedgerError::InvalidAmount {
            amount,
            operation: operation.to_string(),
        }
    }

    pub fn invalid_rate(rate: Decimal) -> Self {
        LedgerError::InvalidRate { rate }
    }

    pub fn invalid_input(field: &str, message: &str) -> Self {
        LedgerError::InvalidInput {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn mismatch(payment: PaymentId, expected_loan: LoanId, actual_loan: LoanId) -> Self {
        LedgerError::Mismatch {
            payment,
            expected_loan,
            actual_loan,
        }
    }

    pub fn already_paid(payment: PaymentId) -> Self {
        LedgerError::AlreadyPaid { payment }
    }

    pub fn arithmetic_overflow(operation: &str) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
        }
    }

    pub fn store_failure(message: impl Into<String>) -> Self {
        LedgerError::StoreFailure {
            message: message.into(),
        }
    }

    /// Whether this is a domain refusal rather than an infrastructure failure
    pub fn is_domain(&self) -> bool {
        !matches!(self, LedgerError::StoreFailure { .. })
    }
}
