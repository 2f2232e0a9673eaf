//! Types module
//!
//! Contains core data structures used throughout the ledger.
//! This module organizes types into logical submodules:
//! - `ids`: Surrogate key aliases for every relation
//! - `account`: Accounts and beneficiaries
//! - `transaction`: Recorded money movements
//! - `loan`: Loans, their payment schedules and lifecycle states
//! - `error`: Error type shared by every ledger operation

pub mod account;
pub mod error;
pub mod ids;
pub mod loan;
pub mod transaction;

pub use account::{Account, Beneficiary, NewAccount, NewBeneficiary};
pub use error::{Entity, LedgerError};
pub use ids::{
    AccountId, BeneficiaryId, BranchId, CustomerId, LoanId, PaymentId, TransactionId,
};
pub use loan::{
    Loan, LoanPayment, LoanStatus, LoanWithPayments, NewLoan, NewLoanPayment, PaymentStatus,
};
pub use transaction::{NewTransaction, Transaction, TransactionKind};
