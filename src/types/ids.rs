//! Surrogate key aliases
//!
//! Every relation in the ledger is keyed by an integer assigned by the store.
//! Stores hand out ids sequentially starting at 1; an id consumed by a scope
//! that rolls back is never reused.

/// Account identifier
pub type AccountId = u64;

/// Recorded transaction identifier
pub type TransactionId = u64;

/// Loan identifier
pub type LoanId = u64;

/// Loan payment (installment) identifier
pub type PaymentId = u64;

/// Beneficiary identifier
pub type BeneficiaryId = u64;

/// Customer identifier
///
/// Customers are owned by the external identity layer; the ledger only
/// carries the id.
pub type CustomerId = u64;

/// Branch identifier
pub type BranchId = u64;
