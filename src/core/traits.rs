//! Ledger Store capability traits
//!
//! The ledger components never touch storage directly. They open a scoped
//! transaction against a `LedgerStore` and work through a `UnitOfWork`, which
//! combines one repository trait per relation.
//!
//! # Scope semantics
//!
//! - Reads observe committed state plus the scope's own writes.
//! - If the body returns `Err` (or panics) nothing it wrote becomes visible.
//! - Row locks named up front are held for the whole scope.

use crate::types::{
    Account, AccountId, Beneficiary, CustomerId, LedgerError, Loan, LoanId, LoanPayment,
    NewAccount, NewBeneficiary, NewLoan, NewLoanPayment, NewTransaction, PaymentId, Transaction,
};

/// A contended row guarded by a store-level mutex
///
/// The derived ordering (accounts before loans, lower id first) is the global
/// acquisition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    Account(AccountId),
    Loan(LoanId),
}

/// Account rows
pub trait AccountRepository {
    /// Insert a new account with a store-assigned id and zero balance
    fn insert_account(&mut self, account: NewAccount) -> Result<Account, LedgerError>;

    fn account(&self, id: AccountId) -> Result<Option<Account>, LedgerError>;

    /// Overwrite an existing account row
    fn update_account(&mut self, account: Account) -> Result<(), LedgerError>;

    /// Accounts ordered by id, optionally restricted to one customer
    fn accounts(&self, customer: Option<CustomerId>) -> Result<Vec<Account>, LedgerError>;
}

/// Transaction history rows (append-only)
pub trait TransactionRepository {
    fn insert_transaction(&mut self, tx: NewTransaction) -> Result<Transaction, LedgerError>;

    /// Transactions where the account is source or destination
    ///
    /// Newest first (ties broken by descending id), at most `limit` rows.
    fn transactions_for_account(
        &self,
        account: AccountId,
        limit: usize,
    ) -> Result<Vec<Transaction>, LedgerError>;
}

/// Loan rows
pub trait LoanRepository {
    fn insert_loan(&mut self, loan: NewLoan) -> Result<Loan, LedgerError>;

    fn loan(&self, id: LoanId) -> Result<Option<Loan>, LedgerError>;

    fn update_loan(&mut self, loan: Loan) -> Result<(), LedgerError>;

    /// Loans ordered by id, optionally restricted to one customer
    fn loans(&self, customer: Option<CustomerId>) -> Result<Vec<Loan>, LedgerError>;
}

/// Scheduled installment rows
pub trait LoanPaymentRepository {
    fn insert_payment(&mut self, payment: NewLoanPayment) -> Result<LoanPayment, LedgerError>;

    fn payment(&self, id: PaymentId) -> Result<Option<LoanPayment>, LedgerError>;

    fn update_payment(&mut self, payment: LoanPayment) -> Result<(), LedgerError>;

    /// A loan's installments ordered by due date
    fn payments_for_loan(&self, loan: LoanId) -> Result<Vec<LoanPayment>, LedgerError>;
}

/// Beneficiary rows
pub trait BeneficiaryRepository {
    fn insert_beneficiary(
        &mut self,
        beneficiary: NewBeneficiary,
    ) -> Result<Beneficiary, LedgerError>;

    /// Beneficiaries registered by a customer, ordered by id
    fn beneficiaries(&self, owner: CustomerId) -> Result<Vec<Beneficiary>, LedgerError>;
}

/// Every repository available inside one transactional scope
pub trait UnitOfWork:
    AccountRepository
    + TransactionRepository
    + LoanRepository
    + LoanPaymentRepository
    + BeneficiaryRepository
{
}

impl<T> UnitOfWork for T where
    T: AccountRepository
        + TransactionRepository
        + LoanRepository
        + LoanPaymentRepository
        + BeneficiaryRepository
{
}

/// Body of a transactional scope
pub type ScopeBody<'a> = dyn FnMut(&mut dyn UnitOfWork) -> Result<(), LedgerError> + 'a;

/// Transactional storage for the ledger
///
/// Implementations must be safe to share across threads; every mutating
/// ledger operation runs through `transaction`.
pub trait LedgerStore: Send + Sync {
    /// Run `body` inside one atomic scope holding the given row locks
    ///
    /// Locks are sorted and de-duplicated before acquisition. The scope's
    /// writes are committed only if `body` returns `Ok`.
    fn transaction(&self, locks: &[LockKey], body: &mut ScopeBody<'_>) -> Result<(), LedgerError>;
}

impl dyn LedgerStore {
    /// Run a closure in a scope and hand back its value
    ///
    /// Convenience wrapper over `transaction` for bodies that produce a result.
    pub fn run<T, F>(&self, locks: &[LockKey], f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut dyn UnitOfWork) -> Result<T, LedgerError>,
    {
        let mut body = Some(f);
        let mut output = None;

        self.transaction(locks, &mut |uow: &mut dyn UnitOfWork| {
            let f = body
                .take()
                .ok_or_else(|| LedgerError::store_failure("scope body invoked twice"))?;
            output = Some(f(uow)?);
            Ok(())
        })?;

        output.ok_or_else(|| LedgerError::store_failure("scope committed without a result"))
    }

    /// Run a read-only closure in a scope that takes no row locks
    pub fn read<T, F>(&self, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&dyn UnitOfWork) -> Result<T, LedgerError>,
    {
        self.run(&[], |uow| f(uow))
    }
}
