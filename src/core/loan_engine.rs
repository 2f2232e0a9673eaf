//! Loan amortization engine
//!
//! Computes the equal monthly installment (EMI), builds the payment schedule
//! and issues loans. A loan row and its full schedule are written in one
//! Ledger Store scope: a failure while writing any installment leaves neither
//! the loan nor any of its payments behind.
//!
//! # EMI
//!
//! ```text
//! r   = annual_rate / 12
//! EMI = principal / n                              if r == 0
//! EMI = principal * r * (1+r)^n / ((1+r)^n - 1)    otherwise
//! ```

use std::sync::Arc;

use chrono::{Months, NaiveDate};
use rust_decimal::prelude::MathematicalOps;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::info;

use super::clock::Clock;
use super::traits::{LedgerStore, UnitOfWork};
use crate::config::EngineConfig;
use crate::types::{
    BranchId, CustomerId, Entity, LedgerError, Loan, LoanId, LoanWithPayments, NewLoan,
    NewLoanPayment,
};

const MONTHS_PER_YEAR: u32 = 12;

/// Compute the equal monthly installment for a loan
///
/// # Arguments
///
/// * `principal` - Amount borrowed
/// * `annual_rate` - Annual interest rate as a fraction (0.12 = 12% p.a.)
/// * `term_months` - Number of installments (must be at least 1)
///
/// # Returns
///
/// The EMI at full decimal precision, or `ArithmeticOverflow` if an
/// intermediate value does not fit in a `Decimal`.
pub fn calculate_emi(
    principal: Decimal,
    annual_rate: Decimal,
    term_months: u32,
) -> Result<Decimal, LedgerError> {
    if term_months == 0 {
        return Err(LedgerError::invalid_term(0));
    }

    let n = Decimal::from(term_months);
    let overflow = || LedgerError::arithmetic_overflow("EMI calculation");

    let r = annual_rate
        .checked_div(Decimal::from(MONTHS_PER_YEAR))
        .ok_or_else(overflow)?;

    if r.is_zero() {
        return principal.checked_div(n).ok_or_else(overflow);
    }

    // growth / (growth - 1) tends to 1; once growth no longer fits in a
    // Decimal the difference is below Decimal precision
    let ratio = match (Decimal::ONE + r).checked_powu(u64::from(term_months)) {
        Some(growth) => {
            let denominator = growth.checked_sub(Decimal::ONE).ok_or_else(overflow)?;
            growth.checked_div(denominator).ok_or_else(overflow)?
        }
        None => Decimal::ONE,
    };

    principal
        .checked_mul(r)
        .and_then(|v| v.checked_mul(ratio))
        .ok_or_else(overflow)
}

/// Due dates of a schedule: `start + i` months for `i` in `1..=term_months`
///
/// Each date is computed from `start` (clamped to the end of shorter months),
/// so a start on the 31st yields Feb 29, Mar 31, Apr 30, ...
pub fn due_dates(start: NaiveDate, term_months: u32) -> Result<Vec<NaiveDate>, LedgerError> {
    (1..=term_months)
        .map(|i| {
            start
                .checked_add_months(Months::new(i))
                .ok_or_else(|| LedgerError::arithmetic_overflow("due date"))
        })
        .collect()
}

/// Issues loans and reads them back with their schedules
#[derive(Clone)]
pub struct LoanAmortizationEngine {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl LoanAmortizationEngine {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Issue a loan together with its full payment schedule
    ///
    /// The loan starts today (per the clock) in `approved` status. Its schedule
    /// holds `term_months` pending installments of one EMI each.
    ///
    /// # Arguments
    ///
    /// * `customer_id` - Borrowing customer
    /// * `branch_id` - Issuing branch
    /// * `principal` - Amount borrowed (must be positive)
    /// * `annual_rate` - Annual rate as a fraction (must not be negative)
    /// * `term_months` - Number of monthly installments (must be positive)
    ///
    /// # Errors
    ///
    /// - `InvalidTerm` if `term_months <= 0`
    /// - `InvalidAmount` if `principal <= 0`
    /// - `InvalidRate` if `annual_rate < 0`
    /// - `ArithmeticOverflow` if the EMI or a due date cannot be computed
    /// - Any store failure raised while writing, after which nothing is kept
    pub fn create_loan(
        &self,
        customer_id: CustomerId,
        branch_id: BranchId,
        principal: Decimal,
        annual_rate: Decimal,
        term_months: i32,
    ) -> Result<LoanWithPayments, LedgerError> {
        let term = u32::try_from(term_months)
            .ok()
            .filter(|t| *t > 0)
            .ok_or_else(|| LedgerError::invalid_term(i64::from(term_months)))?;
        if principal <= Decimal::ZERO {
            return Err(LedgerError::invalid_amount(principal, "loan principal"));
        }
        if annual_rate < Decimal::ZERO {
            return Err(LedgerError::invalid_rate(annual_rate));
        }

        let mut emi = calculate_emi(principal, annual_rate, term)?;
        if let Some(scale) = self.config.emi_scale {
            emi = emi.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
        }
        let total_payable = emi
            .checked_mul(Decimal::from(term))
            .ok_or_else(|| LedgerError::arithmetic_overflow("total payable"))?;

        let start_date = self.clock.today();
        let schedule = due_dates(start_date, term)?;
        let end_date = start_date
            .checked_add_months(Months::new(term))
            .ok_or_else(|| LedgerError::arithmetic_overflow("loan end date"))?;

        let new_loan = NewLoan {
            customer_id,
            branch_id,
            principal,
            annual_rate,
            term_months: term,
            emi,
            total_payable,
            start_date,
            end_date,
        };

        let issued = self.store.run(&[], |uow| {
            let loan = uow.insert_loan(new_loan)?;
            for due_date in schedule {
                uow.insert_payment(NewLoanPayment {
                    loan_id: loan.id,
                    amount: emi,
                    due_date,
                })?;
            }
            load_with_payments(uow, loan.id)
        })?;

        info!(
            loan_id = issued.loan.id,
            customer_id,
            %principal,
            term,
            emi = %issued.loan.emi,
            "loan issued"
        );
        Ok(issued)
    }

    /// Loans of a customer with their schedules, ordered by id
    pub fn list_loans(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<LoanWithPayments>, LedgerError> {
        self.store.read(|uow| {
            let loans = uow.loans(Some(customer_id))?;
            with_schedules(uow, loans)
        })
    }

    /// A single loan with its schedule
    pub fn get_loan(&self, loan_id: LoanId) -> Result<LoanWithPayments, LedgerError> {
        self.store.read(|uow| load_with_payments(uow, loan_id))
    }

    /// Every loan in the ledger with its schedule, ordered by id
    pub fn all_loans(&self) -> Result<Vec<LoanWithPayments>, LedgerError> {
        self.store.read(|uow| {
            let loans = uow.loans(None)?;
            with_schedules(uow, loans)
        })
    }
}

fn load_with_payments(
    uow: &dyn UnitOfWork,
    loan_id: LoanId,
) -> Result<LoanWithPayments, LedgerError> {
    let loan = uow
        .loan(loan_id)?
        .ok_or_else(|| LedgerError::not_found(Entity::Loan, loan_id))?;
    let payments = uow.payments_for_loan(loan_id)?;
    Ok(LoanWithPayments { loan, payments })
}

fn with_schedules(
    uow: &dyn UnitOfWork,
    loans: Vec<Loan>,
) -> Result<Vec<LoanWithPayments>, LedgerError> {
    loans
        .into_iter()
        .map(|loan| -> Result<LoanWithPayments, LedgerError> {
            let payments = uow.payments_for_loan(loan.id)?;
            Ok(LoanWithPayments { loan, payments })
        })
        .collect()
}
