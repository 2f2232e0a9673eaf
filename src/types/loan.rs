//! Loan-related types for the ledger
//!
//! A loan is issued together with its full equal-installment schedule. Each
//! installment is a `LoanPayment`; the loan owns the ordered sequence.
//!
//! # Lifecycle
//!
//! ```text
//! LoanPayment: pending --pay--> paid            (terminal)
//! Loan:        approved --all payments paid--> repaid (terminal)
//! ```

use super::ids::{BranchId, CustomerId, LoanId, PaymentId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// Lifecycle state of a loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    /// Issued, installments outstanding
    Approved,
    /// Every installment has been paid
    Repaid,
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoanStatus::Approved => write!(f, "approved"),
            LoanStatus::Repaid => write!(f, "repaid"),
        }
    }
}

/// Lifecycle state of a single installment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Paid => write!(f, "paid"),
        }
    }
}

/// Installment loan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Loan {
    pub id: LoanId,
    pub customer_id: CustomerId,
    pub branch_id: BranchId,

    /// Amount borrowed
    pub principal: Decimal,

    /// Annual interest rate as a fraction (0.12 = 12% p.a.)
    pub annual_rate: Decimal,

    /// Number of monthly installments
    pub term_months: u32,

    /// Equal monthly installment
    pub emi: Decimal,

    /// `emi * term_months`
    pub total_payable: Decimal,

    pub status: LoanStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Payload for inserting a loan row
///
/// Built by the amortization engine after the EMI has been computed.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLoan {
    pub customer_id: CustomerId,
    pub branch_id: BranchId,
    pub principal: Decimal,
    pub annual_rate: Decimal,
    pub term_months: u32,
    pub emi: Decimal,
    pub total_payable: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl NewLoan {
    /// New loans always start out approved
    pub fn into_loan(self, id: LoanId) -> Loan {
        Loan {
            id,
            customer_id: self.customer_id,
            branch_id: self.branch_id,
            principal: self.principal,
            annual_rate: self.annual_rate,
            term_months: self.term_months,
            emi: self.emi,
            total_payable: self.total_payable,
            status: LoanStatus::Approved,
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}

/// One installment of a loan's schedule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanPayment {
    pub id: PaymentId,
    pub loan_id: LoanId,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub status: PaymentStatus,

    /// Set only once the installment is paid
    pub paid_at: Option<DateTime<Utc>>,
}

impl LoanPayment {
    pub fn is_paid(&self) -> bool {
        self.status == PaymentStatus::Paid
    }
}

/// Payload for inserting one scheduled installment
#[derive(Debug, Clone, PartialEq)]
pub struct NewLoanPayment {
    pub loan_id: LoanId,
    pub amount: Decimal,
    pub due_date: NaiveDate,
}

impl NewLoanPayment {
    pub fn into_payment(self, id: PaymentId) -> LoanPayment {
        LoanPayment {
            id,
            loan_id: self.loan_id,
            amount: self.amount,
            due_date: self.due_date,
            status: PaymentStatus::Pending,
            paid_at: None,
        }
    }
}

/// A loan together with its full schedule, ordered by due date
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanWithPayments {
    pub loan: Loan,
    pub payments: Vec<LoanPayment>,
}

impl LoanWithPayments {
    /// Number of installments already paid
    pub fn paid_count(&self) -> usize {
        self.payments.iter().filter(|p| p.is_paid()).count()
    }

    /// Sum of all scheduled installment amounts
    pub fn scheduled_total(&self) -> Decimal {
        self.payments.iter().map(|p| p.amount).sum()
    }
}
