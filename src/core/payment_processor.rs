//! Loan payment processing
//!
//! Advances single installments from `pending` to `paid` and detects loan
//! completion. The whole read-check-write sequence, including the paid-count
//! used to decide completion, runs in one scope holding the loan's row lock.

use std::sync::Arc;

use tracing::info;

use super::clock::Clock;
use super::traits::{LedgerStore, LockKey};
use crate::types::{
    Entity, LedgerError, LoanId, LoanPayment, LoanStatus, PaymentId, PaymentStatus,
};

/// Pays installments and transitions loans to `repaid`
#[derive(Clone)]
pub struct LoanPaymentProcessor {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
}

impl LoanPaymentProcessor {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Mark one installment of a loan as paid
    ///
    /// When this payment brings the number of paid installments up to the
    /// loan's term, the loan becomes `repaid` in the same scope.
    ///
    /// # Arguments
    ///
    /// * `payment_id` - The installment to pay
    /// * `loan_id` - The loan the caller expects the installment to belong to
    ///
    /// # Returns
    ///
    /// * `Ok(LoanPayment)` - The installment, now paid
    /// * `Err(NotFound)` - If the payment or the loan does not exist
    /// * `Err(Mismatch)` - If the payment belongs to another loan
    /// * `Err(AlreadyPaid)` - If the payment was already paid
    pub fn make_payment(
        &self,
        payment_id: PaymentId,
        loan_id: LoanId,
    ) -> Result<LoanPayment, LedgerError> {
        let (payment, repaid) = self.store.run(&[LockKey::Loan(loan_id)], |uow| {
            let mut payment = uow
                .payment(payment_id)?
                .ok_or_else(|| LedgerError::not_found(Entity::Payment, payment_id))?;

            if payment.loan_id != loan_id {
                return Err(LedgerError::mismatch(payment_id, loan_id, payment.loan_id));
            }
            if payment.is_paid() {
                return Err(LedgerError::already_paid(payment_id));
            }

            let mut loan = uow
                .loan(loan_id)?
                .ok_or_else(|| LedgerError::not_found(Entity::Loan, loan_id))?;

            payment.status = PaymentStatus::Paid;
            payment.paid_at = Some(self.clock.now());
            uow.update_payment(payment.clone())?;

            let paid_count = uow
                .payments_for_loan(loan_id)?
                .iter()
                .filter(|p| p.is_paid())
                .count();

            let repaid = paid_count == loan.term_months as usize;
            if repaid {
                loan.status = LoanStatus::Repaid;
                uow.update_loan(loan)?;
            }

            Ok((payment, repaid))
        })?;

        info!(payment_id, loan_id, "loan payment recorded");
        if repaid {
            info!(loan_id, "loan fully repaid");
        }
        Ok(payment)
    }

    /// Installments of a loan ordered by due date
    ///
    /// An unknown loan yields an empty list.
    pub fn list_payments(&self, loan_id: LoanId) -> Result<Vec<LoanPayment>, LedgerError> {
        self.store.read(|uow| uow.payments_for_loan(loan_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::{fixture, LockCountingClock};
    use crate::types::LoanWithPayments;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::thread;

    fn issue(fx: &crate::core::test_support::Fixture, term: i32) -> LoanWithPayments {
        fx.loans()
            .create_loan(1, 1, dec!(300), Decimal::ZERO, term)
            .unwrap()
    }

    #[test]
    fn test_paying_one_of_many_keeps_loan_approved() {
        let fx = fixture();
        let processor = fx.payments();
        let issued = issue(&fx, 3);

        let paid = processor
            .make_payment(issued.payments[0].id, issued.loan.id)
            .unwrap();

        assert_eq!(paid.status, PaymentStatus::Paid);
        assert_eq!(paid.paid_at, Some(fx.now()));
        let reloaded = fx.loans().get_loan(issued.loan.id).unwrap();
        assert_eq!(reloaded.loan.status, LoanStatus::Approved);
        assert_eq!(reloaded.paid_count(), 1);
    }

    #[test]
    fn test_paying_last_installment_repays_loan() {
        let fx = fixture();
        let processor = fx.payments();
        let issued = issue(&fx, 3);

        // out of order on purpose: completion depends on the count only
        for index in [2, 0, 1] {
            processor
                .make_payment(issued.payments[index].id, issued.loan.id)
                .unwrap();
        }

        let reloaded = fx.loans().get_loan(issued.loan.id).unwrap();
        assert_eq!(reloaded.loan.status, LoanStatus::Repaid);
        assert_eq!(reloaded.paid_count(), 3);
    }

    #[test]
    fn test_repeat_payment_is_rejected() {
        let fx = fixture();
        let processor = fx.payments();
        let issued = issue(&fx, 2);
        let payment_id = issued.payments[0].id;

        processor.make_payment(payment_id, issued.loan.id).unwrap();
        let again = processor.make_payment(payment_id, issued.loan.id);

        assert_eq!(again, Err(LedgerError::already_paid(payment_id)));
        let reloaded = fx.loans().get_loan(issued.loan.id).unwrap();
        assert_eq!(reloaded.paid_count(), 1);
    }

    #[test]
    fn test_payment_of_other_loan_is_a_mismatch() {
        let fx = fixture();
        let processor = fx.payments();
        let first = issue(&fx, 2);
        let second = issue(&fx, 2);

        let result = processor.make_payment(second.payments[0].id, first.loan.id);

        assert_eq!(
            result,
            Err(LedgerError::mismatch(
                second.payments[0].id,
                first.loan.id,
                second.loan.id
            ))
        );
        assert_eq!(fx.loans().get_loan(second.loan.id).unwrap().paid_count(), 0);
    }

    #[test]
    fn test_missing_payment_or_loan() {
        let fx = fixture();
        let processor = fx.payments();

        assert_eq!(
            processor.make_payment(42, 1),
            Err(LedgerError::not_found(Entity::Payment, 42))
        );
    }

    #[test]
    fn test_list_payments_ordered_by_due_date() {
        let fx = fixture();
        let processor = fx.payments();
        let issued = issue(&fx, 4);

        let listed = processor.list_payments(issued.loan.id).unwrap();

        assert_eq!(listed, issued.payments);
        assert!(listed.windows(2).all(|w| w[0].due_date < w[1].due_date));
        assert!(processor.list_payments(999).unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_payments_complete_loan_exactly_once() {
        let fx = fixture();
        let processor = fx.payments();
        let issued = issue(&fx, 6);
        let loan_id = issued.loan.id;

        let handles: Vec<_> = issued
            .payments
            .iter()
            .map(|payment| {
                let processor = processor.clone();
                let payment_id = payment.id;
                thread::spawn(move || processor.make_payment(payment_id, loan_id))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        let reloaded = fx.loans().get_loan(loan_id).unwrap();
        assert_eq!(reloaded.paid_count(), 6);
        assert_eq!(reloaded.loan.status, LoanStatus::Repaid);
    }

    #[test]
    fn test_concurrent_duplicate_payment_succeeds_once() {
        let fx = fixture();
        let processor = fx.payments();
        let issued = issue(&fx, 2);
        let payment_id = issued.payments[0].id;
        let loan_id = issued.loan.id;

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let processor = processor.clone();
                thread::spawn(move || processor.make_payment(payment_id, loan_id))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| *r == Err(LedgerError::already_paid(payment_id))));
    }

    #[test]
    fn test_paid_at_is_read_under_loan_lock() {
        let fx = fixture();
        let issued = issue(&fx, 2);

        let clock = Arc::new(LockCountingClock::new(&fx));
        let processor = LoanPaymentProcessor::new(fx.store.clone(), clock.clone());

        processor
            .make_payment(issued.payments[0].id, issued.loan.id)
            .unwrap();

        assert_eq!(clock.held(), vec![1]);
    }
}
