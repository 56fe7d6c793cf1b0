use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::User;

/// Failure of a ledger operation. `NonPositiveAmount` indicates a
/// programming error on the calling side, not a business outcome.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        requested: Decimal,
        available: Decimal,
    },
    #[error("ledger amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),
}

/// Applies balance mutations to loaded User aggregates. The mutations
/// become durable only when the caller commits the touched users as one
/// unit; on any error here nothing has been mutated.
pub struct BalanceLedger;

impl BalanceLedger {
    /// Debits one user and credits the other by the same amount, as a
    /// single atomic pair.
    pub fn transfer(
        debit_user: &mut User,
        credit_user: &mut User,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::NonPositiveAmount(amount));
        }
        debit_user
            .debit(amount)
            .map_err(|e| LedgerError::InsufficientFunds {
                requested: e.requested,
                available: e.available,
            })?;
        credit_user.credit(amount);
        Ok(())
    }

    /// Unconditional increase, used for external-funds injection
    /// (deposits and card settlements).
    pub fn credit(user: &mut User, amount: Decimal) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::NonPositiveAmount(amount));
        }
        user.credit(amount);
        Ok(())
    }

    /// Removes external funds from a user, the counterpart of `credit`
    /// used when a card settlement is reversed. No internal account is
    /// credited in exchange.
    pub fn debit(user: &mut User, amount: Decimal) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::NonPositiveAmount(amount));
        }
        user.debit(amount).map_err(|e| LedgerError::InsufficientFunds {
            requested: e.requested,
            available: e.available,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cpf;
    use rust_decimal_macros::dec;

    fn user(cpf: &str, balance: Decimal) -> User {
        User::with_balance(
            "Test",
            Cpf::parse(cpf).unwrap(),
            format!("{cpf}@example.com"),
            "hash",
            balance,
        )
    }

    #[test]
    fn test_transfer_is_zero_sum() {
        let mut payer = user("52998224725", dec!(150));
        let mut payee = user("18609139034", dec!(0));

        BalanceLedger::transfer(&mut payer, &mut payee, dec!(100)).unwrap();

        assert_eq!(payer.balance, dec!(50));
        assert_eq!(payee.balance, dec!(100));
    }

    #[test]
    fn test_transfer_fails_without_mutation() {
        let mut payer = user("52998224725", dec!(50));
        let mut payee = user("18609139034", dec!(10));

        let err = BalanceLedger::transfer(&mut payer, &mut payee, dec!(100)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(payer.balance, dec!(50));
        assert_eq!(payee.balance, dec!(10));
    }

    #[test]
    fn test_transfer_rejects_non_positive_amount() {
        let mut payer = user("52998224725", dec!(50));
        let mut payee = user("18609139034", dec!(10));

        assert!(matches!(
            BalanceLedger::transfer(&mut payer, &mut payee, Decimal::ZERO),
            Err(LedgerError::NonPositiveAmount(_))
        ));
        assert!(matches!(
            BalanceLedger::transfer(&mut payer, &mut payee, dec!(-1)),
            Err(LedgerError::NonPositiveAmount(_))
        ));
    }

    #[test]
    fn test_credit_and_debit() {
        let mut holder = user("52998224725", dec!(10));
        BalanceLedger::credit(&mut holder, dec!(90)).unwrap();
        assert_eq!(holder.balance, dec!(100));

        BalanceLedger::debit(&mut holder, dec!(100)).unwrap();
        assert_eq!(holder.balance, Decimal::ZERO);

        assert!(matches!(
            BalanceLedger::debit(&mut holder, dec!(1)),
            Err(LedgerError::InsufficientFunds { .. })
        ));
        assert!(matches!(
            BalanceLedger::credit(&mut holder, Decimal::ZERO),
            Err(LedgerError::NonPositiveAmount(_))
        ));
    }
}
