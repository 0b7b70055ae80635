use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    balance::{self, balance_of},
    statement::{NewStatement, Statement, StatementId, UserId},
};

pub mod in_memory_store;
pub mod sqlite_store;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Insufficient funds: balance is {balance}, requested {requested}")]
    InsufficientFunds { balance: Decimal, requested: Decimal },
    #[error("Balance of user {user_id} would leave the representable range")]
    BalanceOverflow { user_id: UserId },
    #[error("Email `{0}` is already registered")]
    EmailTaken(String),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("Corrupt record: {0}")]
    Corrupt(String),
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Condition checked inside the same critical section as the write it guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    Unconditional,
    SufficientFunds { user_id: UserId, amount: Decimal },
}

impl Precondition {
    /// `balance_for` must read the history under the caller's lock or transaction.
    pub fn verify(
        &self,
        balance_for: impl FnOnce(UserId) -> Result<Decimal, StoreError>,
    ) -> Result<(), StoreError> {
        match *self {
            Precondition::Unconditional => Ok(()),
            Precondition::SufficientFunds { user_id, amount } => {
                let balance = balance_for(user_id)?;
                if balance < amount {
                    Err(StoreError::InsufficientFunds {
                        balance,
                        requested: amount,
                    })
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Folds the history of `user_id`, reporting overflow against that user.
pub(crate) fn checked_balance<'a>(
    user_id: UserId,
    statements: impl IntoIterator<Item = &'a Statement>,
) -> Result<Decimal, StoreError> {
    balance_of(statements).map_err(|_| StoreError::BalanceOverflow { user_id })
}

/// Fails when applying `legs` would push any owner's balance out of range.
/// Must run under the same lock or transaction as the write.
pub(crate) fn ensure_in_range(
    legs: &[Statement],
    balance_for: impl Fn(UserId) -> Result<Decimal, StoreError>,
) -> Result<(), StoreError> {
    let mut owners: Vec<UserId> = legs.iter().map(|leg| leg.user_id).collect();
    owners.sort();
    owners.dedup();
    for user_id in owners {
        let current = balance_for(user_id)?;
        legs.iter()
            .filter(|leg| leg.user_id == user_id)
            .try_fold(current, balance::apply)
            .map_err(|_| StoreError::BalanceOverflow { user_id })?;
    }
    Ok(())
}

/// Append-only statement storage.
///
/// `append_all` is all-or-nothing: either every leg is stored or none is,
/// and `precondition` is evaluated atomically with the write. A write that
/// would push any owner's balance out of range is rejected the same way.
pub trait StatementStore: Send + Sync {
    fn append_all(
        &self,
        legs: Vec<NewStatement>,
        precondition: Precondition,
    ) -> Result<Vec<Statement>, StoreError>;

    fn append(&self, leg: NewStatement) -> Result<Statement, StoreError> {
        self.append_all(vec![leg], Precondition::Unconditional)?
            .pop()
            .ok_or_else(|| StoreError::Corrupt("append stored no statement".to_string()))
    }

    /// Returns the statement only when it is owned by `user_id`.
    fn find_by_id_for_user(
        &self,
        statement_id: StatementId,
        user_id: UserId,
    ) -> Result<Option<Statement>, StoreError>;

    /// Statements owned by `user_id`, in insertion order.
    fn list_for_user(&self, user_id: UserId) -> Result<Vec<Statement>, StoreError>;
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::prelude::FromPrimitive;

    use super::*;
    use crate::statement::OperationType;

    #[test]
    fn verify_precondition() {
        let user_id = UserId::new();
        let amount = Decimal::from_u32(300).unwrap();
        let precondition = Precondition::SufficientFunds { user_id, amount };

        precondition
            .verify(|id| {
                assert_eq!(id, user_id);
                Ok(Decimal::from_u32(300).unwrap())
            })
            .unwrap();

        let err = precondition.verify(|_| Ok(Decimal::ZERO)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientFunds { balance, requested }
                if balance == Decimal::ZERO && requested == amount
        ));
        assert_eq!(
            err.to_string(),
            "Insufficient funds: balance is 0, requested 300"
        );

        Precondition::Unconditional
            .verify(|_| panic!("balance must not be read"))
            .unwrap();
    }

    #[test]
    fn range_check_covers_every_owner() {
        let alice = UserId::new();
        let bob = UserId::new();
        let leg = |user_id, sender_id, amount| {
            NewStatement {
                user_id,
                sender_id,
                amount,
                description: String::new(),
                kind: OperationType::Transfer,
            }
            .into_statement(StatementId::new(), Utc::now())
        };
        let transfer = [leg(alice, None, Decimal::ONE), leg(bob, Some(alice), Decimal::ONE)];

        ensure_in_range(&transfer, |_| Ok(Decimal::ZERO)).unwrap();

        let err = ensure_in_range(&transfer, |id| {
            Ok(if id == bob { Decimal::MAX } else { Decimal::ZERO })
        })
        .unwrap_err();
        assert!(matches!(err, StoreError::BalanceOverflow { user_id } if user_id == bob));

        // both legs of a transfer to self cancel out
        let to_self = [leg(alice, None, Decimal::ONE), leg(alice, Some(alice), Decimal::ONE)];
        ensure_in_range(&to_self, |_| Ok(Decimal::MAX)).unwrap();
    }
}
