use std::sync::Arc;

use crate::{
    command::{CreateStatementCommand, Operation},
    statement::{NewStatement, Statement, UserId},
    store::{Precondition, StatementStore, StoreError},
    user::UserDirectory,
};

use super::LedgerError;

/// The only writer of statements.
pub struct StatementService {
    users: Arc<dyn UserDirectory>,
    statements: Arc<dyn StatementStore>,
}

impl StatementService {
    pub fn new(users: Arc<dyn UserDirectory>, statements: Arc<dyn StatementStore>) -> Self {
        Self { users, statements }
    }

    /// Records `command` and returns the acting user's statement (the sender's
    /// leg for a transfer).
    ///
    /// Checks run in this order: acting user exists, receiver exists, funds.
    /// The funds check is executed by the store together with the write.
    pub fn create_statement(
        &self,
        command: CreateStatementCommand,
    ) -> Result<Statement, LedgerError> {
        let CreateStatementCommand {
            user_id,
            operation,
            amount,
            description,
        } = command;

        self.ensure_user(user_id)?;
        if let Operation::Transfer { receiver_id } = operation {
            self.ensure_user(receiver_id)?;
        }

        let precondition = if operation.debits_user() {
            Precondition::SufficientFunds { user_id, amount }
        } else {
            Precondition::Unconditional
        };

        let own_leg = NewStatement {
            user_id,
            sender_id: None,
            amount,
            description,
            kind: operation.kind(),
        };
        let legs = match operation {
            Operation::Deposit | Operation::Withdraw => vec![own_leg],
            Operation::Transfer { receiver_id } => {
                let receiver_leg = NewStatement {
                    user_id: receiver_id,
                    sender_id: Some(user_id),
                    ..own_leg.clone()
                };
                vec![own_leg, receiver_leg]
            }
        };

        let created = match self.statements.append_all(legs, precondition) {
            Ok(created) => created,
            Err(err) => {
                let err = LedgerError::from(err);
                tracing::warn!(%user_id, kind = %operation.kind(), %amount, %err, "Statement rejected");
                return Err(err);
            }
        };

        // the acting user's leg is always first
        let statement = created.into_iter().next().ok_or_else(|| {
            LedgerError::Storage(StoreError::Corrupt(
                "store returned no statements".to_string(),
            ))
        })?;
        tracing::info!(
            statement_id = %statement.id,
            %user_id,
            kind = %statement.kind,
            amount = %statement.amount,
            "Statement created"
        );
        Ok(statement)
    }

    fn ensure_user(&self, user_id: UserId) -> Result<(), LedgerError> {
        match self.users.find_by_id(user_id)? {
            Some(_) => Ok(()),
            None => {
                tracing::warn!(%user_id, "Unknown user");
                Err(LedgerError::UserNotFound(user_id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::{Decimal, prelude::FromPrimitive};

    use super::*;
    use crate::{
        balance::balance_of,
        statement::OperationType,
        store::in_memory_store::{InMemoryStatementStore, InMemoryUserDirectory},
        user::NewUser,
    };

    struct Fixture {
        users: Arc<InMemoryUserDirectory>,
        statements: Arc<InMemoryStatementStore>,
        service: StatementService,
    }

    fn fixture() -> Fixture {
        let users = Arc::new(InMemoryUserDirectory::new());
        let statements = Arc::new(InMemoryStatementStore::new());
        let service = StatementService::new(users.clone(), statements.clone());
        Fixture {
            users,
            statements,
            service,
        }
    }

    fn command(user_id: UserId, operation: Operation, amount: u32) -> CreateStatementCommand {
        CreateStatementCommand {
            user_id,
            operation,
            amount: Decimal::from_u32(amount).unwrap(),
            description: format!("{:?}", operation.kind()),
        }
    }

    #[test]
    fn deposit_and_withdraw() {
        let f = fixture();
        let user = f.users.create(NewUser::new("User", "user@example.com")).unwrap();

        let deposit = f
            .service
            .create_statement(command(user.id, Operation::Deposit, 500))
            .unwrap();
        assert_eq!(deposit.kind, OperationType::Deposit);
        assert_eq!(deposit.user_id, user.id);
        assert_eq!(deposit.sender_id, None);

        f.service
            .create_statement(command(user.id, Operation::Withdraw, 300))
            .unwrap();
        let history = f.statements.list_for_user(user.id).unwrap();
        assert_eq!(balance_of(&history), Ok(Decimal::from_u32(200).unwrap()));
    }

    #[test]
    fn withdraw_without_funds() {
        let f = fixture();
        let user = f.users.create(NewUser::new("User", "user@example.com")).unwrap();
        let err = f
            .service
            .create_statement(command(user.id, Operation::Withdraw, 300))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert!(f.statements.list_for_user(user.id).unwrap().is_empty());
    }

    #[test]
    fn unknown_acting_user() {
        let f = fixture();
        let ghost = UserId::new();
        let err = f
            .service
            .create_statement(command(ghost, Operation::Deposit, 1))
            .unwrap_err();
        assert!(matches!(err, LedgerError::UserNotFound(id) if id == ghost));
    }

    #[test]
    fn transfer_writes_both_legs() {
        let f = fixture();
        let alice = f.users.create(NewUser::new("Alice", "alice@example.com")).unwrap();
        let bob = f.users.create(NewUser::new("Bob", "bob@example.com")).unwrap();
        f.service
            .create_statement(command(alice.id, Operation::Deposit, 250))
            .unwrap();

        let sent = f
            .service
            .create_statement(command(
                alice.id,
                Operation::Transfer {
                    receiver_id: bob.id,
                },
                200,
            ))
            .unwrap();
        assert_eq!(sent.user_id, alice.id);
        assert_eq!(sent.sender_id, None);

        let received = f.statements.list_for_user(bob.id).unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].sender_id, Some(alice.id));
        assert_eq!(received[0].amount, sent.amount);
        assert_eq!(received[0].description, sent.description);
        assert_eq!(received[0].kind, OperationType::Transfer);

        assert_eq!(
            balance_of(&f.statements.list_for_user(alice.id).unwrap()),
            Ok(Decimal::from_u32(50).unwrap())
        );
        assert_eq!(balance_of(&received), Ok(Decimal::from_u32(200).unwrap()));
    }

    #[test]
    fn unknown_receiver_takes_precedence_over_funds() {
        let f = fixture();
        let alice = f.users.create(NewUser::new("Alice", "alice@example.com")).unwrap();
        let ghost = UserId::new();
        // alice has no funds either, but the missing receiver is reported first
        let err = f
            .service
            .create_statement(command(
                alice.id,
                Operation::Transfer { receiver_id: ghost },
                300,
            ))
            .unwrap_err();
        assert!(matches!(err, LedgerError::UserNotFound(id) if id == ghost));
        assert!(f.statements.list_for_user(alice.id).unwrap().is_empty());
    }
}
