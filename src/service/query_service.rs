use std::sync::Arc;

use crate::{
    balance::{self, Balance},
    statement::{Statement, StatementId, UserId},
    store::StatementStore,
    user::{User, UserDirectory},
};

use super::LedgerError;

/// Read-only access for a user to their own data.
pub struct QueryService {
    users: Arc<dyn UserDirectory>,
    statements: Arc<dyn StatementStore>,
}

impl QueryService {
    pub fn new(users: Arc<dyn UserDirectory>, statements: Arc<dyn StatementStore>) -> Self {
        Self { users, statements }
    }

    pub fn show_profile(&self, user_id: UserId) -> Result<User, LedgerError> {
        self.users
            .find_by_id(user_id)?
            .ok_or(LedgerError::UserNotFound(user_id))
    }

    /// A statement owned by someone else is reported as not found.
    pub fn get_statement_operation(
        &self,
        user_id: UserId,
        statement_id: StatementId,
    ) -> Result<Statement, LedgerError> {
        self.show_profile(user_id)?;
        self.statements
            .find_by_id_for_user(statement_id, user_id)?
            .ok_or(LedgerError::StatementNotFound(statement_id))
    }

    pub fn get_balance(&self, user_id: UserId, with_statement: bool) -> Result<Balance, LedgerError> {
        self.show_profile(user_id)?;
        let history = self.statements.list_for_user(user_id)?;
        balance::calculate(history, with_statement)
            .map_err(|_| LedgerError::BalanceOverflow(user_id))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::{Decimal, prelude::FromPrimitive};

    use super::*;
    use crate::{
        statement::{NewStatement, OperationType},
        store::in_memory_store::{InMemoryStatementStore, InMemoryUserDirectory},
        user::NewUser,
    };

    fn deposit(user_id: UserId, amount: u32) -> NewStatement {
        NewStatement {
            user_id,
            sender_id: None,
            amount: Decimal::from_u32(amount).unwrap(),
            description: "Deposit description".to_string(),
            kind: OperationType::Deposit,
        }
    }

    #[test]
    fn queries_scoped_to_owner() {
        let users = Arc::new(InMemoryUserDirectory::new());
        let statements = Arc::new(InMemoryStatementStore::new());
        let queries = QueryService::new(users.clone(), statements.clone());

        let alice = users.create(NewUser::new("Alice", "alice@example.com")).unwrap();
        let bob = users.create(NewUser::new("Bob", "bob@example.com")).unwrap();
        let stored = statements.append(deposit(alice.id, 3000)).unwrap();

        assert_eq!(queries.show_profile(alice.id).unwrap(), alice);

        let found = queries.get_statement_operation(alice.id, stored.id).unwrap();
        assert_eq!(found.amount, Decimal::from_u32(3000).unwrap());

        let err = queries
            .get_statement_operation(bob.id, stored.id)
            .unwrap_err();
        assert!(matches!(err, LedgerError::StatementNotFound(id) if id == stored.id));

        let err = queries
            .get_statement_operation(alice.id, StatementId::new())
            .unwrap_err();
        assert!(matches!(err, LedgerError::StatementNotFound(_)));

        let err = queries
            .get_statement_operation(UserId::new(), stored.id)
            .unwrap_err();
        assert!(matches!(err, LedgerError::UserNotFound(_)));
    }

    #[test]
    fn balance_with_and_without_history() {
        let users = Arc::new(InMemoryUserDirectory::new());
        let statements = Arc::new(InMemoryStatementStore::new());
        let queries = QueryService::new(users.clone(), statements.clone());

        let user = users.create(NewUser::new("User", "user@example.com")).unwrap();
        statements.append(deposit(user.id, 10)).unwrap();
        statements.append(deposit(user.id, 5)).unwrap();

        let plain = queries.get_balance(user.id, false).unwrap();
        assert_eq!(plain.balance, Decimal::from_u32(15).unwrap());
        assert!(plain.statement.is_none());

        let detailed = queries.get_balance(user.id, true).unwrap();
        assert_eq!(detailed.balance, Decimal::from_u32(15).unwrap());
        assert_eq!(detailed.statement.map(|s| s.len()), Some(2));

        let err = queries.get_balance(UserId::new(), false).unwrap_err();
        assert!(err.is_not_found());
    }
}
