use std::{collections::HashMap, sync::Mutex};

use chrono::Utc;

use crate::{
    statement::{NewStatement, Statement, StatementId, UserId},
    user::{NewUser, User, UserDirectory},
};

use super::{Precondition, StatementStore, StoreError, checked_balance, ensure_in_range};

/// Vec-backed store. One lock covers the precondition check and the append.
#[derive(Debug, Default)]
pub struct InMemoryStatementStore {
    statements: Mutex<Vec<Statement>>,
}

impl InMemoryStatementStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatementStore for InMemoryStatementStore {
    fn append_all(
        &self,
        legs: Vec<NewStatement>,
        precondition: Precondition,
    ) -> Result<Vec<Statement>, StoreError> {
        let mut statements = self.statements.lock().map_err(|_| StoreError::Poisoned)?;
        let balance_for = |user_id: UserId| {
            checked_balance(user_id, statements.iter().filter(|s| s.user_id == user_id))
        };
        precondition.verify(&balance_for)?;

        let created_at = Utc::now();
        let created: Vec<Statement> = legs
            .into_iter()
            .map(|leg| leg.into_statement(StatementId::new(), created_at))
            .collect();
        ensure_in_range(&created, balance_for)?;
        statements.extend(created.iter().cloned());
        tracing::debug!(legs = created.len(), "Statements appended");
        Ok(created)
    }

    fn find_by_id_for_user(
        &self,
        statement_id: StatementId,
        user_id: UserId,
    ) -> Result<Option<Statement>, StoreError> {
        let statements = self.statements.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(statements
            .iter()
            .find(|s| s.id == statement_id && s.user_id == user_id)
            .cloned())
    }

    fn list_for_user(&self, user_id: UserId) -> Result<Vec<Statement>, StoreError> {
        let statements = self.statements.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(statements
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: Mutex<HashMap<UserId, User>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(users.get(&id).cloned())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.lock().map_err(|_| StoreError::Poisoned)?;
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::EmailTaken(user.email));
        }
        let user = user.into_user(UserId::new(), Utc::now());
        users.insert(user.id, user.clone());
        Ok(user)
    }
}
