//! Bootstraps the ledger services for the batch binary: registers users from one
//! CSV file, replays operations from another, and prints the resulting balances.

use std::{
    io::{Read, Write},
    sync::Arc,
};

use anyhow::{Context, Result};
use csv_parser::{CsvRecords, OperationRow, UserRow};
use csv_printer::{BalanceRow, write_rows};
use thiserror::Error;

use crate::{
    command::{CommandError, CreateStatementCommand},
    config::StorageConfig,
    service::{LedgerError, QueryService, StatementService},
    statement::UserId,
    store::{
        StatementStore,
        in_memory_store::{InMemoryStatementStore, InMemoryUserDirectory},
        sqlite_store::SqliteStore,
    },
    user::{NewUser, User, UserDirectory},
};

pub mod csv_parser;
pub mod csv_printer;

/// Per-row failure. None of these stop the run.
#[derive(Debug, Error)]
pub enum RowError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("No user registered with email `{0}`")]
    UnknownEmail(String),
    #[error(transparent)]
    Ledger(LedgerError),
}

pub struct Backend {
    pub users: Arc<dyn UserDirectory>,
    pub statements: Arc<dyn StatementStore>,
}

impl Backend {
    pub fn open(config: &StorageConfig) -> Result<Self> {
        match config {
            StorageConfig::Memory => Ok(Self {
                users: Arc::new(InMemoryUserDirectory::new()),
                statements: Arc::new(InMemoryStatementStore::new()),
            }),
            StorageConfig::Sqlite { path } => {
                let store = Arc::new(
                    SqliteStore::open(path)
                        .with_context(|| format!("Failed to open `{}`", path.display()))?,
                );
                Ok(Self {
                    users: store.clone(),
                    statements: store,
                })
            }
        }
    }
}

pub struct Batch<'w, U, O, W: 'w> {
    pub users_input: U,
    pub operations_input: O,
    pub output: &'w mut W,
    pub error_printer: Box<dyn FnMut(u64, RowError)>,
}

impl<'w, U, O, W> Batch<'w, U, O, W>
where
    U: Read,
    O: Read,
    W: Write + 'w,
{
    /// Storage failures abort the run; every other failure goes to `error_printer`.
    pub fn run(mut self, backend: &Backend) -> Result<()> {
        let registered = self.register_users(backend.users.as_ref())?;

        let statements = StatementService::new(backend.users.clone(), backend.statements.clone());
        let queries = QueryService::new(backend.users.clone(), backend.statements.clone());

        for (line, row) in CsvRecords::<_, OperationRow>::new(self.operations_input) {
            let outcome = row
                .map_err(RowError::from)
                .and_then(|row| to_command(backend.users.as_ref(), row))
                .and_then(|command| {
                    statements
                        .create_statement(command)
                        .map_err(RowError::Ledger)
                });
            match outcome {
                Ok(_) => {}
                Err(RowError::Ledger(LedgerError::Storage(err))) => {
                    return Err(err).with_context(|| format!("Storage failure at line {line}"));
                }
                Err(err) => (self.error_printer)(line, err),
            }
        }

        let mut rows = Vec::with_capacity(registered.len());
        for user in registered {
            let balance = queries
                .get_balance(user.id, true)
                .with_context(|| format!("Failed to read balance of {}", user.email))?;
            rows.push(BalanceRow {
                user: user.id,
                email: user.email,
                balance: balance.balance,
                statements: balance.statement.map_or(0, |s| s.len()),
            });
        }
        write_rows(self.output, rows)
    }

    /// Existing users are reused, so the same files can be replayed against a database.
    fn register_users(&mut self, users: &dyn UserDirectory) -> Result<Vec<User>> {
        let mut registered: Vec<User> = Vec::new();
        for (line, row) in CsvRecords::<_, UserRow>::new(&mut self.users_input) {
            let UserRow { email, name } = match row {
                Ok(row) => row,
                Err(err) => {
                    (self.error_printer)(line, err.into());
                    continue;
                }
            };
            let user = match users.find_by_email(&email)? {
                Some(user) => user,
                None => users.create(NewUser::new(name, email))?,
            };
            if registered.iter().all(|u| u.id != user.id) {
                registered.push(user);
            }
        }
        Ok(registered)
    }
}

fn resolve(users: &dyn UserDirectory, email: &str) -> Result<UserId, RowError> {
    match users.find_by_email(email) {
        Ok(Some(user)) => Ok(user.id),
        Ok(None) => Err(RowError::UnknownEmail(email.to_string())),
        Err(err) => Err(RowError::Ledger(err.into())),
    }
}

fn to_command(users: &dyn UserDirectory, row: OperationRow) -> Result<CreateStatementCommand, RowError> {
    let user_id = resolve(users, &row.user)?;
    let receiver_id = match row.receiver.as_deref() {
        Some(email) => Some(resolve(users, email)?),
        None => None,
    };
    Ok(CreateStatementCommand::parse(
        user_id,
        row.kind,
        receiver_id,
        row.amount,
        row.description,
    )?)
}
