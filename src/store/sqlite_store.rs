use std::{path::Path, str::FromStr, sync::Mutex, time::Duration};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use rust_decimal::Decimal;

use crate::{
    statement::{NewStatement, OperationType, Statement, StatementId, UserId},
    user::{NewUser, User, UserDirectory},
};

use super::{Precondition, StatementStore, StoreError, checked_balance, ensure_in_range};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const STATEMENT_COLUMNS: &str =
    "id, user_id, sender_id, amount, description, type, created_at";

/// SQLite-backed users and statements.
///
/// Writes run in `BEGIN IMMEDIATE` transactions, so the funds check and the
/// insert are serialized against every other writer of the same file, not only
/// against other handles in this process.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // journal_mode answers with a row; in-memory databases stay in `memory` mode
        conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS statements (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            user_id TEXT NOT NULL REFERENCES users(id),
            sender_id TEXT REFERENCES users(id),
            amount TEXT NOT NULL,
            description TEXT NOT NULL,
            type TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_statements_user
            ON statements(user_id, seq);
        ",
    )?;
    Ok(())
}

fn timestamp_to_str(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn str_to_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("invalid timestamp `{s}`: {e}")))
}

fn parse_id<T: FromStr>(s: &str) -> Result<T, StoreError>
where
    T::Err: std::fmt::Display,
{
    s.parse()
        .map_err(|e| StoreError::Corrupt(format!("invalid id `{s}`: {e}")))
}

/// Raw column values, decoded outside of rusqlite's row callback.
struct StatementRow {
    id: String,
    user_id: String,
    sender_id: Option<String>,
    amount: String,
    description: String,
    kind: String,
    created_at: String,
}

impl StatementRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            sender_id: row.get(2)?,
            amount: row.get(3)?,
            description: row.get(4)?,
            kind: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    /// `None` for rows whose type this build does not know; they are ignored.
    fn decode(self) -> Result<Option<Statement>, StoreError> {
        let kind = match self.kind.parse::<OperationType>() {
            Ok(kind) => kind,
            Err(err) => {
                tracing::warn!(statement_id = %self.id, %err, "Skipping statement");
                return Ok(None);
            }
        };
        let amount = Decimal::from_str(&self.amount)
            .map_err(|e| StoreError::Corrupt(format!("invalid amount `{}`: {e}", self.amount)))?;
        Ok(Some(Statement {
            id: parse_id(&self.id)?,
            user_id: parse_id(&self.user_id)?,
            sender_id: self.sender_id.as_deref().map(parse_id::<UserId>).transpose()?,
            amount,
            description: self.description,
            kind,
            created_at: str_to_timestamp(&self.created_at)?,
        }))
    }
}

fn list_statements(conn: &Connection, user_id: UserId) -> Result<Vec<Statement>, StoreError> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {STATEMENT_COLUMNS} FROM statements WHERE user_id = ?1 ORDER BY seq"
    ))?;
    let rows = stmt
        .query_map(params![user_id.to_string()], StatementRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut statements = Vec::with_capacity(rows.len());
    for row in rows {
        if let Some(statement) = row.decode()? {
            statements.push(statement);
        }
    }
    Ok(statements)
}

impl StatementStore for SqliteStore {
    fn append_all(
        &self,
        legs: Vec<NewStatement>,
        precondition: Precondition,
    ) -> Result<Vec<Statement>, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let balance_for = |user_id: UserId| -> Result<Decimal, StoreError> {
            checked_balance(user_id, &list_statements(&tx, user_id)?)
        };
        precondition.verify(&balance_for)?;

        let created_at = Utc::now();
        let created: Vec<Statement> = legs
            .into_iter()
            .map(|leg| leg.into_statement(StatementId::new(), created_at))
            .collect();
        ensure_in_range(&created, balance_for)?;

        for statement in &created {
            tx.execute(
                &format!(
                    "INSERT INTO statements ({STATEMENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                ),
                params![
                    statement.id.to_string(),
                    statement.user_id.to_string(),
                    statement.sender_id.map(|id| id.to_string()),
                    statement.amount.to_string(),
                    statement.description,
                    statement.kind.as_str(),
                    timestamp_to_str(&statement.created_at),
                ],
            )?;
        }
        tx.commit()?;
        tracing::debug!(legs = created.len(), "SQLite statements committed");
        Ok(created)
    }

    fn find_by_id_for_user(
        &self,
        statement_id: StatementId,
        user_id: UserId,
    ) -> Result<Option<Statement>, StoreError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {STATEMENT_COLUMNS} FROM statements WHERE id = ?1 AND user_id = ?2"
                ),
                params![statement_id.to_string(), user_id.to_string()],
                StatementRow::from_row,
            )
            .optional()?;
        match row {
            Some(row) => row.decode(),
            None => Ok(None),
        }
    }

    fn list_for_user(&self, user_id: UserId) -> Result<Vec<Statement>, StoreError> {
        let conn = self.conn()?;
        list_statements(&conn, user_id)
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<(String, String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode_user(
    (id, name, email, created_at): (String, String, String, String),
) -> Result<User, StoreError> {
    Ok(User {
        id: parse_id(&id)?,
        name,
        email,
        created_at: str_to_timestamp(&created_at)?,
    })
}

impl UserDirectory for SqliteStore {
    fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, name, email, created_at FROM users WHERE id = ?1",
            params![id.to_string()],
            user_from_row,
        )
        .optional()?
        .map(decode_user)
        .transpose()
    }

    fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, name, email, created_at FROM users WHERE email = ?1",
            params![email],
            user_from_row,
        )
        .optional()?
        .map(decode_user)
        .transpose()
    }

    fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let taken: bool = tx.query_row(
            "SELECT COUNT(*) > 0 FROM users WHERE email = ?1",
            params![user.email],
            |row| row.get(0),
        )?;
        if taken {
            return Err(StoreError::EmailTaken(user.email));
        }

        let user = user.into_user(UserId::new(), Utc::now());
        tx.execute(
            "INSERT INTO users (id, name, email, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                user.id.to_string(),
                user.name,
                user.email,
                timestamp_to_str(&user.created_at)
            ],
        )?;
        tx.commit()?;
        tracing::debug!(user_id = %user.id, "SQLite user created");
        Ok(user)
    }
}
