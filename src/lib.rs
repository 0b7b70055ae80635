/// Identifiers, operation kinds and the immutable [`statement::Statement`] record.
pub mod statement;

/// Folds a user's statements into a signed balance. No I/O.
pub mod balance;

/// Validates raw operation input into commands the services accept.
pub mod command;

/// Registered users and the directory interface used to resolve them.
pub mod user;

/// Statement storage interface, plus "in memory" and SQLite implementations.
///
/// Both backends evaluate the sufficient-funds check inside the same critical
/// section as the write, so concurrent withdrawals cannot overdraw an account.
pub mod store;

/// Statement (write) and query (read) services.
pub mod service;

/// Command line and config file settings for the batch binary.
pub mod config;

/// Drives the services from CSV files. Used by the binary and integration tests.
pub mod bin_utils;
