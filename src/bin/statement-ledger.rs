use std::fs::File;

use anyhow::{Context, Result};
use clap::Parser;
use statement_ledger::{
    bin_utils::{Backend, Batch, RowError},
    config::{CliArgs, Config},
};

fn main() -> Result<()> {
    let cli = CliArgs::parse();
    let config = Config::load(&cli)?;
    config.logging.init_tracing();

    let users = File::open(&cli.users)
        .with_context(|| format!("Failed to open `{}`", cli.users.display()))?;
    let operations = File::open(&cli.operations)
        .with_context(|| format!("Failed to open `{}`", cli.operations.display()))?;
    let backend = Backend::open(&config.storage)?;

    let batch = Batch {
        users_input: users,
        operations_input: operations,
        output: &mut std::io::stdout(),
        error_printer: Box::new(|line, err| match err {
            RowError::Ledger(err) => eprintln!("Rejected at line {line}: {err}"),
            err => eprintln!("Error at line {line}: {err}"),
        }),
    };
    batch.run(&backend)
}
