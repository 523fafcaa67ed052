//! Secret commands: values are sealed with the session key before they are
//! written, so they stay encrypted even inside the decrypted database image.

mod get;
mod list;
mod put;
mod remove;

pub use get::handle_get;
pub use list::handle_list;
pub use put::handle_put;
pub use remove::handle_remove;

use rusqlite::Connection;

use crate::errors::CliError;

const SECRETS_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS secrets (
    name TEXT PRIMARY KEY,
    value BLOB NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)";

fn ensure_table(conn: &Connection) -> lockbox_core::Result<()> {
    conn.execute_batch(SECRETS_SCHEMA)?;
    Ok(())
}

fn table_exists(conn: &Connection) -> lockbox_core::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'secrets'",
        [],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn validate_name(name: &str) -> anyhow::Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CliError::invalid_input("Secret name cannot be empty").into());
    }
    Ok(trimmed)
}

fn secret_not_found(name: &str) -> anyhow::Error {
    CliError::not_found(
        format!("Secret not found: {}", name),
        "Hint: Run `lockbox list` to see stored secrets.",
    )
    .into()
}
