use rusqlite::params;

use crate::app::AppContext;
use crate::cli::PutArgs;
use crate::helpers::read_secret_value;

use super::{ensure_table, validate_name};

pub fn handle_put(ctx: &AppContext, args: &PutArgs) -> anyhow::Result<()> {
    let name = validate_name(&args.name)?;
    let (vault, _password) = ctx.unlock()?;
    let value = read_secret_value(ctx.no_input(), args.value.clone())?;

    let now = chrono::Utc::now().to_rfc3339();
    let replaced = vault.store().with_handle_mut(|handle| {
        ensure_table(handle)?;
        let sealed = handle.seal_field(&value)?;
        let existed: bool = handle.query_row(
            "SELECT EXISTS(SELECT 1 FROM secrets WHERE name = ?1)",
            [name],
            |row| row.get(0),
        )?;
        handle.execute(
            "INSERT INTO secrets (name, value, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![name, sealed, now],
        )?;
        Ok(existed)
    })?;
    vault.close()?;

    if !ctx.quiet() {
        if replaced {
            println!("Updated {}", name);
        } else {
            println!("Stored {}", name);
        }
    }
    Ok(())
}
