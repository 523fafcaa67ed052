use rusqlite::OptionalExtension;
use secrecy::ExposeSecret;

use crate::app::AppContext;
use crate::cli::GetArgs;

use super::{secret_not_found, table_exists, validate_name};

pub fn handle_get(ctx: &AppContext, args: &GetArgs) -> anyhow::Result<()> {
    let name = validate_name(&args.name)?;
    let (vault, _password) = ctx.unlock()?;

    let value = vault.store().with_handle(|handle| {
        if !table_exists(handle)? {
            return Ok(None);
        }
        let blob: Option<Vec<u8>> = handle
            .query_row(
                "SELECT value FROM secrets WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()?;
        blob.map(|blob| handle.open_field(&blob)).transpose()
    })?;
    vault.close()?;

    let value = value.ok_or_else(|| secret_not_found(name))?;
    println!("{}", value.expose_secret());
    Ok(())
}
