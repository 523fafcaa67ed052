use crate::app::AppContext;
use crate::cli::RmArgs;

use super::{secret_not_found, table_exists, validate_name};

pub fn handle_remove(ctx: &AppContext, args: &RmArgs) -> anyhow::Result<()> {
    let name = validate_name(&args.name)?;
    let (vault, _password) = ctx.unlock()?;

    let removed = vault.store().with_handle(|handle| {
        if !table_exists(handle)? {
            return Ok(0);
        }
        Ok(handle.execute("DELETE FROM secrets WHERE name = ?1", [name])?)
    })?;
    vault.close()?;

    if removed == 0 {
        return Err(secret_not_found(name));
    }
    if !ctx.quiet() {
        println!("Removed {}", name);
    }
    Ok(())
}
