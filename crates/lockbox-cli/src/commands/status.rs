use crate::app::AppContext;
use crate::cli::StatusArgs;

pub fn handle_status(ctx: &AppContext, args: &StatusArgs) -> anyhow::Result<()> {
    let vault = ctx.vault()?;
    let status = vault.status();
    let paths = vault.paths();

    if args.json {
        let output = serde_json::json!({
            "status": status,
            "dir": paths.dir().display().to_string(),
            "legacyDatabase": paths.has_legacy(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Status: {}", status);
    if !ctx.quiet() {
        println!("Directory: {}", paths.dir().display());
        if paths.has_legacy() {
            println!("Legacy plaintext database found; it is migrated when the store is next opened.");
        }
    }
    Ok(())
}
