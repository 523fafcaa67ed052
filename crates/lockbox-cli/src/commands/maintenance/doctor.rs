use crate::app::{resolve_config_path, AppContext};

pub fn handle_doctor(ctx: &AppContext) -> anyhow::Result<()> {
    let config_path = resolve_config_path()?;
    let (vault, _password) = ctx.unlock()?;

    let report = vault.store().with_handle(|handle| {
        let integrity: String =
            handle.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        let mut secrets = 0usize;
        let mut unreadable = Vec::new();
        let has_secrets: bool = handle.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'secrets')",
            [],
            |row| row.get(0),
        )?;
        if has_secrets {
            let mut stmt = handle.prepare("SELECT name, value FROM secrets ORDER BY name")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            for (name, blob) in rows {
                match handle.open_field(&blob) {
                    Ok(_) => secrets += 1,
                    Err(_) => unreadable.push(name),
                }
            }
        }
        Ok((integrity, secrets, unreadable))
    })?;
    let metadata = vault.store().metadata()?;
    vault.close()?;

    let (integrity, secrets, unreadable) = report;
    if integrity != "ok" || !unreadable.is_empty() {
        eprintln!("Doctor: FAILED");
        if integrity != "ok" {
            eprintln!("- integrity check: {}", integrity);
        }
        for name in &unreadable {
            eprintln!("- secret {}: cannot be decrypted", name);
        }
        eprintln!("Hint: Restore from a backup (see `lockbox backup`).");
        return Err(anyhow::anyhow!("Doctor failed"));
    }

    if !ctx.quiet() {
        println!("Doctor: OK");
        if config_path.exists() {
            println!("- config: OK ({})", config_path.display());
        } else {
            println!("- config: defaults ({} not found)", config_path.display());
        }
        println!("- store: OK ({})", vault.paths().store.display());
        println!("- format version: {}", metadata.format_version);
        println!("- last modified: {}", metadata.last_modified.to_rfc3339());
        println!("- integrity: OK");
        println!("- secrets: {} readable", secrets);
    }
    Ok(())
}
