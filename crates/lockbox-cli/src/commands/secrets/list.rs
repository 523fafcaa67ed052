use chrono::{DateTime, Utc};
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};

use crate::app::AppContext;
use crate::cli::ListArgs;

use super::table_exists;

struct SecretRow {
    name: String,
    updated_at: DateTime<Utc>,
}

pub fn handle_list(ctx: &AppContext, args: &ListArgs) -> anyhow::Result<()> {
    let (vault, _password) = ctx.unlock()?;

    let rows = vault.store().with_handle(|handle| {
        if !table_exists(handle)? {
            return Ok(Vec::new());
        }
        let mut stmt = handle.prepare("SELECT name, updated_at FROM secrets ORDER BY name")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    })?;
    vault.close()?;

    let rows = rows
        .into_iter()
        .map(|(name, updated_at)| {
            let updated_at = DateTime::parse_from_rfc3339(&updated_at)
                .map_err(|e| anyhow::anyhow!("Invalid timestamp for {}: {}", name, e))?
                .with_timezone(&Utc);
            Ok(SecretRow { name, updated_at })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    if args.json {
        let output: Vec<_> = rows
            .iter()
            .map(|row| {
                serde_json::json!({
                    "name": row.name,
                    "updatedAt": row.updated_at.to_rfc3339(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if rows.is_empty() {
        if !ctx.quiet() {
            println!("No secrets stored.");
        }
        return Ok(());
    }

    if ctx.quiet() {
        for row in &rows {
            println!("{}", row.name);
        }
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Name", "Updated"]);
    for row in &rows {
        table.add_row(vec![
            row.name.clone(),
            row.updated_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    println!("{}", table);
    Ok(())
}
