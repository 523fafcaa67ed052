use std::path::Path;

use crate::app::AppContext;
use crate::cli::ExportArgs;

pub fn handle_export(ctx: &AppContext, args: &ExportArgs) -> anyhow::Result<()> {
    let destination = Path::new(&args.destination);
    if destination.is_dir() {
        return Err(anyhow::anyhow!(
            "Export destination {} is a directory",
            destination.display()
        ));
    }

    let (vault, password) = ctx.unlock()?;
    let archive = vault.export_archive(&password)?;
    vault.close()?;

    lockbox_core::fs::write_atomic(destination, &archive)?;
    if !ctx.quiet() {
        println!(
            "Exported {} bytes to {}",
            archive.len(),
            destination.display()
        );
        println!("The archive is encrypted with your master password.");
    }
    Ok(())
}
