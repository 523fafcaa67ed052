//! Lockbox CLI - an encrypted-at-rest local secret store
//!
//! This is the command-line interface for Lockbox. It drives the core
//! library's vault: setup, unlock, secret storage and maintenance.

mod app;
mod cli;
mod commands;
mod config;
mod constants;
mod errors;
mod helpers;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::app::AppContext;
use crate::cli::{Cli, Commands};
use crate::commands::{generate, init, maintenance, secrets, status};
use crate::constants::LOG_ENV;
use crate::errors::exit_code_for;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let ctx = AppContext::new(&cli);

    if let Err(e) = run(&ctx, &cli) {
        eprintln!("Error: {}", e);
        std::process::exit(exit_code_for(&e));
    }
}

/// Log to stderr. LOCKBOX_LOG takes precedence over `--verbose`.
fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(ctx: &AppContext, cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Some(Commands::Init) => init::handle_init(ctx),
        Some(Commands::Status(args)) => status::handle_status(ctx, args),
        Some(Commands::Put(args)) => secrets::handle_put(ctx, args),
        Some(Commands::Get(args)) => secrets::handle_get(ctx, args),
        Some(Commands::List(args)) => secrets::handle_list(ctx, args),
        Some(Commands::Rm(args)) => secrets::handle_remove(ctx, args),
        Some(Commands::Export(args)) => maintenance::handle_export(ctx, args),
        Some(Commands::Backup(args)) => maintenance::handle_backup(ctx, args),
        Some(Commands::Doctor) => maintenance::handle_doctor(ctx),
        Some(Commands::Generate(args)) => generate::handle_generate(ctx, args),
        Some(Commands::Completions(args)) => {
            let mut command = Cli::command();
            clap_complete::generate(args.shell, &mut command, "lockbox", &mut std::io::stdout());
            Ok(())
        }
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}
