use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use lockbox_core::crypto::DEFAULT_LENGTH;
use lockbox_core::VERSION;

/// Lockbox - an encrypted-at-rest local secret store
#[derive(Parser)]
#[command(name = "lockbox")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory holding store.enc and auth.json
    #[arg(short, long, global = true, env = "LOCKBOX_DIR")]
    pub dir: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose logging to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable interactive prompts
    #[arg(long, global = true)]
    pub no_input: bool,
}

/// Arguments for the `status` command
#[derive(Args)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `put` command
#[derive(Args)]
pub struct PutArgs {
    /// Secret name
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Secret value (prompted or read from stdin when omitted)
    #[arg(long)]
    pub value: Option<String>,
}

/// Arguments for the `get` command
#[derive(Args)]
pub struct GetArgs {
    /// Secret name
    #[arg(value_name = "NAME")]
    pub name: String,
}

/// Arguments for the `list` command
#[derive(Args)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `rm` command
#[derive(Args)]
pub struct RmArgs {
    /// Secret name
    #[arg(value_name = "NAME")]
    pub name: String,
}

/// Arguments for the `export` command
#[derive(Args)]
pub struct ExportArgs {
    /// Archive file to write
    #[arg(value_name = "FILE")]
    pub destination: String,
}

/// Arguments for the `backup` command
#[derive(Args)]
pub struct BackupArgs {
    /// Destination directory
    #[arg(value_name = "DEST")]
    pub destination: String,
}

/// Arguments for the `generate` command
#[derive(Args)]
pub struct GenerateArgs {
    /// Number of characters
    #[arg(short, long, default_value_t = DEFAULT_LENGTH)]
    pub length: usize,

    /// Leave out uppercase letters
    #[arg(long)]
    pub no_uppercase: bool,

    /// Leave out lowercase letters
    #[arg(long)]
    pub no_lowercase: bool,

    /// Leave out digits
    #[arg(long)]
    pub no_numbers: bool,

    /// Leave out symbols
    #[arg(long)]
    pub no_symbols: bool,

    /// Allow look-alike characters such as 0/O and 1/l
    #[arg(long)]
    pub allow_ambiguous: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `completions` command
#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_name = "SHELL")]
    pub shell: Shell,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set the master password and create the encrypted store
    Init,

    /// Show whether the store is set up, locked or damaged
    Status(StatusArgs),

    /// Store a secret
    Put(PutArgs),

    /// Print a secret
    Get(GetArgs),

    /// List secret names
    List(ListArgs),

    /// Delete a secret
    Rm(RmArgs),

    /// Write a password-protected export archive
    Export(ExportArgs),

    /// Copy the encrypted store and its metadata to a directory
    Backup(BackupArgs),

    /// Run diagnostics on the store
    Doctor,

    /// Generate a random password
    Generate(GenerateArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}
