//! Command handlers, one module per subcommand group.

pub mod generate;
pub mod init;
pub mod maintenance;
pub mod secrets;
pub mod status;
