//! Input helper functions for the CLI.
//!
//! Master password prompting and secret value reading (`input`).

mod input;

pub use input::{env_password, prompt_new_password, prompt_password, read_secret_value};
