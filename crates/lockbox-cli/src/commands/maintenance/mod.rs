//! Maintenance commands: export, backup and diagnostics.

mod backup;
mod doctor;
mod export;

pub use backup::handle_backup;
pub use doctor::handle_doctor;
pub use export::handle_export;
