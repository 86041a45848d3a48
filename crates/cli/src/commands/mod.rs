// Subcommands

pub mod ask;
pub mod lead;
pub mod reports;
pub mod session;
pub mod version;
