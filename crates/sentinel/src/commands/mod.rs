//! CLI subcommands

pub mod rate;
pub mod replay;
pub mod watch;
