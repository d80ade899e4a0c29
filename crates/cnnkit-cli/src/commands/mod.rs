//! Subcommand implementations.

pub(crate) mod config_template;
pub(crate) mod inspect;
pub(crate) mod train;
