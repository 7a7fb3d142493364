//! CLI module for dreamlog - command-line interface and subcommands.
//!
//! Every write goes through a `ViewCache` so bus events fire the same way
//! they would behind a UI.

pub mod commands;

pub use commands::Cli;
