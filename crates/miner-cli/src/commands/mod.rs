//! CLI command handlers

pub mod common;
pub mod reset;
pub mod run;
pub mod session;
pub mod status;
