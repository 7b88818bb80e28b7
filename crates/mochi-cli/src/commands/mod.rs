//! CLI commands.

pub mod console;
pub mod gen_model;
pub mod info;
