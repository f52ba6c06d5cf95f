#![forbid(unsafe_code)]

pub mod console_cli;
pub mod grid;
