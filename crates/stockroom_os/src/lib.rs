#![forbid(unsafe_code)]

pub mod completion;
pub mod console;
pub mod dashboard;
pub mod purchasing;
