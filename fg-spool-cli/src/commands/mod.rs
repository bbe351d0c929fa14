pub mod command;
pub mod export;
