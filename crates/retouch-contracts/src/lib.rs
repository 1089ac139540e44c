pub mod asset;
pub mod commands;
pub mod error;
pub mod events;
pub mod models;
pub mod operation;
pub mod prompt;
pub mod session;
