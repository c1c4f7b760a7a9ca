//! Data models

pub mod chat;
pub mod log;

pub use chat::*;
pub use log::*;
