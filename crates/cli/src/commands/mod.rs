pub mod chat;
pub mod classify;
pub mod config_cmd;
pub mod models;
pub mod serve;
