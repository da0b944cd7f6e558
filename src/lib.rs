pub mod cli;
pub mod config;
pub mod coordinator;
pub mod delivery;
pub mod source;
pub mod storage;
