pub mod api;
pub mod app;
pub mod bus;
pub mod cli;
pub mod config;
pub mod error;
pub mod global;
pub mod ledger;
pub mod orchestrator;
pub mod pipeline;
pub mod storage;
