pub mod config;
pub mod context;
pub mod guard;
pub mod llm;
pub mod runner;
pub mod schemas;
pub mod session;
pub mod telemetry;
pub extern crate url;
