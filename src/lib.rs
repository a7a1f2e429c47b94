// Rubemacro — declarative HTTP macro runner for the Rube automation API
// License: Apache-2.0

pub mod binder;
pub mod config;
pub mod error;
pub mod executor;
pub mod imagegen;
pub mod logger;
pub mod runner;
pub mod session;
pub mod store;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
