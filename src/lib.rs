pub mod api;
pub mod catalog;
pub mod client;
pub mod command;
pub mod device;
pub mod discovery;
pub mod error;
pub mod macros;
pub mod model;
pub mod parse;
pub mod paths;
pub mod persist;
pub mod scheduler;
pub mod settings;
pub mod state;
pub mod supervisor;

#[cfg(test)]
mod test_support;
