pub mod autosave;
pub mod cache;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod errors;
pub mod field;
pub mod gateway;
pub mod logging;
pub mod resolver;

#[cfg(test)]
mod testing;
