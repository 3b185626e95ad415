#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod formats;
pub mod item;
pub mod logging;
pub mod merge;
pub mod reconcile;
pub mod scan;
pub mod series;
pub mod shell;
pub mod store;
pub mod transport;

#[cfg(test)]
mod test_support;
