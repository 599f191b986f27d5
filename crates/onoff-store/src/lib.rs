pub mod catalog;
pub mod cli;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod gateway;
pub mod install;
pub mod instance;
pub mod ledger;
pub mod models;

pub use error::{Result, StoreError};
