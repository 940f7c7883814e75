pub mod driver;
pub mod chrome;
pub mod layout;
pub mod strategy;
pub mod auth;
pub mod navigator;
pub mod date_range;
pub mod download;

#[cfg(test)]
pub(crate) mod testing;

pub use driver::*;
pub use layout::*;
pub use strategy::*;
pub use auth::authenticate;
pub use navigator::{navigate, reset_to_baseline};
pub use date_range::{set_date_range, DateFilterOutcome};
pub use download::{find_matching_row, retrieve_document};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Navigation failed at step '{step}'")]
    Navigation { step: String },

    #[error("Document not retrieved: {0}")]
    DocumentNotRetrieved(String),

    #[error("Browser error: {0}")]
    Driver(#[from] DriverError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
