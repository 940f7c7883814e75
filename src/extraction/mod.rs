//! Document field extraction through a hosted document-understanding model.
//!
//! The PDF goes to the service together with a prompt built from the
//! document kind's field schema; the free-form answer is searched for one
//! JSON object, which is then coerced against the schema.

pub mod client;
pub mod extractor;
pub mod parser;
pub mod prompt;
pub mod schema;

pub use client::{ExtractionClient, GeminiClient, MockExtractionClient};
pub use extractor::{DocumentFieldExtractor, ExtractedFields};
pub use parser::parse_structured_text;
pub use schema::{FieldKind, FieldSchema, FieldSpec, FieldValue};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Extraction service unreachable at {0}")]
    Connection(String),

    #[error("Extraction service returned error (status {status}): {body}")]
    Service { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Model output contained no JSON object")]
    NoStructuredObject,

    #[error("Document is empty: {0}")]
    EmptyDocument(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
