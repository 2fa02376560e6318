use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum HarvestError {
    #[error("invalid study identifier: {0}")]
    InvalidStudyId(String),

    #[error("run mode set is empty")]
    EmptyRunModes,

    #[error("graph conversion requested without a schema URI")]
    MissingSchemaUri,

    #[error("json conversion requested without a converter service URL")]
    MissingConverterUrl,

    #[error("directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("remote root unreachable: {0}")]
    RemoteUnavailable(String),

    #[error("remote request failed: {0}")]
    RemoteHttp(String),

    #[error("remote returned status {status}: {message}")]
    RemoteStatus { status: u16, message: String },

    #[error("converter request failed: {0}")]
    ConverterHttp(String),

    #[error("converter returned status {status}: {message}")]
    ConverterStatus { status: u16, message: String },

    #[error("converter rejected {source_file}: {message}")]
    ConversionRejected {
        source_file: String,
        message: String,
    },

    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("file name does not follow the dbGaP convention: {0}")]
    InvalidFileName(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
