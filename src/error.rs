use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("data file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse spreadsheet {path}: {message}")]
    Spreadsheet { path: PathBuf, message: String },

    #[error("failed to parse CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("unsupported file format: {path} (expected xlsx, xls, xlsm, xlsb, ods or csv)")]
    UnsupportedFormat { path: PathBuf },

    #[error("spreadsheet has no worksheets: {path}")]
    EmptyWorkbook { path: PathBuf },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("required column '{column}' is missing (found: {})", .available.join(", "))]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },
}

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("user '{username}' is not allowed to upload data")]
    UploadForbidden { username: String },

    #[error("uploaded file {upload} does not match the data file format of {data_path}")]
    UploadFormatMismatch { upload: PathBuf, data_path: PathBuf },

    #[error("failed to store data file {path}: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
