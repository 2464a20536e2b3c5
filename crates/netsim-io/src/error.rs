use thiserror::Error;

/// Malformed input files. Model-level problems (unknown nodes, bad values,
/// duplicate ids) surface as [`netsim_core::NetworkError`] instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    #[error("{file}: missing column '{column}'")]
    MissingColumn { file: String, column: String },

    #[error("{file}, row {row}, column '{column}': cannot read '{value}'")]
    InvalidCell {
        file: String,
        row: usize,
        column: String,
        value: String,
    },

    #[error("{file}: unsupported format version '{version}'")]
    UnsupportedVersion { file: String, version: String },

    #[error("{file}: unexpected column '{column}'")]
    UnexpectedColumn { file: String, column: String },
}
