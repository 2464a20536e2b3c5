//! # netsim-io: model and result files
//!
//! Two interchangeable model formats and two result formats:
//!
//! | Format | Model | Result |
//! |--------|-------|--------|
//! | CSV folder | [`export_csv_folder`] / [`import_csv_folder`] | [`export_result_csv`] |
//! | JSON document | [`export_json`] / [`import_json`] | [`export_result_json`] |
//! | Parquet (feature `parquet`) | | `export_result_parquet` |
//!
//! Imports replay the file contents through the [`netsim_core::Network`]
//! builder. A file that would produce an invalid model yields an error and
//! no network; the error chain carries either a [`FormatError`] (unreadable
//! file) or a [`netsim_core::NetworkError`] (invalid model).
//!
//! ```no_run
//! use netsim_io::{export_csv_folder, import_csv_folder};
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let network = import_csv_folder(Path::new("case/"))?;
//!     export_csv_folder(&network, Path::new("copy/"))?;
//!     Ok(())
//! }
//! ```

pub mod csv_folder;
mod error;
pub mod json;
pub mod results;

pub use csv_folder::{export_csv_folder, import_csv_folder, FORMAT_VERSION};
pub use error::FormatError;
pub use json::{export_json, export_result_json, from_json_str, import_json, to_json_string};
#[cfg(feature = "parquet")]
pub use results::export_result_parquet;
pub use results::export_result_csv;
