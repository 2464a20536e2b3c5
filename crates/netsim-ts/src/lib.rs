//! # netsim-ts: time-series supplier
//!
//! Produces one value per snapshot for time-varying component attributes,
//! either from a literal enumeration or from a small parametric shape, and
//! loads profile columns from CSV (or Parquet) files.
//!
//! ```
//! use chrono::NaiveDate;
//! use netsim_core::SnapshotIndex;
//! use netsim_ts::Profile;
//!
//! let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
//! let index = SnapshotIndex::hourly(start, 24).unwrap();
//! let solar = Profile::Diurnal { sunrise: 6.0, sunset: 18.0, peak: 1.0 };
//! let values = solar.generate(&index).unwrap();
//! assert_eq!(values.len(), 24);
//! assert!((values[12] - 1.0).abs() < 1e-12);
//! assert_eq!(values[3], 0.0);
//! ```

mod loader;
mod profile;

pub use loader::{load_labelled_profile, load_profile};
pub use profile::Profile;
