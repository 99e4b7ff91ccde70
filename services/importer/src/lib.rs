//! Project tracking import pipeline.
//!
//! Turns uploaded CSV and spreadsheet files into project, activity and daily
//! metric records. Each project type declares its columns in a JSON catalog;
//! uploads are read into a [`reader::RawTable`], mapped onto canonical field
//! names, validated, normalized and written inside a single transaction.

pub mod config;
pub mod dates;
pub mod export;
pub mod mapping;
pub mod normalize;
pub mod processor;
pub mod provinces;
pub mod reader;
pub mod store;
pub mod template;
pub mod validate;

pub use config::{ConfigError, ProjectTypeCatalog, SharedCatalog};
pub use processor::{import_site_list, import_table, ImportFormat, ImportResult, SiteListResult};
pub use reader::{read_upload, RawTable, ReadError};
pub use store::{ImportStore, MemoryStore, PgStore, StoreError};
