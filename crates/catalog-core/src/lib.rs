pub mod error;
pub mod model;
pub mod time;

pub use error::{CatalogError, ErrorCategory, Result};
pub use model::{Record, Snapshot, decode_records};
pub use crate::time::{format_update_time, now_utc};
