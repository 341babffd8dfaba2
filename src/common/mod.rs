pub mod config;
pub mod error;
pub mod types;

pub use config::*;
pub use error::{AbortReason, RelCoreError, Result};
pub use types::*;
