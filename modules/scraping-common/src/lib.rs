pub mod config;
pub mod error;
pub mod types;
pub mod util;

pub use config::Secrets;
pub use error::ScrapingError;
pub use types::*;
pub use util::mask_sensitive_data;
