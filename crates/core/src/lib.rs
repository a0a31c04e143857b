pub mod config;
pub mod dataset;
pub mod error;
pub mod sorting;

pub use config::SortConfig;
pub use dataset::*;
pub use error::*;
pub use sorting::*;
