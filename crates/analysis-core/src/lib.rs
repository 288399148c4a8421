pub mod error;
pub mod metrics;
pub mod types;

pub use error::*;
pub use metrics::*;
pub use types::*;
