//! Rule-based stock screening.
//!
//! A [`ScreenCriteria`] holds min/max bounds grouped into fundamental,
//! technical and quantitative categories plus categorical filters. Missing
//! metric values are resolved through a per-metric [`SentinelTable`] rather
//! than a single global default.

pub mod criteria;
pub mod screener;
pub mod sentinels;

pub use criteria::{Bound, CategoryRules, ScreenCriteria, TagMatch};
pub use screener::{screen, ScreenResult, ScreenerConfig, StockScreener};
pub use sentinels::{MissingValue, SentinelTable};
