//! League navigation lookups and fixture filter options.

pub mod filters;
pub mod navigation;

pub use filters::{resolve_filter_options, resolve_filter_options_at, FilterOptions};
pub use navigation::NavigationIndex;
