//! View caches: paginated in-memory lists kept in step through the event bus.

mod filters;
mod view_cache;

pub use filters::CacheFilters;
pub use view_cache::{CacheSnapshot, ViewCache};
