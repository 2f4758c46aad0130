//! Progress tracking helpers.
//!
//! - `QueryThrottle` - Rate-limits backend queries per transfer

mod throttle;

pub use throttle::QueryThrottle;
