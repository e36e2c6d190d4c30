// Utility functions — ID generation, clocks, route matching.

pub mod clock;
pub mod id;
pub mod route;

pub use clock::{Clock, FixedClock, SystemClock};
pub use id::generate_id;
pub use route::{route_matches, route_matches_any};
