pub mod geo;
pub mod ids;
pub mod precision;
pub mod series;
pub mod time;

// Foundation crate: small, well-tested primitives only.
pub use geo::*;
pub use ids::*;
pub use precision::*;
pub use series::*;
pub use time::*;
