pub mod aggregate;
pub mod statistics;
pub mod viewport;

pub use aggregate::*;
pub use statistics::*;
pub use viewport::*;
