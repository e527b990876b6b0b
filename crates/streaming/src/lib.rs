pub mod cache;
pub mod error;
pub mod protocol;
pub mod request;

pub use cache::*;
pub use error::*;
pub use protocol::*;
pub use request::*;
