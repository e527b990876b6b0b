pub mod buffers;
pub mod levels;
pub mod ramp;
pub mod surface;

pub use buffers::*;
pub use levels::*;
pub use ramp::*;
pub use surface::*;
