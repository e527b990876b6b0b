pub mod interaction;
pub mod selection;

pub use interaction::*;
pub use selection::*;
