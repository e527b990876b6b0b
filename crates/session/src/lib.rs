//! Forecast map interaction engine.
//!
//! [`MapSession`] is the single context object a host drives: it owns the
//! level router, double-buffered tile sources, interaction state, detail
//! cache and viewport domain, and reports back through an [`Effect`] outbox
//! and an [`EngineEvent`] bus.

pub mod command;
pub mod config;
pub mod effects;
pub mod session;

pub use command::*;
pub use config::*;
pub use effects::*;
pub use session::*;
