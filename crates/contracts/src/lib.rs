//! # Contracts
//!
//! Frozen interface contracts (ICD) between the sync lifecycle coordinator and its
//! collaborators. All business crates can only depend on this crate, reverse
//! dependencies are prohibited.
//!
//! ## Collaborators
//! - [`LifecycleBus`]: the storage engine's notification channel (`listen` + unsubscribe)
//! - [`DataStore`]: the local store handle (`stop` / `clear` / `start`)
//! - [`ConflictRegistry`]: the engine hook that accepts a [`ConflictHandler`]
//!
//! ## Time Model
//! - All deadlines are wall-clock milliseconds, driven by the tokio timer

mod bus;
mod config;
mod conflict;
mod error;
mod event;
mod lifecycle;
mod options;
mod store;
mod telemetry;

pub use bus::*;
pub use config::*;
pub use conflict::*;
pub use error::*;
pub use event::*;
pub use lifecycle::*;
pub use options::*;
pub use store::{DataStore, LocalDataStore};
pub use telemetry::*;
