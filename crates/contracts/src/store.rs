//! DataStore trait - local store lifecycle interface
//!
//! Only the engine's external contract is consumed: start / stop / clear.

use crate::ContractError;

/// Local store handle
///
/// Each call may hang indefinitely; callers are expected to bound them.
#[trait_variant::make(DataStore: Send)]
pub trait LocalDataStore {
    /// Halt background sync
    async fn stop(&self) -> Result<(), ContractError>;

    /// Wipe all local data
    async fn clear(&self) -> Result<(), ContractError>;

    /// Start background sync (triggers a fresh initial sync)
    async fn start(&self) -> Result<(), ContractError>;
}
