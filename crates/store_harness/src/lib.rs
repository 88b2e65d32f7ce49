//! # Store Harness
//!
//! 进程内模拟协作方，用于 CLI 开发工具与测试。
//!
//! - [`InProcessBus`]: 同步 pub/sub，实现 `LifecycleBus`
//! - [`SimulatedStore`]: 可脚本化的本地存储，实现 `DataStore` 与 `ConflictRegistry`

mod bus;
mod store;

pub use bus::InProcessBus;
pub use store::{ScriptedSync, SimulatedStore, StepBehavior, StoreState, SyncScript};
