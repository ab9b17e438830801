//! Event dispatch engine.
//!
//! Producers push `EventInvocationRequest`s onto a single FIFO; one consumer
//! (`Executor`) pops them in arrival order and runs each through
//! lookup → permission → cost → cooldown → invoke → charge.
//!
//! Everything outside the pipeline is a port: the points `Ledger`, the
//! `ScriptRuntime` that runs actions, the `ReplySink` for chat replies and the
//! `UserDirectory` that maps ids to display names.

pub mod catalog;
pub mod cooldown;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod loader;
pub mod queue;
pub mod request;
pub mod store;
pub mod traits;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use catalog::{ActionHandle, Catalog, EventDefinition};
pub use cooldown::Cooldown;
pub use error::{CatalogError, LedgerError};
pub use executor::{DispatchOutcome, Executor, ExecutorStats, RejectReason};
pub use ledger::MemoryLedger;
pub use loader::{CatalogLoader, CatalogSource, FileCatalogSource, StaticCatalogSource};
pub use queue::{dispatch_queue, DispatchQueue, DispatchReceiver};
pub use request::EventInvocationRequest;
pub use store::CatalogStore;
pub use traits::{Invocation, Ledger, ReplySink, ScriptRuntime, UserDirectory};
