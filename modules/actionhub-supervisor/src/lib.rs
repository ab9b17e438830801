//! Connection supervision and wiring for the action hub.
//!
//! Each external source (chat, reward redemptions) gets a
//! `ConnectionSupervisor` that owns its connect/reconnect lifecycle and
//! normalizes payloads onto the engine's dispatch queue through a
//! `PayloadRouter`. The `Hub` wires supervisors, the dispatch loop, the
//! ledger and the clip award timer together.

pub mod chat;
pub mod clips;
pub mod console;
pub mod hub;
pub mod reward;
pub mod source;
pub mod state;
pub mod supervisor;

pub use chat::{AccrualPolicy, ChatRouter};
pub use clips::{Clip, ClipAwardPolicy, ClipAwarder, ClipFeed};
pub use hub::{Hub, HubDeps, HubStatus};
pub use reward::{RedemptionRouter, TopicRegistrar, TopicSubscription};
pub use source::{ChatPayload, ChatSender, EventSource, Redemption, SignalSender, SourceSignal};
pub use state::{FileWatermarkStore, MemoryWatermarkStore, WatermarkStore};
pub use supervisor::{ConnectionState, ConnectionSupervisor, PayloadRouter};
