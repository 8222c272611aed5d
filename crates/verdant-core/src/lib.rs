//! Core types and collaborator seams for the Verdant greenhouse
//! automation engine.
//!
//! This crate defines the domain model (telemetry samples, rules,
//! actions, alerts, decisions), the unified error type, engine
//! configuration, the in-process event bus, and the traits behind which
//! external collaborators live: storage, the outbound command channel,
//! and the advisory text generator.

pub mod action;
pub mod advisory;
pub mod channel;
pub mod config;
pub mod error;
pub mod event;
pub mod eventbus;
pub mod rule;
pub mod storage;
pub mod telemetry;

pub use action::{
    Action, ActionId, ActionSpec, ActionStatus, ActionType, AlertId, AlertSeverity, AnomalyAlert,
    ImportantAction, branch_parameters,
};
pub use advisory::{AdvisoryGenerator, AdvisoryRequest, FailingAdvisory, SharedAdvisory,
    StaticAdvisory};
pub use channel::{CommandChannel, MemoryChannel, SharedChannel, topics};
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use event::EngineEvent;
pub use eventbus::{DEFAULT_CHANNEL_CAPACITY, EventBus, SharedEventBus};
pub use rule::{
    ConditionKind, Decision, DecisionId, DecisionLogEntry, LogicNode, Rule, RuleCondition, RuleId,
    RuleVariable, TimerSpec, TriggerMatch, TriggerSpec, TriggerType, VariableSource,
};
pub use storage::{MemoryStorage, SharedStorage, Storage};
pub use telemetry::{RawReading, SampleId, SampleIdentity, SensorType, TelemetrySample};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
