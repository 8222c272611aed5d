//! Rule evaluation and orchestration for the Verdant engine.
//!
//! - **Condition evaluator**: the five condition kinds, each yielding a
//!   decision with confidence and reasoning
//! - **Logic evaluator**: boolean expression trees over a variable scope
//! - **Orchestrator**: trigger pre-filter, decision logging, then/else
//!   branch execution, advisory enrichment
//! - **Anomaly heuristics**: hard-coded safety checks independent of
//!   user rules

pub mod anomaly;
pub mod condition;
pub mod error;
pub mod logic;
pub mod orchestrator;

pub use anomaly::AnomalyDetector;
pub use condition::{evaluate, evaluate_at, ComparisonOperator};
pub use error::{Result, RuleError};
pub use logic::{build_scope, eval_node, resolve_variable, Scope};
pub use orchestrator::{trigger_matches, EventOutcome, Orchestrator};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
