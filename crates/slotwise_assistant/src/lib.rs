// --- File: crates/slotwise_assistant/src/lib.rs ---
pub mod availability;
#[cfg(test)]
mod availability_proptest;
pub mod doc;
pub mod error;
pub mod handlers;
pub mod intent;
pub mod logic;
pub mod model;
pub mod negotiator;
#[cfg(test)]
mod negotiator_test;
mod phrases;
pub mod reply;
pub mod routes;
pub mod session;
pub mod settings;
pub mod turn;
#[cfg(test)]
mod test_support;

pub use availability::{free_segments, resolve_slots, ResolverOptions};
pub use error::SchedulingError;
pub use intent::{IntentContext, IntentOracle, Refinement, RuleBasedOracle};
pub use logic::{SchedulingAssistant, TurnOutcome};
pub use model::{Action, CandidateSlot, Constraints, SchedulingRequest};
pub use negotiator::{AbandonReason, DialogueState, Phase};
pub use routes::routes;
pub use settings::AssistantSettings;
