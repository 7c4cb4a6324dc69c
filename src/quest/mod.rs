//! Quest System Module
//!
//! Quest definitions, their TOML store, and per-player progress state.

pub mod definition;
pub mod events;
pub mod state;
pub mod store;

pub use definition::{Quest, Trigger, TriggerType};
pub use events::{ProgressUpdate, QuestEvent};
pub use state::{ActiveObjective, ActiveQuest, CompletedQuest, ObjectiveStatus, ProgressResult, QuestPlayer};
pub use store::{HotReloadEvent, QuestStore};
