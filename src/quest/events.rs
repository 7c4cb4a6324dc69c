//! Quest Event Types
//!
//! Game events that can advance objectives or fire triggers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::definition::TriggerType;

/// Events that can trigger quest progress
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestEvent {
    /// Player crafted items
    ItemCrafted {
        player: Uuid,
        /// Item ID (e.g. "CHEST")
        item: String,
        #[serde(default = "default_amount")]
        amount: i64,
    },

    /// Player picked up items
    ItemCollected {
        player: Uuid,
        item: String,
        #[serde(default = "default_amount")]
        amount: i64,
    },

    /// A named trigger fired for the player (command block, script, bridge)
    TriggerFired {
        player: Uuid,
        trigger_name: String,
    },

    /// Death, disconnect, world change or NPC kill
    Game {
        player: Uuid,
        trigger_type: TriggerType,
        #[serde(default)]
        world: Option<String>,
        #[serde(default)]
        npc_id: Option<i32>,
    },
}

fn default_amount() -> i64 {
    1
}

impl QuestEvent {
    /// Get the player associated with this event
    pub fn player(&self) -> Uuid {
        match self {
            QuestEvent::ItemCrafted { player, .. }
            | QuestEvent::ItemCollected { player, .. }
            | QuestEvent::TriggerFired { player, .. }
            | QuestEvent::Game { player, .. } => *player,
        }
    }

    /// Get event type as string (for logging/debugging)
    pub fn event_type(&self) -> &'static str {
        match self {
            QuestEvent::ItemCrafted { .. } => "item_crafted",
            QuestEvent::ItemCollected { .. } => "item_collected",
            QuestEvent::TriggerFired { .. } => "trigger_fired",
            QuestEvent::Game { .. } => "game",
        }
    }
}

/// One objective that moved because of an event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub quest_name: String,
    pub objective_id: i32,
    pub progress: i64,
    pub progress_needed: i64,
    /// The objective was just completed
    pub objective_completed: bool,
    /// The whole quest was completed as a result
    pub quest_completed: bool,
}
