//! Quest Definition Structures
//!
//! Raw structures mirror quests.toml; resolved structures are what the
//! engine works with.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::action::{Action, RawAction};
use crate::condition::{Condition, RawCondition};
use crate::objective::{Objective, RawObjective};

/// Newest quests.toml layout this build understands
pub const SCHEMA_VERSION: u32 = 1;

/// Entries of a numbered map (`"1"`, `"2"`, ...) in numeric order.
/// Keys that are not numbers are skipped.
pub(crate) fn numbered<'a, T>(map: &'a BTreeMap<String, T>, what: &str) -> Vec<(i32, &'a T)> {
    let mut entries: Vec<(i32, &T)> = map
        .iter()
        .filter_map(|(key, value)| match key.parse::<i32>() {
            Ok(n) => Some((n, value)),
            Err(_) => {
                warn!("Skipping {} with non-numeric key '{}'", what, key);
                None
            }
        })
        .collect();
    entries.sort_by_key(|(n, _)| *n);
    entries
}

/// Number entries 1..n for saving
pub(crate) fn renumber<T>(items: impl Iterator<Item = T>) -> BTreeMap<String, T> {
    items
        .enumerate()
        .map(|(i, item)| ((i + 1).to_string(), item))
        .collect()
}

/// Whole quests.toml document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuestDocument {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub quests: BTreeMap<String, RawQuest>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Raw quest data as it appears in TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuest {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default = "default_unlimited")]
    pub max_accepts: i32,
    /// Minutes; -1 disables the cooldown
    #[serde(default = "default_unlimited_i64")]
    pub accept_cooldown: i64,
    #[serde(default = "default_true")]
    pub take_enabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub npcs: Vec<i32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub objectives: BTreeMap<String, RawObjective>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requirements: BTreeMap<String, RawCondition>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rewards: BTreeMap<String, RawAction>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub triggers: BTreeMap<String, RawTrigger>,
}

fn default_unlimited() -> i32 {
    -1
}

fn default_unlimited_i64() -> i64 {
    -1
}

fn default_true() -> bool {
    true
}

fn default_amount_needed() -> i64 {
    1
}

/// Raw trigger as it appears in TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTrigger {
    #[serde(rename = "type")]
    pub trigger_type: String,
    pub action_name: String,
    #[serde(default)]
    pub apply_on: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_name: Option<String>,
    #[serde(default = "default_amount_needed")]
    pub amount_needed: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npc_id: Option<i32>,
}

// ============================================================================
// Resolved Quest Structures (after parsing)
// ============================================================================

/// Events a trigger can listen for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerType {
    /// Quest (or objective) accepted / unlocked
    Begin,
    Complete,
    Fail,
    Death,
    Disconnect,
    WorldEnter,
    WorldLeave,
    NpcDeath,
}

impl TriggerType {
    pub const ALL: [TriggerType; 8] = [
        TriggerType::Begin,
        TriggerType::Complete,
        TriggerType::Fail,
        TriggerType::Death,
        TriggerType::Disconnect,
        TriggerType::WorldEnter,
        TriggerType::WorldLeave,
        TriggerType::NpcDeath,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::Begin => "BEGIN",
            TriggerType::Complete => "COMPLETE",
            TriggerType::Fail => "FAIL",
            TriggerType::Death => "DEATH",
            TriggerType::Disconnect => "DISCONNECT",
            TriggerType::WorldEnter => "WORLDENTER",
            TriggerType::WorldLeave => "WORLDLEAVE",
            TriggerType::NpcDeath => "NPCDEATH",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().replace('_', "").as_str() {
            "BEGIN" => Some(TriggerType::Begin),
            "COMPLETE" => Some(TriggerType::Complete),
            "FAIL" => Some(TriggerType::Fail),
            "DEATH" => Some(TriggerType::Death),
            "DISCONNECT" => Some(TriggerType::Disconnect),
            "WORLDENTER" => Some(TriggerType::WorldEnter),
            "WORLDLEAVE" => Some(TriggerType::WorldLeave),
            "NPCDEATH" => Some(TriggerType::NpcDeath),
            _ => None,
        }
    }

    /// Fired by the engine itself rather than by game events
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, TriggerType::Begin | TriggerType::Complete | TriggerType::Fail)
    }
}

/// Binds a game event to a named action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trigger {
    pub trigger_type: TriggerType,
    pub action_name: String,
    /// 0 = the whole quest, n = only while objective n is unlocked
    pub apply_on: i32,
    /// Restrict to one world; `None` = any world
    pub world_name: Option<String>,
    /// How often the event must happen before the action runs
    pub amount_needed: i64,
    /// NPC that must die (NpcDeath only)
    pub npc_id: Option<i32>,
}

impl Trigger {
    pub fn new(trigger_type: TriggerType, action_name: &str) -> Self {
        Self {
            trigger_type,
            action_name: action_name.to_string(),
            apply_on: 0,
            world_name: None,
            amount_needed: 1,
            npc_id: None,
        }
    }

    pub fn from_raw(raw: &RawTrigger) -> Result<Self, String> {
        let trigger_type = TriggerType::from_str(&raw.trigger_type)
            .ok_or_else(|| format!("Unknown trigger type '{}'", raw.trigger_type))?;
        Ok(Self {
            trigger_type,
            action_name: raw.action_name.clone(),
            apply_on: raw.apply_on,
            world_name: raw.world_name.clone(),
            amount_needed: raw.amount_needed.max(1),
            npc_id: raw.npc_id,
        })
    }

    pub fn to_raw(&self) -> RawTrigger {
        RawTrigger {
            trigger_type: self.trigger_type.as_str().to_string(),
            action_name: self.action_name.clone(),
            apply_on: self.apply_on,
            world_name: self.world_name.clone(),
            amount_needed: self.amount_needed,
            npc_id: self.npc_id,
        }
    }

    pub fn description_line(&self) -> String {
        let scope = if self.apply_on == 0 {
            "Quest".to_string()
        } else {
            format!("Objective {}", self.apply_on)
        };
        format!(
            "{} -> {} (applies on {}, world {}, needed {})",
            self.trigger_type.as_str(),
            self.action_name,
            scope,
            self.world_name.as_deref().unwrap_or("ALL"),
            self.amount_needed
        )
    }
}

/// A fully resolved quest definition
#[derive(Debug, Clone, PartialEq)]
pub struct Quest {
    pub name: String,
    pub display_name: String,
    pub description: String,
    /// Ordered by objective ID
    pub objectives: Vec<Objective>,
    pub requirements: Vec<Condition>,
    pub rewards: Vec<Action>,
    pub triggers: Vec<Trigger>,
    /// -1 = unlimited
    pub max_accepts: i32,
    /// Minutes between acceptances; -1 = no cooldown
    pub accept_cooldown: i64,
    pub take_enabled: bool,
    /// NPC IDs that offer this quest
    pub npcs: Vec<i32>,
}

impl Quest {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: String::new(),
            description: String::new(),
            objectives: Vec::new(),
            requirements: Vec::new(),
            rewards: Vec::new(),
            triggers: Vec::new(),
            max_accepts: -1,
            accept_cooldown: -1,
            take_enabled: true,
            npcs: Vec::new(),
        }
    }

    /// Create a Quest from raw TOML data. Broken sub-entries are skipped.
    pub fn from_raw(name: &str, raw: &RawQuest) -> Result<Self, String> {
        if name.trim().is_empty() {
            return Err("Quest name is empty".to_string());
        }

        let mut objectives = Vec::new();
        for (id, raw_objective) in numbered(&raw.objectives, "objective") {
            match Objective::from_raw(id, raw_objective) {
                Ok(objective) => objectives.push(objective),
                Err(e) => warn!("Quest '{}': skipping objective {}: {}", name, id, e),
            }
        }

        let mut requirements = Vec::new();
        for (n, raw_condition) in numbered(&raw.requirements, "requirement") {
            match Condition::from_raw(raw_condition) {
                Ok(condition) => requirements.push(condition),
                Err(e) => warn!("Quest '{}': skipping requirement {}: {}", name, n, e),
            }
        }

        let mut rewards = Vec::new();
        for (n, raw_action) in numbered(&raw.rewards, "reward") {
            match Action::from_raw(raw_action) {
                Ok(action) => rewards.push(action),
                Err(e) => warn!("Quest '{}': skipping reward {}: {}", name, n, e),
            }
        }

        let mut triggers = Vec::new();
        for (n, raw_trigger) in numbered(&raw.triggers, "trigger") {
            match Trigger::from_raw(raw_trigger) {
                Ok(trigger) => triggers.push(trigger),
                Err(e) => warn!("Quest '{}': skipping trigger {}: {}", name, n, e),
            }
        }

        Ok(Self {
            name: name.to_string(),
            display_name: raw.display_name.clone(),
            description: raw.description.clone(),
            objectives,
            requirements,
            rewards,
            triggers,
            max_accepts: raw.max_accepts,
            accept_cooldown: raw.accept_cooldown,
            take_enabled: raw.take_enabled,
            npcs: raw.npcs.clone(),
        })
    }

    pub fn to_raw(&self) -> RawQuest {
        RawQuest {
            display_name: self.display_name.clone(),
            description: self.description.clone(),
            max_accepts: self.max_accepts,
            accept_cooldown: self.accept_cooldown,
            take_enabled: self.take_enabled,
            npcs: self.npcs.clone(),
            objectives: self
                .objectives
                .iter()
                .map(|o| (o.id.to_string(), o.to_raw()))
                .collect(),
            requirements: renumber(self.requirements.iter().map(|c| c.to_raw())),
            rewards: renumber(self.rewards.iter().map(|a| a.to_raw())),
            triggers: renumber(self.triggers.iter().map(|t| t.to_raw())),
        }
    }

    /// Display name if set, otherwise the quest name
    pub fn final_name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }

    /// Get objective by ID
    pub fn get_objective(&self, id: i32) -> Option<&Objective> {
        self.objectives.iter().find(|o| o.id == id)
    }

    pub fn get_objective_mut(&mut self, id: i32) -> Option<&mut Objective> {
        self.objectives.iter_mut().find(|o| o.id == id)
    }

    /// Next free objective ID
    pub fn next_objective_id(&self) -> i32 {
        self.objectives.iter().map(|o| o.id).max().unwrap_or(0) + 1
    }

    /// Append an objective, keeping the list ordered by ID
    pub fn add_objective(&mut self, objective: Objective) {
        self.objectives.push(objective);
        self.objectives.sort_by_key(|o| o.id);
    }

    /// Whether any TriggerCommand objective uses this trigger name
    pub fn uses_trigger_name(&self, trigger_name: &str) -> bool {
        self.objectives
            .iter()
            .filter_map(|o| o.trigger_name())
            .any(|name| name.eq_ignore_ascii_case(trigger_name))
    }

    pub fn max_accepts_text(&self) -> String {
        if self.max_accepts < 0 {
            "unlimited".to_string()
        } else {
            self.max_accepts.to_string()
        }
    }

    pub fn accept_cooldown_text(&self) -> String {
        if self.accept_cooldown < 0 {
            "disabled".to_string()
        } else {
            format!("{} minutes", self.accept_cooldown)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_type_parsing() {
        assert_eq!(TriggerType::from_str("begin"), Some(TriggerType::Begin));
        assert_eq!(TriggerType::from_str("WORLD_ENTER"), Some(TriggerType::WorldEnter));
        assert_eq!(TriggerType::from_str("NPCDEATH"), Some(TriggerType::NpcDeath));
        assert_eq!(TriggerType::from_str("invalid"), None);
        for trigger_type in TriggerType::ALL {
            assert_eq!(TriggerType::from_str(trigger_type.as_str()), Some(trigger_type));
        }
    }

    #[test]
    fn test_numbered_sorts_numerically() {
        let map: BTreeMap<String, &str> = [("10", "c"), ("2", "b"), ("1", "a"), ("x", "skip")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let values: Vec<&str> = numbered(&map, "entry").into_iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_quest_from_raw_skips_bad_objectives() {
        let raw: RawQuestDocument = toml::from_str(
            r#"
schemaVersion = 1

[quests.Miner]
displayName = "The Miner"
maxAccepts = 1

[quests.Miner.objectives.1]
type = "CollectItems"
progressNeeded = 5
specifics = { itemToCollect = "COAL" }

[quests.Miner.objectives.2]
type = "FlyToTheMoon"
"#,
        )
        .unwrap();

        let quest = Quest::from_raw("Miner", &raw.quests["Miner"]).unwrap();
        assert_eq!(quest.final_name(), "The Miner");
        assert_eq!(quest.max_accepts, 1);
        assert_eq!(quest.accept_cooldown, -1);
        assert!(quest.take_enabled);
        assert_eq!(quest.objectives.len(), 1);
        assert_eq!(quest.objectives[0].progress_needed, 5);
        assert_eq!(quest.next_objective_id(), 2);
    }
}
