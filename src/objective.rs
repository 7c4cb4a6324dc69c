//! Objectives
//!
//! Typed progress trackers inside a quest. Each objective carries its own
//! completion conditions and rewards; dependencies gate when it unlocks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::action::{Action, RawAction};
use crate::condition::{Condition, ConditionKind, RawCondition};
use crate::quest::definition::{numbered, renumber};
use crate::variable::VariableRegistry;

/// A point in a world, shown to players when `show_location` is set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Persisted objective (`quests.<quest>.objectives.<id>`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawObjective {
    #[serde(rename = "type")]
    pub objective_type: String,
    #[serde(default)]
    pub specifics: toml::Table,
    #[serde(default = "default_progress_needed")]
    pub progress_needed: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_npc_id: Option<i32>,
    #[serde(default)]
    pub show_location: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<i32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub conditions: BTreeMap<String, RawCondition>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rewards: BTreeMap<String, RawAction>,
}

fn default_progress_needed() -> i64 {
    1
}

/// Objective types and their type-specific fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "specifics", rename_all_fields = "camelCase")]
pub enum ObjectiveKind {
    CraftItems {
        item_to_craft: String,
        #[serde(default)]
        craft_any_item: bool,
    },
    CollectItems {
        item_to_collect: String,
        #[serde(default)]
        collect_any_item: bool,
    },
    TriggerCommand {
        trigger_name: String,
    },
    Condition {
        condition: Box<Condition>,
        #[serde(default)]
        check_only_when_variable_changes: bool,
    },
    OtherQuest {
        other_quest_name: String,
        #[serde(default)]
        count_previous_completions: bool,
    },
}

pub const OBJECTIVE_TYPES: &[&str] = &[
    "CraftItems",
    "CollectItems",
    "TriggerCommand",
    "Condition",
    "OtherQuest",
];

impl ObjectiveKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ObjectiveKind::CraftItems { .. } => "CraftItems",
            ObjectiveKind::CollectItems { .. } => "CollectItems",
            ObjectiveKind::TriggerCommand { .. } => "TriggerCommand",
            ObjectiveKind::Condition { .. } => "Condition",
            ObjectiveKind::OtherQuest { .. } => "OtherQuest",
        }
    }

    /// Build an objective from command arguments (everything after the
    /// type). Returns the kind and its progress needed.
    pub fn from_args(
        objective_type: &str,
        args: &[String],
        variables: &VariableRegistry,
    ) -> Result<(Self, i64), String> {
        let arg = |i: usize, name: &str| -> Result<String, String> {
            args.get(i)
                .cloned()
                .ok_or_else(|| format!("Missing argument <{}> for {} objective", name, objective_type))
        };
        let amount = |i: usize| -> Result<i64, String> {
            match args.get(i) {
                None => Ok(1),
                Some(raw) => match raw.parse::<i64>() {
                    Ok(n) if n >= 1 => Ok(n),
                    _ => Err(format!("'{}' is not a valid amount", raw)),
                },
            }
        };

        match objective_type.to_lowercase().as_str() {
            "craftitems" => {
                let item = arg(0, "item|any")?;
                let any = item.eq_ignore_ascii_case("any");
                Ok((
                    ObjectiveKind::CraftItems { item_to_craft: item.to_uppercase(), craft_any_item: any },
                    amount(1)?,
                ))
            }
            "collectitems" => {
                let item = arg(0, "item|any")?;
                let any = item.eq_ignore_ascii_case("any");
                Ok((
                    ObjectiveKind::CollectItems { item_to_collect: item.to_uppercase(), collect_any_item: any },
                    amount(1)?,
                ))
            }
            "triggercommand" => Ok((
                ObjectiveKind::TriggerCommand { trigger_name: arg(0, "trigger name")? },
                amount(1)?,
            )),
            "condition" => {
                let condition_type = arg(0, "condition type")?;
                let kind = ConditionKind::from_args(&condition_type, &args[1..], variables)?;
                Ok((
                    ObjectiveKind::Condition {
                        condition: Box::new(Condition::new(kind)),
                        check_only_when_variable_changes: false,
                    },
                    1,
                ))
            }
            "otherquest" => Ok((
                ObjectiveKind::OtherQuest {
                    other_quest_name: arg(0, "quest name")?,
                    count_previous_completions: args
                        .get(2)
                        .map(|s| s.eq_ignore_ascii_case("true"))
                        .unwrap_or(false),
                },
                amount(1)?,
            )),
            _ => Err(format!("Unknown objective type '{}'", objective_type)),
        }
    }
}

/// What the engine does right after an objective unlocks
#[derive(Debug, Clone, PartialEq)]
pub enum UnlockFollowUp {
    Nothing,
    /// Check the objective's condition once
    CheckCondition,
    /// Credit completions of another quest made before this one was accepted
    CountCompletions(String),
}

/// A unit of progress within a quest
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    pub id: i32,
    pub kind: ObjectiveKind,
    pub progress_needed: i64,
    pub conditions: Vec<Condition>,
    pub rewards: Vec<Action>,
    pub display_name: String,
    pub description: String,
    pub completion_npc_id: Option<i32>,
    pub show_location: bool,
    pub location: Option<Location>,
    /// Objectives (same quest) that must be completed before this unlocks
    pub dependencies: Vec<i32>,
}

impl Objective {
    pub fn new(id: i32, kind: ObjectiveKind) -> Self {
        Self {
            id,
            kind,
            progress_needed: 1,
            conditions: Vec::new(),
            rewards: Vec::new(),
            display_name: String::new(),
            description: String::new(),
            completion_npc_id: None,
            show_location: false,
            location: None,
            dependencies: Vec::new(),
        }
    }

    pub fn from_raw(id: i32, raw: &RawObjective) -> Result<Self, String> {
        let mut tagged = toml::Table::new();
        tagged.insert("type".to_string(), toml::Value::String(raw.objective_type.clone()));
        tagged.insert("specifics".to_string(), toml::Value::Table(raw.specifics.clone()));

        let kind: ObjectiveKind = toml::Value::Table(tagged)
            .try_into()
            .map_err(|e| format!("Invalid {} objective {}: {}", raw.objective_type, id, e))?;

        let mut conditions = Vec::new();
        for (n, raw_condition) in numbered(&raw.conditions, "condition") {
            match Condition::from_raw(raw_condition) {
                Ok(mut condition) => {
                    condition.objective_id = Some(id);
                    conditions.push(condition);
                }
                Err(e) => warn!("Skipping condition {} of objective {}: {}", n, id, e),
            }
        }

        let mut rewards = Vec::new();
        for (n, raw_action) in numbered(&raw.rewards, "reward") {
            match Action::from_raw(raw_action) {
                Ok(action) => rewards.push(action),
                Err(e) => warn!("Skipping reward {} of objective {}: {}", n, id, e),
            }
        }

        Ok(Self {
            id,
            kind,
            progress_needed: raw.progress_needed.max(1),
            conditions,
            rewards,
            display_name: raw.display_name.clone(),
            description: raw.description.clone(),
            completion_npc_id: raw.completion_npc_id,
            show_location: raw.show_location,
            location: raw.location.clone(),
            dependencies: raw.dependencies.clone(),
        })
    }

    pub fn to_raw(&self) -> RawObjective {
        let specifics = match toml::Value::try_from(&self.kind) {
            Ok(toml::Value::Table(mut table)) => match table.remove("specifics") {
                Some(toml::Value::Table(specifics)) => specifics,
                _ => toml::Table::new(),
            },
            Ok(_) | Err(_) => {
                warn!("Failed to serialize objective {}", self.id);
                toml::Table::new()
            }
        };

        RawObjective {
            objective_type: self.kind.type_name().to_string(),
            specifics,
            progress_needed: self.progress_needed,
            display_name: self.display_name.clone(),
            description: self.description.clone(),
            completion_npc_id: self.completion_npc_id,
            show_location: self.show_location,
            location: self.location.clone(),
            dependencies: self.dependencies.clone(),
            conditions: renumber(self.conditions.iter().map(|c| c.to_raw())),
            rewards: renumber(self.rewards.iter().map(|a| a.to_raw())),
        }
    }

    /// Name shown to players: display name if set, else the task description
    pub fn final_name(&self) -> String {
        if self.display_name.is_empty() {
            self.task_description()
        } else {
            self.display_name.clone()
        }
    }

    pub fn task_description(&self) -> String {
        match &self.kind {
            ObjectiveKind::CraftItems { item_to_craft, craft_any_item } => {
                if *craft_any_item {
                    "Craft any item".to_string()
                } else {
                    format!("Craft: {}", item_to_craft)
                }
            }
            ObjectiveKind::CollectItems { item_to_collect, collect_any_item } => {
                if *collect_any_item {
                    "Collect any item".to_string()
                } else {
                    format!("Collect: {}", item_to_collect)
                }
            }
            ObjectiveKind::TriggerCommand { trigger_name } => format!("Goal: {}", trigger_name),
            ObjectiveKind::Condition { condition, .. } => {
                format!("Fulfill: {}", condition.description_line().trim_start_matches("-- "))
            }
            ObjectiveKind::OtherQuest { other_quest_name, .. } => {
                format!("Complete Quest: {}", other_quest_name)
            }
        }
    }

    pub fn accepts_crafted(&self, item: &str) -> bool {
        match &self.kind {
            ObjectiveKind::CraftItems { item_to_craft, craft_any_item } => {
                *craft_any_item || item_to_craft.eq_ignore_ascii_case(item)
            }
            _ => false,
        }
    }

    pub fn accepts_collected(&self, item: &str) -> bool {
        match &self.kind {
            ObjectiveKind::CollectItems { item_to_collect, collect_any_item } => {
                *collect_any_item || item_to_collect.eq_ignore_ascii_case(item)
            }
            _ => false,
        }
    }

    pub fn trigger_name(&self) -> Option<&str> {
        match &self.kind {
            ObjectiveKind::TriggerCommand { trigger_name } => Some(trigger_name),
            _ => None,
        }
    }

    /// Variable a condition objective listens to
    pub fn listened_variable(&self) -> Option<&str> {
        match &self.kind {
            ObjectiveKind::Condition { condition, .. } => Some(condition.variable_name()),
            _ => None,
        }
    }

    pub fn on_objective_unlock(&self, quest_name: &str, player: Uuid) -> UnlockFollowUp {
        debug!("Objective {} of {} unlocked for {}", self.id, quest_name, player);
        match &self.kind {
            ObjectiveKind::Condition { check_only_when_variable_changes: false, .. } => {
                UnlockFollowUp::CheckCondition
            }
            ObjectiveKind::OtherQuest { other_quest_name, count_previous_completions: true } => {
                UnlockFollowUp::CountCompletions(other_quest_name.clone())
            }
            _ => UnlockFollowUp::Nothing,
        }
    }

    pub fn on_objective_complete_or_lock(&self, quest_name: &str, player: Uuid, completed: bool) {
        if completed {
            debug!("Objective {} of {} completed by {}", self.id, quest_name, player);
        } else {
            debug!("Objective {} of {} locked for {}", self.id, quest_name, player);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use crate::config::IntegrationsConfig;

    #[test]
    fn test_condition_objective_round_trip() {
        let mut objective = Objective::new(
            2,
            ObjectiveKind::Condition {
                condition: Box::new(Condition::new(ConditionKind::QuestPoints {
                    min_quest_points: 50,
                    deduct: false,
                })),
                check_only_when_variable_changes: true,
            },
        );
        objective.progress_needed = 1;
        objective.dependencies = vec![1];
        objective.rewards.push(Action::new(ActionKind::GiveQuestPoints { quest_points_amount: 3 }));
        let mut condition = Condition::new(ConditionKind::Permission {
            required_permission: "quests.vip".to_string(),
        });
        condition.objective_id = Some(2);
        objective.conditions.push(condition);

        let raw = objective.to_raw();
        assert_eq!(raw.objective_type, "Condition");
        assert!(raw.conditions.contains_key("1"));
        assert_eq!(Objective::from_raw(2, &raw).unwrap(), objective);
    }

    #[test]
    fn test_unlock_follow_up() {
        let uuid = Uuid::new_v4();
        let objective = Objective::new(
            1,
            ObjectiveKind::OtherQuest {
                other_quest_name: "Intro".to_string(),
                count_previous_completions: true,
            },
        );
        assert_eq!(
            objective.on_objective_unlock("Q", uuid),
            UnlockFollowUp::CountCompletions("Intro".to_string())
        );

        let craft = Objective::new(
            2,
            ObjectiveKind::CraftItems { item_to_craft: "STONE".to_string(), craft_any_item: false },
        );
        assert_eq!(craft.on_objective_unlock("Q", uuid), UnlockFollowUp::Nothing);
        assert!(craft.accepts_crafted("stone"));
        assert!(!craft.accepts_crafted("dirt"));
    }

    #[test]
    fn test_from_args() {
        let registry = VariableRegistry::with_defaults(&IntegrationsConfig::default());
        let args: Vec<String> = vec!["oak_log".into(), "16".into()];
        let (kind, needed) = ObjectiveKind::from_args("CollectItems", &args, &registry).unwrap();
        assert_eq!(
            kind,
            ObjectiveKind::CollectItems { item_to_collect: "OAK_LOG".to_string(), collect_any_item: false }
        );
        assert_eq!(needed, 16);

        let args: Vec<String> = vec!["QuestPoints".into(), "20".into()];
        let (kind, needed) = ObjectiveKind::from_args("condition", &args, &registry).unwrap();
        assert_eq!(kind.type_name(), "Condition");
        assert_eq!(needed, 1);

        let args: Vec<String> = vec!["any".into(), "0".into()];
        assert!(ObjectiveKind::from_args("CraftItems", &args, &registry).is_err());
        assert!(ObjectiveKind::from_args("Fly", &[], &registry).is_err());
    }
}
