//! Entry points for an external quest engine (events and conditions)

use uuid::Uuid;

use super::QuestEngine;
use crate::condition::{Condition, ConditionKind};
use crate::error::{QuestError, Result};
use crate::quest::{ProgressUpdate, QuestPlayer};

impl QuestEngine {
    /// External event: fire a TriggerCommand objective
    pub fn bridge_trigger(&mut self, uuid: Uuid, trigger_name: &str) -> Result<Vec<ProgressUpdate>> {
        if !self.host.server.is_online(uuid) {
            return Err(QuestError::PlayerNotFound(uuid.to_string()));
        }
        if !self.quests.trigger_name_exists(trigger_name) {
            return Err(QuestError::Other(format!(
                "No TriggerCommand objective uses the trigger name {}",
                trigger_name
            )));
        }
        Ok(self.trigger_objective(trigger_name, uuid))
    }

    /// External condition, e.g. `"QuestPoints 10"` or `"OtherQuest Intro 2"`.
    /// Evaluated without deducting anything.
    pub fn bridge_requirement(&self, uuid: Uuid, instruction: &str) -> Result<bool> {
        let mut parts = instruction.split_whitespace();
        let Some(condition_type) = parts.next() else {
            return Err(QuestError::Other("Empty requirement instruction".to_string()));
        };
        let args: Vec<String> = parts.map(|s| s.to_string()).collect();

        let kind = match condition_type.to_lowercase().as_str() {
            "otherquest" | "questpoints" | "money" | "permission" => {
                ConditionKind::from_args(condition_type, &args, &self.variables).map_err(QuestError::Other)?
            }
            _ => {
                return Err(QuestError::Other(format!(
                    "Unknown requirement type {}",
                    condition_type
                )));
            }
        };
        if let ConditionKind::OtherQuest { other_quest_name, .. } = &kind {
            if !self.quests.contains(other_quest_name) {
                return Err(QuestError::QuestNotFound(other_quest_name.clone()));
            }
        }
        if matches!(kind, ConditionKind::Money { .. }) && self.host.economy.is_none() {
            return Err(QuestError::Other(
                "The server does not have an economy plugin enabled".to_string(),
            ));
        }

        let condition = Condition::new(kind);
        let mut player = self
            .players
            .get(&uuid)
            .cloned()
            .unwrap_or_else(|| QuestPlayer::new(uuid));
        Ok(condition.check(&mut player, &self.ctx(), false).is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::engine_with;
    use crate::objective::{Objective, ObjectiveKind};
    use crate::quest::definition::Quest;

    #[test]
    fn test_bridge_trigger_rejects_unknown_names() {
        let mut quest = Quest::new("Button");
        quest.add_objective(Objective::new(1, ObjectiveKind::TriggerCommand { trigger_name: "press".to_string() }));
        let (mut engine, host) = engine_with(vec![quest]);
        let uuid = host.add_player("Steve");
        engine.accept_quest(uuid, "Button", false, false);

        assert!(engine.bridge_trigger(uuid, "unknown").is_err());
        assert!(matches!(
            engine.bridge_trigger(uuid::Uuid::new_v4(), "press"),
            Err(crate::error::QuestError::PlayerNotFound(_))
        ));
        let updates = engine.bridge_trigger(uuid, "PRESS").unwrap();
        assert!(updates[0].quest_completed);
    }

    #[test]
    fn test_bridge_requirements() {
        let (mut engine, host) = engine_with(vec![Quest::new("Intro")]);
        let uuid = host.add_player("Steve");
        engine.set_quest_points(uuid, 10);

        assert!(engine.bridge_requirement(uuid, "QuestPoints 10").unwrap());
        assert!(!engine.bridge_requirement(uuid, "QuestPoints 11").unwrap());
        assert!(!engine.bridge_requirement(uuid, "OtherQuest Intro 1").unwrap());
        engine.accept_quest(uuid, "Intro", false, false);
        assert!(engine.bridge_requirement(uuid, "OtherQuest Intro 1").unwrap());

        assert!(engine.bridge_requirement(uuid, "QuestPoints lots").is_err());
        assert!(engine.bridge_requirement(uuid, "Teleport 1 2 3").is_err());
        assert!(engine.bridge_requirement(uuid, "").is_err());
        assert!(matches!(
            engine.bridge_requirement(uuid, "OtherQuest Missing 1"),
            Err(crate::error::QuestError::QuestNotFound(_))
        ));
        // Checking never deducts
        assert!(engine.bridge_requirement(uuid, "QuestPoints 10 deduct").unwrap());
        assert_eq!(engine.get_quest_player(uuid).unwrap().quest_points, 10);
    }
}
