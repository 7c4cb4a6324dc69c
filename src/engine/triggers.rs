//! Quest triggers: named actions bound to lifecycle and world events

use tracing::debug;
use uuid::Uuid;

use super::QuestEngine;
use crate::quest::TriggerType;

impl QuestEngine {
    /// Run Begin / Complete / Fail triggers of a quest for one scope
    /// (`apply_on` 0 = quest, n = objective n)
    pub(super) fn fire_lifecycle_triggers(
        &mut self,
        uuid: Uuid,
        quest_name: &str,
        trigger_type: TriggerType,
        apply_on: i32,
    ) {
        let Some(quest) = self.quests.get(quest_name) else {
            return;
        };
        let actions: Vec<String> = quest
            .triggers
            .iter()
            .filter(|t| t.trigger_type == trigger_type && t.apply_on == apply_on)
            .map(|t| t.action_name.clone())
            .collect();
        let quest_name = quest.name.clone();

        for action_name in actions {
            debug!("{} trigger of {} runs {}", trigger_type.as_str(), quest_name, action_name);
            self.execute_named_action(uuid, &action_name, Some(&quest_name));
        }
    }

    /// Count a world event against the triggers of every active quest and
    /// run the action each time a trigger's `amount_needed` is reached
    pub fn handle_trigger_event(
        &mut self,
        uuid: Uuid,
        trigger_type: TriggerType,
        world: Option<&str>,
        npc_id: Option<i32>,
    ) {
        if trigger_type.is_lifecycle() {
            debug!("Ignoring externally sent {} trigger", trigger_type.as_str());
            return;
        }

        let quests = &self.quests;
        let Some(player) = self.players.get_mut(&uuid) else {
            return;
        };

        let mut fired = Vec::new();
        for active in &mut player.active_quests {
            let Some(quest) = quests.get(&active.quest_name) else {
                continue;
            };
            for (index, trigger) in quest.triggers.iter().enumerate() {
                if trigger.trigger_type != trigger_type {
                    continue;
                }
                if let Some(wanted) = &trigger.world_name {
                    let any_world = wanted.eq_ignore_ascii_case("ALL");
                    if !any_world && !world.map(|w| w.eq_ignore_ascii_case(wanted)).unwrap_or(false) {
                        continue;
                    }
                }
                if trigger_type == TriggerType::NpcDeath && trigger.npc_id.is_some() && trigger.npc_id != npc_id {
                    continue;
                }
                if trigger.apply_on != 0
                    && !active
                        .objective(trigger.apply_on)
                        .map(|o| o.is_unlocked())
                        .unwrap_or(false)
                {
                    continue;
                }

                let count = active.trigger_progress.entry(index).or_insert(0);
                *count += 1;
                if *count % trigger.amount_needed.max(1) == 0 {
                    fired.push((quest.name.clone(), trigger.action_name.clone()));
                }
            }
        }

        if !fired.is_empty() {
            self.dirty.insert(uuid);
        }
        for (quest_name, action_name) in fired {
            debug!("{} trigger of {} runs {}", trigger_type.as_str(), quest_name, action_name);
            self.execute_named_action(uuid, &action_name, Some(&quest_name));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{craft_quest, engine_with};
    use crate::action::{Action, ActionKind};
    use crate::quest::{Trigger, TriggerType};

    fn console(command: &str) -> Action {
        Action::new(ActionKind::ConsoleCommand { console_command: command.to_string() })
    }

    #[test]
    fn test_death_trigger_needs_amount_in_world() {
        let mut quest = craft_quest("Careful", 1);
        let mut trigger = Trigger::new(TriggerType::Death, "punish");
        trigger.amount_needed = 2;
        trigger.world_name = Some("nether".to_string());
        quest.triggers.push(trigger);
        let (mut engine, host) = engine_with(vec![quest]);
        engine.actions_mut().insert("punish", console("say {PLAYER} died in {QUEST}"));
        let uuid = host.add_player("Steve");
        engine.accept_quest(uuid, "Careful", false, false);

        engine.handle_trigger_event(uuid, TriggerType::Death, Some("world"), None);
        engine.handle_trigger_event(uuid, TriggerType::Death, Some("nether"), None);
        assert!(host.console_commands().is_empty());
        engine.handle_trigger_event(uuid, TriggerType::Death, Some("NETHER"), None);
        assert_eq!(host.console_commands(), vec!["say Steve died in Careful".to_string()]);
    }

    #[test]
    fn test_begin_and_complete_triggers() {
        let mut quest = craft_quest("Lifecycle", 1);
        quest.triggers.push(Trigger::new(TriggerType::Begin, "start"));
        let mut objective_done = Trigger::new(TriggerType::Complete, "objective");
        objective_done.apply_on = 1;
        quest.triggers.push(objective_done);
        quest.triggers.push(Trigger::new(TriggerType::Complete, "finish"));
        let (mut engine, host) = engine_with(vec![quest]);
        engine.actions_mut().insert("start", console("start"));
        engine.actions_mut().insert("objective", console("objective"));
        engine.actions_mut().insert("finish", console("finish"));
        let uuid = host.add_player("Steve");

        engine.accept_quest(uuid, "Lifecycle", false, false);
        engine.handle_craft(uuid, "CHEST", 1);
        assert_eq!(host.console_commands(), vec!["start", "objective", "finish"]);
    }

    #[test]
    fn test_objective_scoped_trigger_needs_unlocked_objective() {
        let mut quest = craft_quest("Scoped", 1);
        let mut trigger = Trigger::new(TriggerType::WorldEnter, "greet");
        trigger.apply_on = 1;
        quest.triggers.push(trigger);
        let (mut engine, host) = engine_with(vec![quest.clone()]);
        engine.actions_mut().insert("greet", console("greet"));
        let uuid = host.add_player("Steve");

        engine.handle_trigger_event(uuid, TriggerType::WorldEnter, Some("world"), None);
        assert!(host.console_commands().is_empty());

        engine.accept_quest(uuid, "Scoped", false, false);
        engine.handle_trigger_event(uuid, TriggerType::WorldEnter, Some("world"), None);
        assert_eq!(host.console_commands().len(), 1);
    }
}
