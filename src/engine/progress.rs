//! Objective progress, unlocking and quest completion

use tracing::{debug, info};
use uuid::Uuid;

use super::QuestEngine;
use crate::condition::{deducting_variables, enforce_all};
use crate::objective::{ObjectiveKind, UnlockFollowUp};
use crate::quest::{ProgressResult, ProgressUpdate, QuestEvent, TriggerType};

impl QuestEngine {
    /// Add progress to one objective of one active attempt
    pub fn add_objective_progress(
        &mut self,
        uuid: Uuid,
        active_quest_id: Uuid,
        objective_id: i32,
        amount: i64,
    ) -> Vec<ProgressUpdate> {
        self.advance(uuid, active_quest_id, objective_id, amount)
    }

    /// Route an incoming game event
    pub fn handle_event(&mut self, event: QuestEvent) -> Vec<ProgressUpdate> {
        debug!("Handling {} event for {}", event.event_type(), event.player());
        match event {
            QuestEvent::ItemCrafted { player, item, amount } => self.handle_craft(player, &item, amount),
            QuestEvent::ItemCollected { player, item, amount } => self.handle_collect(player, &item, amount),
            QuestEvent::TriggerFired { player, trigger_name } => self.trigger_objective(&trigger_name, player),
            QuestEvent::Game { player, trigger_type, world, npc_id } => {
                self.handle_trigger_event(player, trigger_type, world.as_deref(), npc_id);
                Vec::new()
            }
        }
    }

    pub fn handle_craft(&mut self, uuid: Uuid, item: &str, amount: i64) -> Vec<ProgressUpdate> {
        let targets = self.unlocked_objectives(uuid, |kind| match kind {
            ObjectiveKind::CraftItems { item_to_craft, craft_any_item } => {
                *craft_any_item || item_to_craft.eq_ignore_ascii_case(item)
            }
            _ => false,
        });
        self.advance_all(uuid, targets, amount)
    }

    pub fn handle_collect(&mut self, uuid: Uuid, item: &str, amount: i64) -> Vec<ProgressUpdate> {
        let targets = self.unlocked_objectives(uuid, |kind| match kind {
            ObjectiveKind::CollectItems { item_to_collect, collect_any_item } => {
                *collect_any_item || item_to_collect.eq_ignore_ascii_case(item)
            }
            _ => false,
        });
        self.advance_all(uuid, targets, amount)
    }

    /// Advance every unlocked TriggerCommand objective with this name by one
    pub fn trigger_objective(&mut self, trigger_name: &str, uuid: Uuid) -> Vec<ProgressUpdate> {
        let targets = self.unlocked_objectives(uuid, |kind| match kind {
            ObjectiveKind::TriggerCommand { trigger_name: name } => name.eq_ignore_ascii_case(trigger_name),
            _ => false,
        });
        self.advance_all(uuid, targets, 1)
    }

    /// (active quest, objective) pairs that are unlocked and match
    fn unlocked_objectives(&self, uuid: Uuid, matches: impl Fn(&ObjectiveKind) -> bool) -> Vec<(Uuid, i32)> {
        let Some(player) = self.players.get(&uuid) else {
            return Vec::new();
        };
        let mut targets = Vec::new();
        for active in &player.active_quests {
            let Some(quest) = self.quests.get(&active.quest_name) else {
                continue;
            };
            for objective in active.objectives.iter().filter(|o| o.is_unlocked()) {
                if quest
                    .get_objective(objective.objective_id)
                    .map(|o| matches(&o.kind))
                    .unwrap_or(false)
                {
                    targets.push((active.id, objective.objective_id));
                }
            }
        }
        targets
    }

    fn advance_all(&mut self, uuid: Uuid, targets: Vec<(Uuid, i32)>, amount: i64) -> Vec<ProgressUpdate> {
        if amount <= 0 {
            debug!("Ignoring non-positive progress amount {} for {}", amount, uuid);
            return Vec::new();
        }
        let mut updates = Vec::new();
        for (active_id, objective_id) in targets {
            updates.extend(self.advance(uuid, active_id, objective_id, amount));
        }
        updates
    }

    /// Core of the state machine: add progress, and when the target is
    /// reached and the objective's conditions pass, complete it.
    pub(super) fn advance(
        &mut self,
        uuid: Uuid,
        active_id: Uuid,
        objective_id: i32,
        amount: i64,
    ) -> Vec<ProgressUpdate> {
        let (quests, ctx, players) = self.split();
        let Some(player) = players.get_mut(&uuid) else {
            return Vec::new();
        };
        let Some(active) = player.active_quest_mut(active_id) else {
            return Vec::new();
        };
        let Some(quest) = quests.get(&active.quest_name) else {
            return Vec::new();
        };
        let Some(objective) = quest.get_objective(objective_id) else {
            return Vec::new();
        };
        let Some(state) = active.objective_mut(objective_id) else {
            return Vec::new();
        };

        let result = state.add_progress(amount);
        let mut update = ProgressUpdate {
            quest_name: quest.name.clone(),
            objective_id,
            progress: state.progress,
            progress_needed: state.progress_needed,
            objective_completed: false,
            quest_completed: false,
        };

        match result {
            ProgressResult::Ignored => return Vec::new(),
            ProgressResult::Progressed => {
                self.dirty.insert(uuid);
                return vec![update];
            }
            ProgressResult::ReachedTarget => {}
        }

        // Target reached: the objective's own conditions decide
        let missing = enforce_all(&objective.conditions, player, &ctx);
        if !missing.is_empty() {
            ctx.host.server.send_message(
                uuid,
                &format!(
                    "You do not fulfill all the conditions this objective needs! Conditions still needed:{}",
                    missing
                ),
            );
            self.dirty.insert(uuid);
            return vec![update];
        }

        let Some(active) = player.active_quest_mut(active_id) else {
            return Vec::new();
        };
        let Some(state) = active.objective_mut(objective_id) else {
            return Vec::new();
        };
        state.mark_completed();
        update.progress = state.progress;
        update.objective_completed = true;
        objective.on_objective_complete_or_lock(&quest.name, uuid, true);

        let unlocked = active.unlock_eligible(quest);
        let quest_done = active.is_complete();
        let rewards = objective.rewards.clone();
        let deducted = deducting_variables(&objective.conditions);
        let quest_name = quest.name.clone();

        self.dirty.insert(uuid);
        self.send_message(
            uuid,
            &format!("You have completed objective {} of {}.", objective_id, quest_name),
        );

        for reward in &rewards {
            self.execute_action(uuid, reward, Some(&quest_name));
        }
        self.fire_lifecycle_triggers(uuid, &quest_name, TriggerType::Complete, objective_id);
        for identifier in deducted {
            self.variable_changed(&identifier);
        }

        let mut updates = Vec::new();
        if quest_done {
            update.quest_completed = self.complete_quest(uuid, active_id);
            updates.push(update);
        } else {
            updates.push(update);
            updates.extend(self.after_unlock(uuid, active_id, &quest_name, unlocked));
        }
        updates
    }

    /// Run unlock hooks and Begin triggers for freshly unlocked objectives
    pub(super) fn after_unlock(
        &mut self,
        uuid: Uuid,
        active_id: Uuid,
        quest_name: &str,
        unlocked: Vec<i32>,
    ) -> Vec<ProgressUpdate> {
        let mut updates = Vec::new();
        for objective_id in unlocked {
            let follow_up = match self.quests.get(quest_name).and_then(|q| q.get_objective(objective_id)) {
                Some(objective) => objective.on_objective_unlock(quest_name, uuid),
                None => continue,
            };
            self.fire_lifecycle_triggers(uuid, quest_name, TriggerType::Begin, objective_id);

            match follow_up {
                UnlockFollowUp::Nothing => {}
                UnlockFollowUp::CheckCondition => {
                    updates.extend(self.check_condition_objective(uuid, active_id, objective_id));
                }
                UnlockFollowUp::CountCompletions(other) => {
                    let completions = self
                        .players
                        .get(&uuid)
                        .map(|p| p.completions_of(&other) as i64)
                        .unwrap_or(0);
                    if completions > 0 {
                        updates.extend(self.advance(uuid, active_id, objective_id, completions));
                    }
                }
            }
        }
        updates
    }

    /// Check a Condition objective once; one unit of progress if it passes
    pub(super) fn check_condition_objective(
        &mut self,
        uuid: Uuid,
        active_id: Uuid,
        objective_id: i32,
    ) -> Vec<ProgressUpdate> {
        let (quests, ctx, players) = self.split();
        let Some(player) = players.get_mut(&uuid) else {
            return Vec::new();
        };
        let Some(active) = player.active_quest(active_id) else {
            return Vec::new();
        };
        if !active.objective(objective_id).map(|o| o.is_unlocked()).unwrap_or(false) {
            return Vec::new();
        }
        let Some(objective) = quests
            .get(&active.quest_name)
            .and_then(|q| q.get_objective(objective_id))
        else {
            return Vec::new();
        };
        let ObjectiveKind::Condition { condition, .. } = &objective.kind else {
            return Vec::new();
        };

        let passed = enforce_all(std::slice::from_ref(&**condition), player, &ctx).is_empty();
        let deducted = condition.deducts().then(|| condition.variable_name().to_string());
        if !passed {
            return Vec::new();
        }
        let updates = self.advance(uuid, active_id, objective_id, 1);
        if let Some(identifier) = deducted {
            self.variable_changed(&identifier);
        }
        updates
    }

    /// Move a finished attempt into the history, then pay out. Returns false
    /// if the attempt no longer exists (already completed or failed).
    pub(super) fn complete_quest(&mut self, uuid: Uuid, active_id: Uuid) -> bool {
        let Some(player) = self.players.get_mut(&uuid) else {
            return false;
        };
        let Some(active) = player.complete_active_quest(active_id) else {
            return false;
        };
        let quest_name = active.quest_name;
        info!("Player {} completed quest {}", uuid, quest_name);
        self.dirty.insert(uuid);

        let (display_name, rewards) = match self.quests.get(&quest_name) {
            Some(quest) => (quest.final_name().to_string(), quest.rewards.clone()),
            None => (quest_name.clone(), Vec::new()),
        };
        self.send_message(uuid, &format!("You have completed the quest {}!", display_name));

        for reward in &rewards {
            self.execute_action(uuid, reward, Some(&quest_name));
        }
        self.fire_lifecycle_triggers(uuid, &quest_name, TriggerType::Complete, 0);

        // Credit OtherQuest objectives waiting for this quest
        let targets = self.unlocked_objectives(uuid, |kind| match kind {
            ObjectiveKind::OtherQuest { other_quest_name, .. } => other_quest_name.eq_ignore_ascii_case(&quest_name),
            _ => false,
        });
        self.advance_all(uuid, targets, 1);

        self.variable_changed("CompletedQuests");
        self.variable_changed("ActiveQuests");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{craft_quest, engine_with};
    use crate::condition::{Condition, ConditionKind};
    use crate::objective::{Objective, ObjectiveKind};
    use crate::quest::definition::Quest;
    use crate::quest::{ObjectiveStatus, QuestEvent};

    #[test]
    fn test_objective_conditions_hold_completion() {
        let mut quest = craft_quest("Gate", 2);
        quest.objectives[0].conditions.push(Condition {
            objective_id: Some(1),
            ..Condition::new(ConditionKind::Permission { required_permission: "gate.open".to_string() })
        });
        let (mut engine, host) = engine_with(vec![quest]);
        let uuid = host.add_player("Steve");
        engine.accept_quest(uuid, "Gate", false, false);

        let updates = engine.handle_craft(uuid, "chest", 5);
        assert_eq!(updates[0].progress, 2);
        assert!(!updates[0].objective_completed);
        assert!(host.messages(uuid).iter().any(|m| m.contains("gate.open")));

        host.with_player(uuid, |p| p.permissions.insert("gate.open".to_string()));
        let updates = engine.handle_craft(uuid, "CHEST", 1);
        assert!(updates[0].objective_completed);
        assert!(updates[0].quest_completed);
    }

    #[test]
    fn test_bad_event_amounts_never_move_progress_back() {
        let (mut engine, host) = engine_with(vec![craft_quest("Chests", 5)]);
        let uuid = host.add_player("Steve");
        engine.accept_quest(uuid, "Chests", false, false);
        assert_eq!(engine.handle_craft(uuid, "CHEST", 3)[0].progress, 3);

        assert!(engine.handle_craft(uuid, "CHEST", -2).is_empty());
        assert!(engine.handle_collect(uuid, "CHEST", 0).is_empty());
        let active = &engine.get_quest_player(uuid).unwrap().active_quests[0];
        assert_eq!(active.objective(1).unwrap().progress, 3);

        let updates = engine.handle_craft(uuid, "CHEST", i64::MAX);
        assert_eq!(updates[0].progress, 5);
        assert!(updates[0].quest_completed);
    }

    #[test]
    fn test_objective_condition_deduction_reaches_listeners() {
        let mut spender = Quest::new("Spender");
        spender.add_objective(Objective::new(
            1,
            ObjectiveKind::TriggerCommand { trigger_name: "pay".to_string() },
        ));
        spender.objectives[0].conditions.push(Condition {
            objective_id: Some(1),
            ..Condition::new(ConditionKind::QuestPoints { min_quest_points: 5, deduct: true })
        });
        let mut watcher = Quest::new("Watcher");
        watcher.add_objective(Objective::new(
            1,
            ObjectiveKind::Condition {
                condition: Box::new(Condition::new(ConditionKind::Number {
                    variable_name: "QuestPoints".to_string(),
                    operator: "lessThan".to_string(),
                    expression: "3".to_string(),
                    additional_strings: Default::default(),
                })),
                check_only_when_variable_changes: true,
            },
        ));
        let (mut engine, host) = engine_with(vec![spender, watcher]);
        let uuid = host.add_player("Steve");
        engine.set_quest_points(uuid, 6);
        engine.accept_quest(uuid, "Watcher", false, false);
        engine.accept_quest(uuid, "Spender", false, false);

        engine.trigger_objective("pay", uuid);

        let player = engine.get_quest_player(uuid).unwrap();
        assert_eq!(player.quest_points, 1);
        assert_eq!(player.completions_of("Spender"), 1);
        assert_eq!(player.completions_of("Watcher"), 1);
    }

    #[test]
    fn test_other_quest_objective_counts_completions() {
        let mut main = Quest::new("Main");
        main.add_objective(Objective::new(
            1,
            ObjectiveKind::OtherQuest { other_quest_name: "Side".to_string(), count_previous_completions: true },
        ));
        main.objectives[0].progress_needed = 2;
        let (mut engine, host) = engine_with(vec![main, Quest::new("Side")]);
        let uuid = host.add_player("Steve");

        // One completion before Main is accepted
        engine.accept_quest(uuid, "Side", false, false);
        engine.accept_quest(uuid, "Main", false, false);
        let active = &engine.get_quest_player(uuid).unwrap().active_quests[0];
        assert_eq!(active.objective(1).unwrap().progress, 1);

        engine.accept_quest(uuid, "Side", false, false);
        assert_eq!(engine.get_quest_player(uuid).unwrap().completions_of("Main"), 1);
    }

    #[test]
    fn test_events_route_to_matching_objectives() {
        let mut quest = Quest::new("Gatherer");
        quest.add_objective(Objective::new(
            1,
            ObjectiveKind::CollectItems { item_to_collect: "OAK_LOG".to_string(), collect_any_item: false },
        ));
        quest.objectives[0].progress_needed = 10;
        let (mut engine, host) = engine_with(vec![quest]);
        let uuid = host.add_player("Steve");
        engine.accept_quest(uuid, "Gatherer", false, false);

        let updates = engine.handle_event(QuestEvent::ItemCollected { player: uuid, item: "dirt".to_string(), amount: 3 });
        assert!(updates.is_empty());
        // Crafting does not count as collecting
        let updates = engine.handle_event(QuestEvent::ItemCrafted { player: uuid, item: "OAK_LOG".to_string(), amount: 3 });
        assert!(updates.is_empty());

        let updates = engine.handle_event(QuestEvent::ItemCollected { player: uuid, item: "oak_log".to_string(), amount: 4 });
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].progress, 4);
        let active = &engine.get_quest_player(uuid).unwrap().active_quests[0];
        assert_eq!(active.objective(1).unwrap().status, ObjectiveStatus::Unlocked);
    }
}
