//! Quest acceptance, failing and forced completion

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::QuestEngine;
use crate::condition::{deducting_variables, enforce_all};
use crate::quest::{ActiveObjective, ActiveQuest, Quest, QuestPlayer, TriggerType};

impl QuestEngine {
    /// Try to start a new attempt of a quest. All-or-nothing: on any failure
    /// nothing is created and nothing is deducted.
    pub fn accept_quest(
        &mut self,
        uuid: Uuid,
        quest_name: &str,
        bypass_checks: bool,
        bypass_cooldown: bool,
    ) -> String {
        let (quests, ctx, players) = self.split();
        let Some(quest) = quests.get(quest_name) else {
            return format!("Quest {} does not exist", quest_name);
        };
        let player = players.entry(uuid).or_insert_with(|| QuestPlayer::new(uuid));

        if !bypass_checks {
            if !quest.take_enabled {
                return format!("The quest {} cannot be taken.", quest.final_name());
            }

            if quest.max_accepts > -1 {
                let accepted = player.completions_of(&quest.name) + player.active_count_of(&quest.name);
                if accepted >= quest.max_accepts as usize {
                    return format!(
                        "You have reached the maximum amount of accepts ({}) for the quest {}.",
                        quest.max_accepts,
                        quest.final_name()
                    );
                }
            }

            if !bypass_cooldown && quest.accept_cooldown > 0 {
                if let Some(last) = player.last_accepted_at(&quest.name) {
                    let elapsed = (Utc::now() - last).num_minutes();
                    if elapsed < quest.accept_cooldown {
                        return format!(
                            "You have to wait {} more minutes before accepting the quest {} again.",
                            quest.accept_cooldown - elapsed,
                            quest.final_name()
                        );
                    }
                }
            }

            let missing = enforce_all(&quest.requirements, player, &ctx);
            if !missing.is_empty() {
                return format!(
                    "You do not fulfill all the requirements this quest needs! Requirement still needed:{}",
                    missing
                );
            }
        }

        let mut active = ActiveQuest::new(
            &quest.name,
            quest
                .objectives
                .iter()
                .map(|o| ActiveObjective::new(o.id, o.progress_needed))
                .collect(),
        );
        let unlocked = active.unlock_eligible(quest);
        let active_id = active.id;
        let canonical_name = quest.name.clone();
        let display_name = quest.final_name().to_string();
        let deducted = if bypass_checks {
            Vec::new()
        } else {
            deducting_variables(&quest.requirements)
        };

        player.active_quests.push(active);
        player.record_acceptance(&canonical_name, Utc::now());

        info!("Player {} accepted quest {}", uuid, canonical_name);
        self.dirty.insert(uuid);

        self.fire_lifecycle_triggers(uuid, &canonical_name, TriggerType::Begin, 0);
        self.after_unlock(uuid, active_id, &canonical_name, unlocked);

        // A quest without objectives is done as soon as it starts
        let finished_immediately = self
            .players
            .get(&uuid)
            .and_then(|p| p.active_quest(active_id))
            .map(|a| a.is_complete())
            .unwrap_or(false);
        if finished_immediately {
            self.complete_quest(uuid, active_id);
        }

        for identifier in deducted {
            self.variable_changed(&identifier);
        }
        self.variable_changed("ActiveQuests");

        format!("You have successfully accepted the Quest {}.", display_name)
    }

    /// Accept bypassing max accepts, cooldown and requirements
    pub fn force_accept_quest(&mut self, uuid: Uuid, quest_name: &str) -> String {
        self.accept_quest(uuid, quest_name, true, true)
    }

    /// Player-initiated acceptance (`/nq take`)
    pub fn take_quest(&mut self, uuid: Uuid, quest_name: &str) -> String {
        if !self.host.server.is_online(uuid) {
            return "You need to be online to take a quest.".to_string();
        }
        let result = self.accept_quest(uuid, quest_name, false, false);
        self.send_message(uuid, &result);
        result
    }

    /// Fail every active attempt of a quest. Returns false if there was none.
    pub fn fail_quest(&mut self, uuid: Uuid, quest_name: &str) -> bool {
        let Some(player) = self.players.get_mut(&uuid) else {
            return false;
        };
        let ids = player.active_ids_of(quest_name);
        if ids.is_empty() {
            return false;
        }
        let mut canonical = quest_name.to_string();
        for id in ids {
            if let Some(active) = player.remove_active_quest(id) {
                canonical = active.quest_name;
            }
        }

        info!("Player {} failed quest {}", uuid, canonical);
        self.dirty.insert(uuid);
        self.send_message(uuid, &format!("You have failed the quest {}.", canonical));
        self.fire_lifecycle_triggers(uuid, &canonical, TriggerType::Fail, 0);
        self.variable_changed("ActiveQuests");
        true
    }

    /// Player gives up on a quest
    pub fn abort_quest(&mut self, uuid: Uuid, quest_name: &str) -> String {
        let canonical = self
            .quests
            .get(quest_name)
            .map(|q| q.name.clone())
            .unwrap_or_else(|| quest_name.to_string());
        if self.fail_quest(uuid, quest_name) {
            format!("The quest {} has been aborted.", canonical)
        } else {
            format!("You do not have the quest {} active.", canonical)
        }
    }

    /// Complete the oldest active attempt of a quest regardless of progress.
    /// Objective rewards are skipped; quest rewards and triggers run.
    pub fn force_active_quest_completed(&mut self, uuid: Uuid, quest_name: &str) -> bool {
        let (quests, _, players) = self.split();
        let Some(player) = players.get_mut(&uuid) else {
            return false;
        };
        let Some(active) = player
            .active_quests
            .iter_mut()
            .find(|a| a.quest_name.eq_ignore_ascii_case(quest_name))
        else {
            return false;
        };
        complete_remaining_objectives(quests.get(&active.quest_name), active, uuid);
        let active_id = active.id;
        self.complete_quest(uuid, active_id)
    }

    /// Remove all traces of a quest from every player: active attempts,
    /// completion history and cooldowns. With `fail`, Fail triggers run for
    /// players who had it active. Returns the number of players touched.
    pub fn reset_quest_for_all_players(&mut self, quest_name: &str, fail: bool) -> usize {
        let key = quest_name.to_lowercase();
        let mut touched = Vec::new();
        let mut failed = Vec::new();

        for player in self.players.values_mut() {
            let had_active = player.has_active_quest(quest_name);
            let before = player.active_quests.len() + player.completed_quests.len();
            player
                .active_quests
                .retain(|a| !a.quest_name.eq_ignore_ascii_case(quest_name));
            player
                .completed_quests
                .retain(|c| !c.quest_name.eq_ignore_ascii_case(quest_name));
            let cooldown_removed = player.last_accepted.remove(&key).is_some();

            if before != player.active_quests.len() + player.completed_quests.len() || cooldown_removed {
                touched.push(player.uuid);
            }
            if had_active && fail {
                failed.push(player.uuid);
            }
        }

        for uuid in &touched {
            self.dirty.insert(*uuid);
        }
        for uuid in failed {
            self.fire_lifecycle_triggers(uuid, quest_name, TriggerType::Fail, 0);
        }
        if !touched.is_empty() {
            info!("Reset quest {} for {} players", quest_name, touched.len());
            self.variable_changed("ActiveQuests");
            self.variable_changed("CompletedQuests");
        }
        touched.len()
    }
}

/// Mark every unfinished objective completed, running the completion hook
/// for each. Returns the ids that were not completed before.
fn complete_remaining_objectives(quest: Option<&Quest>, active: &mut ActiveQuest, uuid: Uuid) -> Vec<i32> {
    let mut finished = Vec::new();
    for state in active.objectives.iter_mut().filter(|o| !o.is_completed()) {
        state.mark_completed();
        if let Some(objective) = quest.and_then(|q| q.get_objective(state.objective_id)) {
            objective.on_objective_complete_or_lock(&active.quest_name, uuid, true);
        }
        finished.push(state.objective_id);
    }
    finished
}

#[cfg(test)]
mod tests {
    use super::super::tests::{craft_quest, engine_with};
    use crate::quest::definition::Quest;

    #[test]
    fn test_unknown_quest() {
        let (mut engine, host) = engine_with(vec![]);
        let uuid = host.add_player("Steve");
        assert_eq!(engine.accept_quest(uuid, "Nope", false, false), "Quest Nope does not exist");
        assert!(engine.get_quest_player(uuid).is_none());
    }

    #[test]
    fn test_take_disabled_only_bypassed_by_force() {
        let mut quest = craft_quest("Secret", 1);
        quest.take_enabled = false;
        let (mut engine, host) = engine_with(vec![quest]);
        let uuid = host.add_player("Steve");

        let result = engine.take_quest(uuid, "Secret");
        assert!(result.contains("cannot be taken"), "{}", result);
        assert!(host.messages(uuid).iter().any(|m| m.contains("cannot be taken")));

        let result = engine.force_accept_quest(uuid, "secret");
        assert!(result.contains("accepted"), "{}", result);
    }

    #[test]
    fn test_cooldown_blocks_reaccept() {
        let mut quest = craft_quest("Daily", 1);
        quest.accept_cooldown = 60;
        let (mut engine, host) = engine_with(vec![quest]);
        let uuid = host.add_player("Steve");

        engine.accept_quest(uuid, "Daily", false, false);
        assert!(engine.fail_quest(uuid, "Daily"));

        let result = engine.accept_quest(uuid, "Daily", false, false);
        assert!(result.contains("wait"), "{}", result);

        let result = engine.accept_quest(uuid, "Daily", false, true);
        assert!(result.contains("accepted"), "{}", result);
    }

    #[test]
    fn test_empty_quest_completes_on_accept() {
        let (mut engine, host) = engine_with(vec![Quest::new("Hello")]);
        let uuid = host.add_player("Steve");
        engine.accept_quest(uuid, "Hello", false, false);
        let player = engine.get_quest_player(uuid).unwrap();
        assert!(player.active_quests.is_empty());
        assert_eq!(player.completions_of("Hello"), 1);
    }

    #[test]
    fn test_force_complete_and_abort() {
        let (mut engine, host) = engine_with(vec![craft_quest("A", 5), craft_quest("B", 5)]);
        let uuid = host.add_player("Steve");
        engine.accept_quest(uuid, "A", false, false);
        engine.accept_quest(uuid, "B", false, false);

        assert!(engine.force_active_quest_completed(uuid, "a"));
        assert!(!engine.force_active_quest_completed(uuid, "a"));
        // Objective rewards are skipped
        assert_eq!(engine.get_quest_player(uuid).unwrap().quest_points, 0);

        assert!(engine.abort_quest(uuid, "B").contains("aborted"));
        assert!(engine.abort_quest(uuid, "B").contains("do not have"));
        let player = engine.get_quest_player(uuid).unwrap();
        assert_eq!(player.completions_of("A"), 1);
        assert_eq!(player.completions_of("B"), 0);
    }

    #[test]
    fn test_force_complete_finishes_only_open_objectives() {
        let mut quest = craft_quest("Pair", 1);
        quest.add_objective(crate::objective::Objective::new(
            2,
            crate::objective::ObjectiveKind::TriggerCommand { trigger_name: "go".to_string() },
        ));
        let mut active = crate::quest::ActiveQuest::new(
            "Pair",
            vec![
                crate::quest::ActiveObjective::new(1, 1),
                crate::quest::ActiveObjective::new(2, 3),
            ],
        );
        active.unlock_eligible(&quest);
        active.objective_mut(1).unwrap().mark_completed();

        let finished = super::complete_remaining_objectives(Some(&quest), &mut active, uuid::Uuid::new_v4());
        assert_eq!(finished, vec![2]);
        assert!(active.is_complete());
        assert_eq!(active.objective(2).unwrap().progress, 3);
    }

    #[test]
    fn test_reset_quest_for_all_players() {
        let mut quest = craft_quest("Once", 1);
        quest.max_accepts = 1;
        let (mut engine, host) = engine_with(vec![quest]);
        let steve = host.add_player("Steve");
        let alex = host.add_player("Alex");
        engine.accept_quest(steve, "Once", false, false);
        engine.accept_quest(alex, "Once", false, false);
        engine.force_active_quest_completed(alex, "Once");

        assert_eq!(engine.reset_quest_for_all_players("once", false), 2);
        let result = engine.accept_quest(alex, "Once", false, false);
        assert!(result.contains("accepted"), "{}", result);
        assert!(engine.get_quest_player(steve).unwrap().active_quests.is_empty());
    }
}
