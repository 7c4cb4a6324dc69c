//! Variable access and change propagation

use tracing::{debug, warn};
use uuid::Uuid;

use super::{QuestEngine, MAX_PROPAGATION_ROUNDS};
use crate::error::{QuestError, Result};
use crate::objective::ObjectiveKind;
use crate::quest::QuestPlayer;
use crate::variable::{VariableArgs, VariableValue};

impl QuestEngine {
    /// Read a variable for a player. Players without quest state read as a
    /// fresh player.
    pub fn get_variable(&self, uuid: Uuid, identifier: &str, args: &VariableArgs) -> Option<VariableValue> {
        let ctx = self.ctx();
        match self.players.get(&uuid) {
            Some(player) => ctx.get_value(identifier, player, args),
            None => ctx.get_value(identifier, &QuestPlayer::new(uuid), args),
        }
    }

    /// Write a variable and propagate the change. False if the variable is
    /// unknown, read-only or rejected the value.
    pub fn set_variable(&mut self, uuid: Uuid, identifier: &str, value: VariableValue, args: &VariableArgs) -> bool {
        let Some(variable) = self.variables.lookup(identifier) else {
            return false;
        };
        if !variable.can_set_value() {
            return false;
        }
        let canonical = self
            .variables
            .canonical(identifier)
            .unwrap_or(identifier)
            .to_string();

        let (_, ctx, players) = self.split();
        let player = players.entry(uuid).or_insert_with(|| QuestPlayer::new(uuid));
        if !variable.set_value_internally(&ctx, &value, player, args) {
            debug!("Variable {} rejected value {:?} for {}", canonical, value, uuid);
            return false;
        }

        self.dirty.insert(uuid);
        self.variable_changed(&canonical);
        true
    }

    /// Evaluate an arithmetic expression for a player
    pub fn evaluate_expression(&self, expression: &str, uuid: Uuid, args: &VariableArgs) -> Result<f64> {
        let ctx = self.ctx();
        match self.players.get(&uuid) {
            Some(player) => ctx.evaluate(expression, player, args),
            None => ctx.evaluate(expression, &QuestPlayer::new(uuid), args),
        }
    }

    /// Look up a variable by identifier, failing with a readable error
    pub fn require_variable(&self, identifier: &str) -> Result<String> {
        self.variables
            .canonical(identifier)
            .map(|s| s.to_string())
            .ok_or_else(|| QuestError::Other(format!("Variable {} does not exist", identifier)))
    }

    /// Re-check Condition objectives listening to a changed variable.
    ///
    /// Changes made while a pass is running are queued and handled as
    /// further rounds of the outermost call, up to `MAX_PROPAGATION_ROUNDS`.
    pub fn variable_changed(&mut self, identifier: &str) {
        if !self
            .propagation
            .queued
            .iter()
            .any(|queued| queued.eq_ignore_ascii_case(identifier))
        {
            self.propagation.queued.push_back(identifier.to_string());
        }
        if self.propagation.running {
            return;
        }

        self.propagation.running = true;
        let mut rounds = 0;
        while !self.propagation.queued.is_empty() {
            if rounds == MAX_PROPAGATION_ROUNDS {
                warn!(
                    "Variable change propagation stopped after {} rounds, dropping {:?}",
                    MAX_PROPAGATION_ROUNDS, self.propagation.queued
                );
                self.propagation.queued.clear();
                break;
            }
            rounds += 1;

            let batch: Vec<String> = self.propagation.queued.drain(..).collect();
            for changed in batch {
                self.recheck_condition_objectives(&changed);
            }
        }
        self.propagation.running = false;
    }

    /// Every unlocked Condition objective, across all players, whose
    /// condition reads `identifier`
    fn recheck_condition_objectives(&mut self, identifier: &str) {
        let mut targets = Vec::new();
        for player in self.players.values() {
            for active in &player.active_quests {
                let Some(quest) = self.quests.get(&active.quest_name) else {
                    continue;
                };
                for state in active.objectives.iter().filter(|o| o.is_unlocked()) {
                    let listens = quest
                        .get_objective(state.objective_id)
                        .map(|objective| {
                            matches!(objective.kind, ObjectiveKind::Condition { .. })
                                && objective
                                    .listened_variable()
                                    .map(|v| v.eq_ignore_ascii_case(identifier))
                                    .unwrap_or(false)
                        })
                        .unwrap_or(false);
                    if listens {
                        targets.push((player.uuid, active.id, state.objective_id));
                    }
                }
            }
        }

        if !targets.is_empty() {
            debug!("{} changed, re-checking {} condition objectives", identifier, targets.len());
        }
        for (uuid, active_id, objective_id) in targets {
            self.check_condition_objective(uuid, active_id, objective_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::engine_with;
    use crate::action::{Action, ActionKind};
    use crate::condition::{Condition, ConditionKind};
    use crate::objective::{Objective, ObjectiveKind};
    use crate::quest::definition::Quest;
    use crate::variable::{VariableArgs, VariableValue};

    fn points_step(name: &str, min: i64) -> Quest {
        let mut quest = Quest::new(name);
        let mut objective = Objective::new(
            1,
            ObjectiveKind::Condition {
                condition: Box::new(Condition::new(ConditionKind::QuestPoints {
                    min_quest_points: min,
                    deduct: false,
                })),
                check_only_when_variable_changes: true,
            },
        );
        objective
            .rewards
            .push(Action::new(ActionKind::GiveQuestPoints { quest_points_amount: 1 }));
        quest.add_objective(objective);
        quest
    }

    #[test]
    fn test_cascade_is_cut_after_max_rounds() {
        let quests: Vec<Quest> = (1..=10).map(|i| points_step(&format!("Step{}", i), i)).collect();
        let (mut engine, host) = engine_with(quests);
        let uuid = host.add_player("Steve");
        // Later steps first, so each round can only complete one step
        for i in (1..=10).rev() {
            engine.accept_quest(uuid, &format!("Step{}", i), false, false);
        }

        engine.add_quest_points(uuid, 1);

        let player = engine.get_quest_player(uuid).unwrap();
        for i in 1..=8 {
            assert_eq!(player.completions_of(&format!("Step{}", i)), 1, "Step{}", i);
        }
        assert_eq!(player.completions_of("Step9"), 0);
        assert_eq!(player.completions_of("Step10"), 0);
        assert_eq!(player.quest_points, 9);
    }

    #[test]
    fn test_read_only_variable_cannot_be_set() {
        let (mut engine, host) = engine_with(vec![]);
        let uuid = host.add_player("Steve");
        let args = VariableArgs::default();
        assert!(!engine.set_variable(uuid, "ActiveQuests", VariableValue::List(vec![]), &args));
        assert!(!engine.set_variable(uuid, "DoesNotExist", VariableValue::Number(1.0), &args));
        assert!(engine.set_variable(uuid, "questpoints", VariableValue::Number(12.0), &args));
        assert_eq!(engine.get_variable(uuid, "QuestPoints", &args), Some(VariableValue::Number(12.0)));
    }

    #[test]
    fn test_evaluate_expression_uses_player_state() {
        let (mut engine, host) = engine_with(vec![]);
        let uuid = host.add_player("Steve");
        engine.set_quest_points(uuid, 7);
        let args = VariableArgs::default();
        assert_eq!(engine.evaluate_expression("QuestPoints * 2 + 1", uuid, &args).unwrap(), 15.0);
        assert!(engine.evaluate_expression("QuestPoints +", uuid, &args).is_err());
    }
}
