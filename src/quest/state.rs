//! Quest State Tracking
//!
//! Per-player runtime state: active quest attempts, objective progress and
//! completion history.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::definition::Quest;

/// Lifecycle of a single objective inside an active quest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectiveStatus {
    Locked,
    Unlocked,
    Completed,
}

impl ObjectiveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectiveStatus::Locked => "locked",
            ObjectiveStatus::Unlocked => "unlocked",
            ObjectiveStatus::Completed => "completed",
        }
    }
}

/// Result of adding progress to an objective
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressResult {
    /// Objective is locked or already completed
    Ignored,
    /// Counter moved but the target is not reached
    Progressed,
    /// Counter is at the target; completion still depends on conditions
    ReachedTarget,
}

/// Progress on a single objective
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveObjective {
    pub objective_id: i32,
    pub progress: i64,
    pub progress_needed: i64,
    pub status: ObjectiveStatus,
}

impl ActiveObjective {
    pub fn new(objective_id: i32, progress_needed: i64) -> Self {
        Self {
            objective_id,
            progress: 0,
            progress_needed: progress_needed.max(1),
            status: ObjectiveStatus::Locked,
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.status == ObjectiveStatus::Unlocked
    }

    pub fn is_completed(&self) -> bool {
        self.status == ObjectiveStatus::Completed
    }

    /// Add progress, capped at `progress_needed`. The counter only moves
    /// forward, so non-positive amounts are ignored.
    pub fn add_progress(&mut self, amount: i64) -> ProgressResult {
        if self.status != ObjectiveStatus::Unlocked || amount <= 0 {
            return ProgressResult::Ignored;
        }
        self.progress = self.progress.saturating_add(amount).min(self.progress_needed);
        if self.progress >= self.progress_needed {
            ProgressResult::ReachedTarget
        } else {
            ProgressResult::Progressed
        }
    }

    /// Returns true if the objective was locked before
    pub fn unlock(&mut self) -> bool {
        if self.status == ObjectiveStatus::Locked {
            self.status = ObjectiveStatus::Unlocked;
            true
        } else {
            false
        }
    }

    pub fn mark_completed(&mut self) {
        self.progress = self.progress_needed;
        self.status = ObjectiveStatus::Completed;
    }

    pub fn progress_percent(&self) -> f32 {
        if self.progress_needed == 0 {
            return 1.0;
        }
        self.progress as f32 / self.progress_needed as f32
    }
}

/// One player's in-progress attempt at a quest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveQuest {
    pub id: Uuid,
    pub quest_name: String,
    pub accepted_at: DateTime<Utc>,
    /// Mirrors the quest's objective list at acceptance time
    pub objectives: Vec<ActiveObjective>,
    /// Trigger index -> how often it fired
    #[serde(default)]
    pub trigger_progress: BTreeMap<usize, i64>,
}

impl ActiveQuest {
    pub fn new(quest_name: &str, objectives: Vec<ActiveObjective>) -> Self {
        Self {
            id: Uuid::new_v4(),
            quest_name: quest_name.to_string(),
            accepted_at: Utc::now(),
            objectives,
            trigger_progress: BTreeMap::new(),
        }
    }

    pub fn objective(&self, objective_id: i32) -> Option<&ActiveObjective> {
        self.objectives.iter().find(|o| o.objective_id == objective_id)
    }

    pub fn objective_mut(&mut self, objective_id: i32) -> Option<&mut ActiveObjective> {
        self.objectives
            .iter_mut()
            .find(|o| o.objective_id == objective_id)
    }

    /// All objectives completed
    pub fn is_complete(&self) -> bool {
        self.objectives.iter().all(|o| o.is_completed())
    }

    pub fn completed_count(&self) -> usize {
        self.objectives.iter().filter(|o| o.is_completed()).count()
    }

    /// Unlock every locked objective whose dependencies are all completed.
    /// Returns the IDs that were unlocked by this call.
    pub fn unlock_eligible(&mut self, quest: &Quest) -> Vec<i32> {
        let completed: BTreeSet<i32> = self
            .objectives
            .iter()
            .filter(|o| o.is_completed())
            .map(|o| o.objective_id)
            .collect();
        let present: BTreeSet<i32> = self.objectives.iter().map(|o| o.objective_id).collect();

        let mut unlocked = Vec::new();
        for active in &mut self.objectives {
            if active.status != ObjectiveStatus::Locked {
                continue;
            }
            let ready = quest
                .get_objective(active.objective_id)
                .map(|objective| {
                    objective
                        .dependencies
                        .iter()
                        .filter(|dep| present.contains(dep))
                        .all(|dep| completed.contains(dep))
                })
                .unwrap_or(true);
            if ready && active.unlock() {
                unlocked.push(active.objective_id);
            }
        }
        unlocked
    }
}

/// Record of a finished quest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedQuest {
    pub quest_name: String,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completed_at: DateTime<Utc>,
}

/// All quest state for a single player
#[derive(Debug, Clone)]
pub struct QuestPlayer {
    pub uuid: Uuid,
    pub quest_points: i64,
    pub active_quests: Vec<ActiveQuest>,
    pub completed_quests: Vec<CompletedQuest>,
    /// Lowercase quest name -> last acceptance time
    pub last_accepted: HashMap<String, DateTime<Utc>>,
    pub tags: BTreeSet<String>,
}

impl QuestPlayer {
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            quest_points: 0,
            active_quests: Vec::new(),
            completed_quests: Vec::new(),
            last_accepted: HashMap::new(),
            tags: BTreeSet::new(),
        }
    }

    pub fn active_quest(&self, id: Uuid) -> Option<&ActiveQuest> {
        self.active_quests.iter().find(|q| q.id == id)
    }

    pub fn active_quest_mut(&mut self, id: Uuid) -> Option<&mut ActiveQuest> {
        self.active_quests.iter_mut().find(|q| q.id == id)
    }

    /// IDs of active attempts of the named quest
    pub fn active_ids_of(&self, quest_name: &str) -> Vec<Uuid> {
        self.active_quests
            .iter()
            .filter(|q| q.quest_name.eq_ignore_ascii_case(quest_name))
            .map(|q| q.id)
            .collect()
    }

    pub fn active_count_of(&self, quest_name: &str) -> usize {
        self.active_quests
            .iter()
            .filter(|q| q.quest_name.eq_ignore_ascii_case(quest_name))
            .count()
    }

    pub fn completions_of(&self, quest_name: &str) -> usize {
        self.completed_quests
            .iter()
            .filter(|q| q.quest_name.eq_ignore_ascii_case(quest_name))
            .count()
    }

    pub fn has_active_quest(&self, quest_name: &str) -> bool {
        self.active_count_of(quest_name) > 0
    }

    pub fn record_acceptance(&mut self, quest_name: &str, at: DateTime<Utc>) {
        self.last_accepted.insert(quest_name.to_lowercase(), at);
    }

    pub fn last_accepted_at(&self, quest_name: &str) -> Option<DateTime<Utc>> {
        self.last_accepted.get(&quest_name.to_lowercase()).copied()
    }

    /// Remove an active quest and append it to the completion history
    pub fn complete_active_quest(&mut self, id: Uuid) -> Option<ActiveQuest> {
        let index = self.active_quests.iter().position(|q| q.id == id)?;
        let active = self.active_quests.remove(index);
        self.completed_quests.push(CompletedQuest {
            quest_name: active.quest_name.clone(),
            accepted_at: Some(active.accepted_at),
            completed_at: Utc::now(),
        });
        Some(active)
    }

    /// Remove an active quest without recording a completion
    pub fn remove_active_quest(&mut self, id: Uuid) -> Option<ActiveQuest> {
        let index = self.active_quests.iter().position(|q| q.id == id)?;
        Some(self.active_quests.remove(index))
    }

    /// Deduct quest points; false (and no change) if not enough
    pub fn remove_quest_points(&mut self, amount: i64) -> bool {
        if self.quest_points < amount {
            return false;
        }
        self.quest_points -= amount;
        true
    }

    pub fn add_quest_points(&mut self, amount: i64) {
        self.quest_points = self.quest_points.saturating_add(amount).max(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::{Objective, ObjectiveKind};

    fn trigger_objective(id: i32, deps: Vec<i32>) -> Objective {
        let mut objective = Objective::new(
            id,
            ObjectiveKind::TriggerCommand {
                trigger_name: format!("t{}", id),
            },
        );
        objective.dependencies = deps;
        objective
    }

    #[test]
    fn test_objective_progress_clamps() {
        let mut obj = ActiveObjective::new(1, 3);
        // Locked objectives ignore progress
        assert_eq!(obj.add_progress(1), ProgressResult::Ignored);
        assert_eq!(obj.progress, 0);

        obj.unlock();
        assert_eq!(obj.add_progress(1), ProgressResult::Progressed);
        assert_eq!(obj.add_progress(5), ProgressResult::ReachedTarget);
        assert_eq!(obj.progress, 3);

        obj.mark_completed();
        assert_eq!(obj.add_progress(1), ProgressResult::Ignored);
        assert_eq!(obj.progress, 3);
    }

    #[test]
    fn test_objective_progress_only_moves_forward() {
        let mut obj = ActiveObjective::new(1, 5);
        obj.unlock();
        assert_eq!(obj.add_progress(3), ProgressResult::Progressed);

        assert_eq!(obj.add_progress(-2), ProgressResult::Ignored);
        assert_eq!(obj.add_progress(0), ProgressResult::Ignored);
        assert_eq!(obj.progress, 3);

        // Huge amounts saturate instead of overflowing
        assert_eq!(obj.add_progress(i64::MAX), ProgressResult::ReachedTarget);
        assert_eq!(obj.progress, 5);
    }

    #[test]
    fn test_unlock_eligible_respects_dependencies() {
        let mut quest = Quest::new("chain");
        quest.objectives.push(trigger_objective(1, vec![]));
        quest.objectives.push(trigger_objective(2, vec![1]));
        quest.objectives.push(trigger_objective(3, vec![]));

        let mut active = ActiveQuest::new(
            "chain",
            vec![
                ActiveObjective::new(1, 1),
                ActiveObjective::new(2, 1),
                ActiveObjective::new(3, 1),
            ],
        );

        assert_eq!(active.unlock_eligible(&quest), vec![1, 3]);
        assert!(active.unlock_eligible(&quest).is_empty());

        active.objective_mut(1).unwrap().mark_completed();
        assert_eq!(active.unlock_eligible(&quest), vec![2]);
    }

    #[test]
    fn test_complete_active_quest_records_history() {
        let mut player = QuestPlayer::new(Uuid::new_v4());
        let active = ActiveQuest::new("Q1", vec![]);
        let id = active.id;
        player.active_quests.push(active);

        assert!(player.complete_active_quest(id).is_some());
        assert!(player.complete_active_quest(id).is_none());
        assert_eq!(player.completions_of("q1"), 1);
        assert!(!player.has_active_quest("Q1"));
    }

    #[test]
    fn test_quest_points_never_negative() {
        let mut player = QuestPlayer::new(Uuid::new_v4());
        player.add_quest_points(5);
        assert!(!player.remove_quest_points(6));
        assert!(player.remove_quest_points(5));
        player.add_quest_points(-10);
        assert_eq!(player.quest_points, 0);
        player.add_quest_points(i64::MAX);
        player.add_quest_points(1);
        assert_eq!(player.quest_points, i64::MAX);
    }
}
