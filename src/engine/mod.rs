//! Quest Engine
//!
//! Owns quest definitions, named actions, the variable registry and every
//! player's quest state, and runs the progress state machine over them.
//! All mutation happens through `&mut self`; the server wraps the engine in
//! a single mutex, which plays the role of the game thread.

mod accept;
mod actions;
mod bridge;
mod progress;
mod triggers;
mod variables;

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::info;
use uuid::Uuid;

use crate::action::ActionStore;
use crate::error::Result;
use crate::host::HostServices;
use crate::quest::{QuestPlayer, QuestStore};
use crate::variable::{EvalContext, ExpressionEvaluator, VariableRegistry};

/// Follow-up rounds a single variable change may cause before the rest is dropped
pub const MAX_PROPAGATION_ROUNDS: usize = 8;

/// Nesting limit for named actions calling other named actions
pub const MAX_ACTION_DEPTH: usize = 16;

/// Bookkeeping for variable change propagation
#[derive(Debug, Default)]
struct Propagation {
    running: bool,
    /// Variables changed while a pass was running
    queued: VecDeque<String>,
}

pub struct QuestEngine {
    quests: QuestStore,
    actions: ActionStore,
    variables: VariableRegistry,
    evaluator: ExpressionEvaluator,
    host: HostServices,
    players: HashMap<Uuid, QuestPlayer>,
    propagation: Propagation,
    action_depth: usize,
    /// Players changed since the last save
    dirty: HashSet<Uuid>,
}

impl QuestEngine {
    pub fn new(
        quests: QuestStore,
        actions: ActionStore,
        variables: VariableRegistry,
        host: HostServices,
    ) -> Result<Self> {
        Ok(Self {
            quests,
            actions,
            variables,
            evaluator: ExpressionEvaluator::new()?,
            host,
            players: HashMap::new(),
            propagation: Propagation::default(),
            action_depth: 0,
            dirty: HashSet::new(),
        })
    }

    /// Disjoint borrows: quest store, evaluation context, player map
    fn split(&mut self) -> (&QuestStore, EvalContext<'_>, &mut HashMap<Uuid, QuestPlayer>) {
        (
            &self.quests,
            EvalContext {
                variables: &self.variables,
                evaluator: &self.evaluator,
                host: &self.host,
            },
            &mut self.players,
        )
    }

    pub fn ctx(&self) -> EvalContext<'_> {
        EvalContext {
            variables: &self.variables,
            evaluator: &self.evaluator,
            host: &self.host,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn quests(&self) -> &QuestStore {
        &self.quests
    }

    /// Mutable quest definitions (admin edits)
    pub fn quests_mut(&mut self) -> &mut QuestStore {
        &mut self.quests
    }

    pub fn actions(&self) -> &ActionStore {
        &self.actions
    }

    pub fn actions_mut(&mut self) -> &mut ActionStore {
        &mut self.actions
    }

    pub fn variables(&self) -> &VariableRegistry {
        &self.variables
    }

    pub fn host(&self) -> &HostServices {
        &self.host
    }

    /// Swap in freshly loaded definitions (hot reload, `reload` command)
    pub fn replace_definitions(&mut self, quests: QuestStore, actions: ActionStore) {
        self.quests = quests;
        self.actions = actions;
        info!(
            "Definitions replaced: {} quests, {} actions",
            self.quests.len(),
            self.actions.len()
        );
    }

    pub fn get_quest_player(&self, uuid: Uuid) -> Option<&QuestPlayer> {
        self.players.get(&uuid)
    }

    pub fn get_or_create_quest_player(&mut self, uuid: Uuid) -> &mut QuestPlayer {
        self.players.entry(uuid).or_insert_with(|| QuestPlayer::new(uuid))
    }

    pub fn players(&self) -> impl Iterator<Item = &QuestPlayer> {
        self.players.values()
    }

    /// Install a player loaded from storage
    pub fn insert_player(&mut self, player: QuestPlayer) {
        self.players.insert(player.uuid, player);
    }

    pub fn mark_dirty(&mut self, uuid: Uuid) {
        self.dirty.insert(uuid);
    }

    pub fn mark_all_dirty(&mut self) {
        self.dirty.extend(self.players.keys().copied());
    }

    /// Players changed since the last call, cloned for saving
    pub fn take_dirty_players(&mut self) -> Vec<QuestPlayer> {
        let dirty: Vec<Uuid> = self.dirty.drain().collect();
        dirty
            .into_iter()
            .filter_map(|uuid| self.players.get(&uuid).cloned())
            .collect()
    }

    /// Whether the player has any unlocked Condition objective
    pub fn has_active_condition_objectives(&self, uuid: Uuid) -> bool {
        let Some(player) = self.players.get(&uuid) else {
            return false;
        };
        player.active_quests.iter().any(|active| {
            let Some(quest) = self.quests.get(&active.quest_name) else {
                return false;
            };
            active.objectives.iter().any(|o| {
                o.is_unlocked()
                    && quest
                        .get_objective(o.objective_id)
                        .and_then(|objective| objective.listened_variable())
                        .is_some()
            })
        })
    }

    /// Add or remove quest points (admin); never below zero
    pub fn add_quest_points(&mut self, uuid: Uuid, amount: i64) -> i64 {
        let player = self.get_or_create_quest_player(uuid);
        player.add_quest_points(amount);
        let total = player.quest_points;
        self.dirty.insert(uuid);
        self.variable_changed("QuestPoints");
        total
    }

    pub fn set_quest_points(&mut self, uuid: Uuid, amount: i64) {
        self.get_or_create_quest_player(uuid).quest_points = amount.max(0);
        self.dirty.insert(uuid);
        self.variable_changed("QuestPoints");
    }

    /// Resolve a player name or UUID through the host
    pub fn resolve_player(&self, name: &str) -> Option<Uuid> {
        self.host.server.player_uuid(name)
    }

    pub fn send_message(&self, uuid: Uuid, message: &str) {
        self.host.server.send_message(uuid, message);
    }
}
