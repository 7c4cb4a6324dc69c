//! `/notquests` - player-facing commands

use uuid::Uuid;

use super::{usage, Reply};
use crate::engine::QuestEngine;
use crate::quest::ObjectiveStatus;

pub const SUBCOMMANDS: &[&str] = &["take", "abort", "activeQuests", "progress", "questPoints"];

pub fn execute(engine: &mut QuestEngine, uuid: Uuid, args: &[String]) -> Reply {
    let Some(sub) = args.first() else {
        return Reply::line(format!("Player commands: {}", SUBCOMMANDS.join(", ")));
    };

    match sub.to_lowercase().as_str() {
        "take" => {
            let Some(quest_name) = args.get(1) else {
                return usage("/nq take <quest>");
            };
            if !engine.quests().contains(quest_name) {
                return Reply::line(format!("Quest {} does not exist", quest_name));
            }
            // take_quest already sends the result to the player
            let result = engine.take_quest(uuid, quest_name);
            Reply::line(result)
        }
        "abort" => {
            let Some(quest_name) = args.get(1) else {
                return usage("/nq abort <quest>");
            };
            Reply::line(engine.abort_quest(uuid, quest_name))
        }
        "activequests" => {
            let lines = active_quest_lines(engine, uuid);
            if lines.is_empty() {
                return Reply::line("You have not accepted any quests.");
            }
            let mut reply = vec!["Your active quests:".to_string()];
            reply.extend(lines);
            Reply::lines(reply)
        }
        "progress" => {
            let Some(quest_name) = args.get(1) else {
                return usage("/nq progress <quest>");
            };
            let lines = progress_lines(engine, uuid, quest_name);
            if lines.is_empty() {
                Reply::line(format!("You do not have the quest {} active.", quest_name))
            } else {
                Reply::lines(lines)
            }
        }
        "questpoints" => {
            let points = engine
                .get_quest_player(uuid)
                .map(|p| p.quest_points)
                .unwrap_or(0);
            Reply::line(format!("You have {} quest points.", points))
        }
        other => Reply::line(format!("Unknown subcommand: {}", other)),
    }
}

/// Numbered active quests with objective counts
pub(crate) fn active_quest_lines(engine: &QuestEngine, uuid: Uuid) -> Vec<String> {
    let Some(player) = engine.get_quest_player(uuid) else {
        return Vec::new();
    };

    let mut lines = Vec::new();
    for (i, active) in player.active_quests.iter().enumerate() {
        let name = engine
            .quests()
            .get(&active.quest_name)
            .map(|q| q.final_name().to_string())
            .unwrap_or_else(|| active.quest_name.clone());
        lines.push(format!(
            "{}. {} ({}/{} objectives)",
            i + 1,
            name,
            active.completed_count(),
            active.objectives.len()
        ));
    }
    lines
}

/// Objective progress of every active attempt of a quest. Empty if the
/// player does not have it active.
pub(crate) fn progress_lines(engine: &QuestEngine, uuid: Uuid, quest_name: &str) -> Vec<String> {
    let Some(player) = engine.get_quest_player(uuid) else {
        return Vec::new();
    };
    let quest = engine.quests().get(quest_name);

    let mut lines = Vec::new();
    for active in player
        .active_quests
        .iter()
        .filter(|a| a.quest_name.eq_ignore_ascii_case(quest_name))
    {
        let title = quest.map(|q| q.final_name()).unwrap_or(&active.quest_name);
        lines.push(format!("Progress for quest {}:", title));
        for state in &active.objectives {
            let objective = quest.and_then(|q| q.get_objective(state.objective_id));
            match (state.status, objective) {
                (ObjectiveStatus::Locked, _) => {
                    lines.push(format!("{}. [HIDDEN]", state.objective_id));
                }
                (status, Some(objective)) => {
                    lines.push(format!(
                        "{}. {} - {}/{} ({})",
                        state.objective_id,
                        objective.final_name(),
                        state.progress,
                        state.progress_needed,
                        status.as_str()
                    ));
                    if !objective.description.is_empty() {
                        lines.push(format!("   {}", objective.description));
                    }
                }
                (status, None) => {
                    lines.push(format!(
                        "{}. {}/{} ({})",
                        state.objective_id,
                        state.progress,
                        state.progress_needed,
                        status.as_str()
                    ));
                }
            }
        }
    }
    lines
}
