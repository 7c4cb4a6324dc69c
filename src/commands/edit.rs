//! `/qadmin edit <quest> …` - quest definition editing

use std::collections::HashSet;

use super::admin::{check_condition_support, parse_action, parse_bool, parse_condition};
use super::{usage, Reply};
use crate::action::Action;
use crate::condition::Condition;
use crate::engine::QuestEngine;
use crate::objective::{Location, Objective, ObjectiveKind};
use crate::quest::{Quest, Trigger, TriggerType};

pub const EDIT_FIELDS: &[&str] = &[
    "displayName",
    "description",
    "maxAccepts",
    "takeEnabled",
    "acceptCooldown",
    "requirements",
    "rewards",
    "triggers",
    "npcs",
    "objectives",
];

pub const OBJECTIVE_EDIT_FIELDS: &[&str] = &[
    "displayName",
    "description",
    "progressNeeded",
    "dependencies",
    "conditions",
    "rewards",
    "completionNPC",
    "location",
    "showLocation",
    "checkOnlyWhenVariableChanges",
    "info",
    "remove",
];

pub const LIST_OPERATIONS: &[&str] = &["add", "list", "clear"];

/// Edits work on a copy of the quest which replaces the stored one only
/// when something changed.
pub fn execute(engine: &mut QuestEngine, args: &[String]) -> Reply {
    let (Some(quest_name), Some(field)) = (args.first(), args.get(1)) else {
        return usage("/qadmin edit <quest> <field> [arguments...]");
    };
    let Some(mut quest) = engine.quests().get(quest_name).cloned() else {
        return Reply::line(format!("Quest {} does not exist", quest_name));
    };

    let reply = edit_quest(engine, &mut quest, field, &args[2..]);
    if reply.quests_changed {
        engine.quests_mut().insert(quest);
    }
    reply
}

fn edit_quest(engine: &QuestEngine, quest: &mut Quest, field: &str, args: &[String]) -> Reply {
    match field.to_lowercase().as_str() {
        "displayname" => {
            if args.is_empty() {
                return Reply::line(format!("Display name of quest {}: {}", quest.name, quest.final_name()));
            }
            quest.display_name = args.join(" ");
            Reply::line(format!(
                "Display Name successfully added to quest {}! New display name: {}",
                quest.name, quest.display_name
            ))
            .quests()
        }
        "description" => {
            if args.is_empty() {
                return Reply::line(format!("Description of quest {}: {}", quest.name, quest.description));
            }
            quest.description = args.join(" ");
            Reply::line(format!(
                "Description successfully added to quest {}! New description: {}",
                quest.name, quest.description
            ))
            .quests()
        }
        "maxaccepts" => {
            let Some(amount) = args.first().and_then(|raw| raw.parse::<i32>().ok()) else {
                return usage(&format!("/qadmin edit {} maxAccepts <amount> (-1 = unlimited)", quest.name));
            };
            quest.max_accepts = if amount < 1 { -1 } else { amount };
            Reply::line(format!(
                "Max quest accept amount for quest {} has been set to {}!",
                quest.name,
                quest.max_accepts_text()
            ))
            .quests()
        }
        "takeenabled" => {
            let Some(enabled) = args.first().and_then(|raw| parse_bool(raw)) else {
                return usage(&format!("/qadmin edit {} takeEnabled true|false", quest.name));
            };
            quest.take_enabled = enabled;
            Reply::line(format!(
                "Quest taking (/nq take) for the quest {} has been set to {}!",
                quest.name, enabled
            ))
            .quests()
        }
        "acceptcooldown" => {
            let Some(minutes) = args.first().and_then(|raw| raw.parse::<i64>().ok()) else {
                return usage(&format!("/qadmin edit {} acceptCooldown <minutes> (-1 = disabled)", quest.name));
            };
            if minutes <= 0 {
                quest.accept_cooldown = -1;
                Reply::line(format!("Cooldown for quest {} has been disabled!", quest.name)).quests()
            } else {
                quest.accept_cooldown = minutes;
                Reply::line(format!(
                    "Cooldown for quest {} has been set to {} minutes!",
                    quest.name, minutes
                ))
                .quests()
            }
        }
        "requirements" => {
            let title = format!("Requirements for quest {}:", quest.name);
            let quest_name = quest.name.clone();
            edit_conditions(engine, &mut quest.requirements, None, &title, &quest_name, args)
        }
        "rewards" => {
            let title = format!("Rewards for quest {}:", quest.name);
            let quest_name = quest.name.clone();
            edit_rewards(engine, &mut quest.rewards, &title, &quest_name, args)
        }
        "triggers" => edit_triggers(engine, quest, args),
        "npcs" => edit_npcs(quest, args),
        "objectives" => edit_objectives(engine, quest, args),
        other => Reply::line(format!(
            "Unknown quest field: {}. Available: {}",
            other,
            EDIT_FIELDS.join(", ")
        )),
    }
}

fn condition_listing(title: &str, conditions: &[Condition]) -> Reply {
    let mut lines = vec![title.to_string()];
    if conditions.is_empty() {
        lines.push("(none)".to_string());
    }
    for (i, condition) in conditions.iter().enumerate() {
        lines.push(format!("{}. {}", i + 1, condition.kind.type_name()));
        lines.push(condition.description_line());
    }
    Reply::lines(lines)
}

fn action_listing(title: &str, actions: &[Action]) -> Reply {
    let mut lines = vec![title.to_string()];
    if actions.is_empty() {
        lines.push("(none)".to_string());
    }
    for (i, action) in actions.iter().enumerate() {
        lines.push(format!("{}. {}", i + 1, action.kind.type_name()));
        lines.push(action.description_line());
    }
    Reply::lines(lines)
}

/// `add <Type> <args…> | list | clear` on a condition list
fn edit_conditions(
    engine: &QuestEngine,
    conditions: &mut Vec<Condition>,
    objective_id: Option<i32>,
    title: &str,
    quest_name: &str,
    args: &[String],
) -> Reply {
    let what = if objective_id.is_some() { "Condition" } else { "Requirement" };
    let Some(operation) = args.first() else {
        return usage(&format!("... {} add|list|clear", what.to_lowercase()));
    };
    match operation.to_lowercase().as_str() {
        "add" => match parse_condition(engine, &args[1..]) {
            Ok(mut condition) => {
                condition.objective_id = objective_id;
                conditions.push(condition);
                Reply::line(format!("{} successfully added to quest {}!", what, quest_name)).quests()
            }
            Err(e) => Reply::line(e),
        },
        "list" => condition_listing(title, conditions),
        "clear" => {
            conditions.clear();
            Reply::line(format!("All {}s of quest {} have been removed!", what.to_lowercase(), quest_name))
                .quests()
        }
        other => Reply::line(format!("Unknown operation: {}", other)),
    }
}

/// `add <Type> <args…> | list | clear` on a reward list
fn edit_rewards(engine: &QuestEngine, rewards: &mut Vec<Action>, title: &str, quest_name: &str, args: &[String]) -> Reply {
    let Some(operation) = args.first() else {
        return usage("... rewards add|list|clear");
    };
    match operation.to_lowercase().as_str() {
        "add" => match parse_action(engine, &args[1..]) {
            Ok(action) => {
                rewards.push(action);
                Reply::line(format!("Reward successfully added to quest {}!", quest_name)).quests()
            }
            Err(e) => Reply::line(e),
        },
        "list" => action_listing(title, rewards),
        "clear" => {
            rewards.clear();
            Reply::line(format!("All rewards of quest {} have been removed!", quest_name)).quests()
        }
        other => Reply::line(format!("Unknown operation: {}", other)),
    }
}

/// `triggers add <type> <action> [applyOn] [world] [amount] [npcId] | list | remove <n> | clear`
fn edit_triggers(engine: &QuestEngine, quest: &mut Quest, args: &[String]) -> Reply {
    let Some(operation) = args.first() else {
        return usage("/qadmin edit <quest> triggers add|list|remove|clear");
    };
    match operation.to_lowercase().as_str() {
        "add" => {
            let (Some(raw_type), Some(action_name)) = (args.get(1), args.get(2)) else {
                return usage("/qadmin edit <quest> triggers add <type> <action> [applyOn] [world|ALL] [amount] [npcId]");
            };
            let Some(trigger_type) = TriggerType::from_str(raw_type) else {
                let types: Vec<&str> = TriggerType::ALL.iter().map(|t| t.as_str()).collect();
                return Reply::line(format!("Unknown trigger type {}. Available: {}", raw_type, types.join(", ")));
            };
            if !engine.actions().contains(action_name) {
                return Reply::line(format!("Action {} does not exist", action_name));
            }

            let mut trigger = Trigger::new(trigger_type, action_name);
            if let Some(raw) = args.get(3) {
                match raw.parse::<i32>() {
                    Ok(0) => {}
                    Ok(id) if quest.get_objective(id).is_some() => trigger.apply_on = id,
                    _ => return Reply::line(format!("Invalid applyOn '{}': use 0 or an objective ID", raw)),
                }
            }
            if let Some(world) = args.get(4) {
                if !world.eq_ignore_ascii_case("ALL") {
                    trigger.world_name = Some(world.clone());
                }
            }
            if let Some(raw) = args.get(5) {
                match raw.parse::<i64>() {
                    Ok(amount) if amount >= 1 => trigger.amount_needed = amount,
                    _ => return Reply::line(format!("Invalid amount '{}'", raw)),
                }
            }
            if trigger_type == TriggerType::NpcDeath {
                let Some(npc_id) = args.get(6).and_then(|raw| raw.parse::<i32>().ok()) else {
                    return Reply::line("NPCDEATH triggers need the ID of the NPC");
                };
                trigger.npc_id = Some(npc_id);
            }

            quest.triggers.push(trigger);
            Reply::line(format!("Trigger successfully added to quest {}!", quest.name)).quests()
        }
        "list" => {
            let mut lines = vec![format!("Triggers for quest {}:", quest.name)];
            if quest.triggers.is_empty() {
                lines.push("(none)".to_string());
            }
            for (i, trigger) in quest.triggers.iter().enumerate() {
                lines.push(format!("{}. {}", i + 1, trigger.description_line()));
            }
            Reply::lines(lines)
        }
        "remove" => {
            let Some(index) = args.get(1).and_then(|raw| raw.parse::<usize>().ok()) else {
                return usage("/qadmin edit <quest> triggers remove <number>");
            };
            if index == 0 || index > quest.triggers.len() {
                return Reply::line(format!("Trigger {} does not exist", index));
            }
            quest.triggers.remove(index - 1);
            Reply::line(format!("Trigger {} of quest {} has been removed!", index, quest.name)).quests()
        }
        "clear" => {
            quest.triggers.clear();
            Reply::line(format!("All triggers of quest {} have been removed!", quest.name)).quests()
        }
        other => Reply::line(format!("Unknown operation: {}", other)),
    }
}

fn edit_npcs(quest: &mut Quest, args: &[String]) -> Reply {
    let Some(operation) = args.first() else {
        return usage("/qadmin edit <quest> npcs add|remove|list|clear");
    };
    match operation.to_lowercase().as_str() {
        "add" | "remove" => {
            let Some(npc_id) = args.get(1).and_then(|raw| raw.parse::<i32>().ok()) else {
                return usage(&format!("/qadmin edit <quest> npcs {} <npc id>", operation));
            };
            if operation.eq_ignore_ascii_case("add") {
                if quest.npcs.contains(&npc_id) {
                    return Reply::line(format!("NPC {} is already attached to quest {}", npc_id, quest.name));
                }
                quest.npcs.push(npc_id);
                Reply::line(format!("Quest {} has been attached to NPC {}!", quest.name, npc_id)).quests()
            } else {
                let before = quest.npcs.len();
                quest.npcs.retain(|id| *id != npc_id);
                if quest.npcs.len() == before {
                    return Reply::line(format!("NPC {} is not attached to quest {}", npc_id, quest.name));
                }
                Reply::line(format!("Quest {} has been detached from NPC {}!", quest.name, npc_id)).quests()
            }
        }
        "list" => {
            let ids: Vec<String> = quest.npcs.iter().map(|id| id.to_string()).collect();
            Reply::line(format!("NPCs attached to quest {}: {}", quest.name, if ids.is_empty() {
                "none".to_string()
            } else {
                ids.join(", ")
            }))
        }
        "clear" => {
            quest.npcs.clear();
            Reply::line(format!("All NPCs of quest {} have been removed!", quest.name)).quests()
        }
        other => Reply::line(format!("Unknown operation: {}", other)),
    }
}

fn edit_objectives(engine: &QuestEngine, quest: &mut Quest, args: &[String]) -> Reply {
    let Some(operation) = args.first() else {
        return usage("/qadmin edit <quest> objectives add|list|clear|edit ...");
    };
    match operation.to_lowercase().as_str() {
        "add" => {
            let Some(objective_type) = args.get(1) else {
                return usage("/qadmin edit <quest> objectives add <type> [arguments...]");
            };
            let (kind, progress_needed) =
                match ObjectiveKind::from_args(objective_type, &args[2..], engine.variables()) {
                    Ok(parsed) => parsed,
                    Err(e) => return Reply::line(e),
                };
            let supported = match &kind {
                ObjectiveKind::Condition { condition, .. } => check_condition_support(engine, &condition.kind),
                ObjectiveKind::OtherQuest { other_quest_name, .. }
                    if !engine.quests().contains(other_quest_name)
                        && !other_quest_name.eq_ignore_ascii_case(&quest.name) =>
                {
                    Err(format!("Quest {} does not exist", other_quest_name))
                }
                _ => Ok(()),
            };
            if let Err(e) = supported {
                return Reply::line(e);
            }

            let id = quest.next_objective_id();
            let mut objective = Objective::new(id, kind);
            objective.progress_needed = progress_needed;
            quest.add_objective(objective);
            Reply::line(format!("Objective successfully added to quest {}! ID: {}", quest.name, id)).quests()
        }
        "list" => {
            let mut lines = vec![format!("Objectives for quest {}:", quest.name)];
            if quest.objectives.is_empty() {
                lines.push("(none)".to_string());
            }
            for objective in &quest.objectives {
                lines.push(format!(
                    "{}. {} (progress needed: {})",
                    objective.id,
                    objective.final_name(),
                    objective.progress_needed
                ));
                if !objective.dependencies.is_empty() {
                    let deps: Vec<String> = objective.dependencies.iter().map(|d| d.to_string()).collect();
                    lines.push(format!("   Depends on: {}", deps.join(", ")));
                }
            }
            Reply::lines(lines)
        }
        "clear" => {
            quest.objectives.clear();
            quest.triggers.retain(|t| t.apply_on == 0);
            Reply::line(format!("All objectives of quest {} have been removed!", quest.name)).quests()
        }
        "edit" => {
            let (Some(raw_id), Some(field)) = (args.get(1), args.get(2)) else {
                return usage("/qadmin edit <quest> objectives edit <id> <field> [arguments...]");
            };
            let Some(id) = raw_id.parse::<i32>().ok().filter(|id| quest.get_objective(*id).is_some()) else {
                return Reply::line(format!("Objective {} does not exist in quest {}", raw_id, quest.name));
            };
            edit_objective(engine, quest, id, field, &args[3..])
        }
        other => Reply::line(format!("Unknown operation: {}", other)),
    }
}

/// Whether `from` depends on `target`, directly or through other objectives
fn depends_on(quest: &Quest, from: i32, target: i32) -> bool {
    let mut stack = vec![from];
    let mut seen = HashSet::new();
    while let Some(id) = stack.pop() {
        if id == target {
            return true;
        }
        if !seen.insert(id) {
            continue;
        }
        if let Some(objective) = quest.get_objective(id) {
            stack.extend(objective.dependencies.iter().copied());
        }
    }
    false
}

fn edit_objective(engine: &QuestEngine, quest: &mut Quest, id: i32, field: &str, args: &[String]) -> Reply {
    let quest_name = quest.name.clone();
    let field = field.to_lowercase();

    // Checks that need the whole quest run before the objective is borrowed
    match field.as_str() {
        "remove" => {
            quest.objectives.retain(|o| o.id != id);
            for objective in &mut quest.objectives {
                objective.dependencies.retain(|dep| *dep != id);
            }
            quest.triggers.retain(|t| t.apply_on != id);
            return Reply::line(format!("Objective {} of quest {} has been removed!", id, quest_name)).quests();
        }
        "dependencies" => return edit_dependencies(quest, id, args),
        _ => {}
    }

    let Some(objective) = quest.get_objective_mut(id) else {
        return Reply::line(format!("Objective {} does not exist in quest {}", id, quest_name));
    };

    match field.as_str() {
        "displayname" => {
            if args.is_empty() {
                return usage("... objectives edit <id> displayName <display name>");
            }
            objective.display_name = args.join(" ");
            Reply::line(format!(
                "Display name of objective {} has been set to {}!",
                id, objective.display_name
            ))
            .quests()
        }
        "description" => {
            if args.is_empty() {
                return usage("... objectives edit <id> description <description>");
            }
            objective.description = args.join(" ");
            Reply::line(format!(
                "Description of objective {} has been set to {}!",
                id, objective.description
            ))
            .quests()
        }
        "progressneeded" => match args.first().and_then(|raw| raw.parse::<i64>().ok()) {
            Some(amount) if amount >= 1 => {
                objective.progress_needed = amount;
                Reply::line(format!("Progress needed for objective {} has been set to {}!", id, amount)).quests()
            }
            _ => usage("... objectives edit <id> progressNeeded <amount (at least 1)>"),
        },
        "conditions" => {
            let title = format!("Conditions of objective {}:", id);
            edit_conditions(engine, &mut objective.conditions, Some(id), &title, &quest_name, args)
        }
        "rewards" => {
            let title = format!("Rewards of objective {}:", id);
            edit_rewards(engine, &mut objective.rewards, &title, &quest_name, args)
        }
        "completionnpc" => {
            let Some(raw) = args.first() else {
                return usage("... objectives edit <id> completionNPC <npc id|none>");
            };
            if raw.eq_ignore_ascii_case("none") || raw == "-1" {
                objective.completion_npc_id = None;
                return Reply::line(format!("Completion NPC of objective {} has been removed!", id)).quests();
            }
            match raw.parse::<i32>() {
                Ok(npc_id) => {
                    objective.completion_npc_id = Some(npc_id);
                    Reply::line(format!("Completion NPC of objective {} has been set to {}!", id, npc_id)).quests()
                }
                Err(_) => Reply::line(format!("'{}' is not a valid NPC ID", raw)),
            }
        }
        "location" => {
            let (Some(world), Some(x), Some(y), Some(z)) = (
                args.first(),
                args.get(1).and_then(|v| v.parse::<f64>().ok()),
                args.get(2).and_then(|v| v.parse::<f64>().ok()),
                args.get(3).and_then(|v| v.parse::<f64>().ok()),
            ) else {
                return usage("... objectives edit <id> location <world> <x> <y> <z>");
            };
            objective.location = Some(Location { world: world.clone(), x, y, z });
            Reply::line(format!("Location of objective {} has been set!", id)).quests()
        }
        "showlocation" => match args.first().and_then(|raw| parse_bool(raw)) {
            Some(show) => {
                objective.show_location = show;
                Reply::line(format!("Show location of objective {} has been set to {}!", id, show)).quests()
            }
            None => usage("... objectives edit <id> showLocation true|false"),
        },
        "checkonlywhenvariablechanges" => {
            let Some(value) = args.first().and_then(|raw| parse_bool(raw)) else {
                return usage("... objectives edit <id> checkOnlyWhenVariableChanges true|false");
            };
            match &mut objective.kind {
                ObjectiveKind::Condition { check_only_when_variable_changes, .. } => {
                    *check_only_when_variable_changes = value;
                    Reply::line(format!(
                        "checkOnlyWhenVariableChanges of objective {} has been set to {}!",
                        id, value
                    ))
                    .quests()
                }
                _ => Reply::line(format!("Objective {} is not a Condition objective", id)),
            }
        }
        "info" => {
            let mut lines = vec![
                format!("Objective {} of quest {}:", id, quest_name),
                format!("Type: {}", objective.kind.type_name()),
                format!("Task: {}", objective.task_description()),
                format!("Progress needed: {}", objective.progress_needed),
            ];
            if !objective.display_name.is_empty() {
                lines.push(format!("Display name: {}", objective.display_name));
            }
            if !objective.description.is_empty() {
                lines.push(format!("Description: {}", objective.description));
            }
            if let Some(npc_id) = objective.completion_npc_id {
                lines.push(format!("Completion NPC: {}", npc_id));
            }
            if let Some(location) = &objective.location {
                lines.push(format!(
                    "Location: {} {} {} {} (shown: {})",
                    location.world, location.x, location.y, location.z, objective.show_location
                ));
            }
            lines.push(format!("Conditions: {}", objective.conditions.len()));
            lines.extend(objective.conditions.iter().map(|c| c.description_line()));
            lines.push(format!("Rewards: {}", objective.rewards.len()));
            lines.extend(objective.rewards.iter().map(|a| a.description_line()));
            Reply::lines(lines)
        }
        other => Reply::line(format!(
            "Unknown objective field: {}. Available: {}",
            other,
            OBJECTIVE_EDIT_FIELDS.join(", ")
        )),
    }
}

/// `dependencies add <id> | remove <id> | list | clear`
fn edit_dependencies(quest: &mut Quest, id: i32, args: &[String]) -> Reply {
    let Some(operation) = args.first() else {
        return usage("... objectives edit <id> dependencies add|remove|list|clear");
    };
    let operation = operation.to_lowercase();
    let dependency = args.get(1).and_then(|raw| raw.parse::<i32>().ok());

    match (operation.as_str(), dependency) {
        ("add", Some(dep)) => {
            if dep == id || quest.get_objective(dep).is_none() {
                return Reply::line(format!("Objective {} cannot depend on objective {}", id, dep));
            }
            if depends_on(quest, dep, id) {
                return Reply::line(format!(
                    "Objective {} already depends on objective {}; this would create a cycle",
                    dep, id
                ));
            }
            let Some(objective) = quest.get_objective_mut(id) else {
                return Reply::line(format!("Objective {} does not exist", id));
            };
            if objective.dependencies.contains(&dep) {
                return Reply::line(format!("Objective {} already depends on objective {}", id, dep));
            }
            objective.dependencies.push(dep);
            Reply::line(format!("Objective {} now depends on objective {}!", id, dep)).quests()
        }
        ("remove", Some(dep)) => {
            let Some(objective) = quest.get_objective_mut(id) else {
                return Reply::line(format!("Objective {} does not exist", id));
            };
            let before = objective.dependencies.len();
            objective.dependencies.retain(|d| *d != dep);
            if objective.dependencies.len() == before {
                return Reply::line(format!("Objective {} does not depend on objective {}", id, dep));
            }
            Reply::line(format!("Objective {} no longer depends on objective {}!", id, dep)).quests()
        }
        ("list", _) => {
            let deps: Vec<String> = quest
                .get_objective(id)
                .map(|o| o.dependencies.iter().map(|d| d.to_string()).collect())
                .unwrap_or_default();
            Reply::line(format!(
                "Dependencies of objective {}: {}",
                id,
                if deps.is_empty() { "none".to_string() } else { deps.join(", ") }
            ))
        }
        ("clear", _) => {
            if let Some(objective) = quest.get_objective_mut(id) {
                objective.dependencies.clear();
            }
            Reply::line(format!("All dependencies of objective {} have been removed!", id)).quests()
        }
        _ => usage("... objectives edit <id> dependencies add|remove <objective id> | list | clear"),
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::tests::Harness;
    use crate::objective::ObjectiveKind;
    use crate::quest::TriggerType;

    #[test]
    fn test_quest_fields() {
        let mut h = Harness::new();
        h.console("qadmin create Miner");
        assert_eq!(
            h.console("qadmin edit Miner maxAccepts 3"),
            vec!["Max quest accept amount for quest Miner has been set to 3!"]
        );
        assert!(h.joined("qadmin edit Miner maxAccepts -1").contains("unlimited"));
        assert_eq!(
            h.console("qadmin edit Miner acceptCooldown 30"),
            vec!["Cooldown for quest Miner has been set to 30 minutes!"]
        );
        assert!(h.joined("qadmin edit Miner acceptCooldown 0").contains("disabled"));
        h.console("qadmin edit Miner displayName \"The Deep Miner\"");
        h.console("qadmin edit Miner description Dig deeper");
        h.console("qadmin edit Miner takeEnabled false");
        assert!(h.joined("qadmin edit Nope maxAccepts 1").contains("Quest Nope does not exist"));

        let quest = h.engine.quests().get("miner").unwrap();
        assert_eq!(quest.final_name(), "The Deep Miner");
        assert_eq!(quest.description, "Dig deeper");
        assert_eq!(quest.accept_cooldown, -1);
        assert!(!quest.take_enabled);
    }

    #[test]
    fn test_requirements_and_rewards() {
        let mut h = Harness::new();
        h.console("qadmin create Intro");
        h.console("qadmin create Miner");
        assert!(h.joined("qadmin edit Miner requirements add OtherQuest Intro 1").contains("successfully added"));
        assert!(h.joined("qadmin edit Miner requirements add OtherQuest Ghost").contains("does not exist"));
        assert!(h.joined("qadmin edit Miner requirements add QuestPoints 5 deduct").contains("successfully added"));
        assert!(h.joined("qadmin edit Miner requirements add Teleport").contains("Unknown condition type"));
        assert!(h.joined("qadmin edit Miner rewards add GiveQuestPoints 10").contains("successfully added"));
        assert!(h.joined("qadmin edit Miner rewards add ConsoleCommand say {PLAYER} done").contains("successfully added"));

        let listing = h.joined("qadmin edit Miner requirements list");
        assert!(listing.contains("1. OtherQuest"));
        assert!(listing.contains("2. QuestPoints"));
        let quest = h.engine.quests().get("Miner").unwrap();
        assert_eq!(quest.requirements.len(), 2);
        assert_eq!(quest.rewards.len(), 2);

        // Requirement enforced on acceptance
        h.host.add_player("Steve");
        assert!(h.joined("qadmin give Steve Miner").contains("do not fulfill all the requirements"));

        h.console("qadmin edit Miner requirements clear");
        assert!(h.engine.quests().get("Miner").unwrap().requirements.is_empty());
    }

    #[test]
    fn test_triggers() {
        let mut h = Harness::new();
        h.console("qadmin create Miner");
        h.console("qadmin edit Miner objectives add CollectItems coal 4");
        assert!(h.joined("qadmin edit Miner triggers add BEGIN missing").contains("Action missing does not exist"));
        h.console("qadmin actions add announce ConsoleCommand say hi");
        assert!(h.joined("qadmin edit Miner triggers add WORLD_ENTER announce 1 nether 2").contains("successfully added"));
        assert!(h.joined("qadmin edit Miner triggers add DEATH announce 7").contains("Invalid applyOn"));
        assert!(h.joined("qadmin edit Miner triggers add NPCDEATH announce 0 ALL 1").contains("need the ID"));
        assert!(h.joined("qadmin edit Miner triggers add FLY announce").contains("Unknown trigger type"));

        let quest = h.engine.quests().get("Miner").unwrap();
        assert_eq!(quest.triggers.len(), 1);
        let trigger = &quest.triggers[0];
        assert_eq!(trigger.trigger_type, TriggerType::WorldEnter);
        assert_eq!(trigger.apply_on, 1);
        assert_eq!(trigger.world_name.as_deref(), Some("nether"));
        assert_eq!(trigger.amount_needed, 2);

        assert!(h.joined("qadmin edit Miner triggers list").contains("1. WORLDENTER -> announce"));
        assert!(h.joined("qadmin edit Miner triggers remove 2").contains("does not exist"));
        h.console("qadmin edit Miner triggers remove 1");
        assert!(h.engine.quests().get("Miner").unwrap().triggers.is_empty());
    }

    #[test]
    fn test_npcs() {
        let mut h = Harness::new();
        h.console("qadmin create Miner");
        h.console("qadmin edit Miner npcs add 4");
        assert!(h.joined("qadmin edit Miner npcs add 4").contains("already attached"));
        h.console("qadmin edit Miner npcs add 9");
        assert_eq!(h.console("qadmin edit Miner npcs list"), vec!["NPCs attached to quest Miner: 4, 9"]);
        h.console("qadmin edit Miner npcs remove 4");
        assert_eq!(h.engine.quests().get("Miner").unwrap().npcs, vec![9]);
        h.console("qadmin edit Miner npcs clear");
        assert!(h.engine.quests().get("Miner").unwrap().npcs.is_empty());
    }

    #[test]
    fn test_objectives_and_dependencies() {
        let mut h = Harness::new();
        h.console("qadmin create Miner");
        assert!(h.joined("qadmin edit Miner objectives add CraftItems chest 2").contains("ID: 1"));
        assert!(h.joined("qadmin edit Miner objectives add TriggerCommand done").contains("ID: 2"));
        assert!(h.joined("qadmin edit Miner objectives add Condition QuestPoints 10").contains("ID: 3"));
        assert!(h.joined("qadmin edit Miner objectives add OtherQuest Ghost").contains("does not exist"));

        assert!(h.joined("qadmin edit Miner objectives edit 2 dependencies add 1").contains("now depends"));
        assert!(h.joined("qadmin edit Miner objectives edit 1 dependencies add 2").contains("cycle"));
        assert!(h.joined("qadmin edit Miner objectives edit 2 dependencies add 2").contains("cannot depend"));
        h.console("qadmin edit Miner objectives edit 3 checkOnlyWhenVariableChanges true");
        h.console("qadmin edit Miner objectives edit 1 displayName Build storage");
        h.console("qadmin edit Miner objectives edit 1 rewards add GiveQuestPoints 2");
        h.console("qadmin edit Miner objectives edit 1 conditions add QuestPoints 0");
        h.console("qadmin edit Miner objectives edit 1 location world 1.5 64 -3");

        let info = h.joined("qadmin edit Miner objectives edit 1 info");
        assert!(info.contains("Display name: Build storage"));
        assert!(info.contains("Location: world 1.5 64 -3"));
        assert!(h.joined("qadmin edit Miner objectives edit 9 info").contains("does not exist"));

        {
            let quest = h.engine.quests().get("Miner").unwrap();
            assert_eq!(quest.get_objective(2).unwrap().dependencies, vec![1]);
            assert_eq!(quest.get_objective(1).unwrap().conditions[0].objective_id, Some(1));
            assert!(matches!(
                quest.get_objective(3).unwrap().kind,
                ObjectiveKind::Condition { check_only_when_variable_changes: true, .. }
            ));
        }

        // Objective 2 unlocks only after objective 1
        let uuid = h.host.add_player("Steve");
        h.console("qadmin give Steve Miner");
        let lines = h.console("qadmin progress Steve Miner");
        assert!(lines.iter().any(|l| l == "2. [HIDDEN]"));
        h.engine.handle_craft(uuid, "CHEST", 2);
        assert!(h.joined("qadmin progress Steve Miner").contains("2. Goal: done - 0/1"));

        h.console("qadmin edit Miner objectives edit 1 remove");
        let quest = h.engine.quests().get("Miner").unwrap();
        assert!(quest.get_objective(1).is_none());
        assert!(quest.get_objective(2).unwrap().dependencies.is_empty());
    }
}
