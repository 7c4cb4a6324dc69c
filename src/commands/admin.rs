//! `/notquestsadmin` - quest management commands

use tracing::{info, warn};
use uuid::Uuid;

use super::{edit, player, resolve_player, usage, CommandSender, DataFiles, Reply};
use crate::action::{Action, ActionKind, ActionStore, ACTION_TYPES, COMMAND_PLACEHOLDERS};
use crate::condition::{Condition, ConditionKind, CONDITION_TYPES};
use crate::engine::QuestEngine;
use crate::objective::OBJECTIVE_TYPES;
use crate::quest::QuestStore;
use crate::variable::{VariableArgs, VariableDataType, VariableValue};

pub const SUBCOMMANDS: &[&str] = &[
    "create",
    "delete",
    "edit",
    "give",
    "forcegive",
    "failQuest",
    "completeQuest",
    "listAllQuests",
    "activeQuests",
    "completedQuests",
    "progress",
    "questPoints",
    "triggerObjective",
    "variables",
    "actions",
    "listObjectiveTypes",
    "listRequirementTypes",
    "listRewardTypes",
    "listVariables",
    "listPlaceholders",
    "resetAndRemoveQuestForAllPlayers",
    "resetAndFailQuestForAllPlayers",
    "save",
    "reload",
];

pub fn execute(engine: &mut QuestEngine, files: &DataFiles, sender: CommandSender, args: &[String]) -> Reply {
    let Some(sub) = args.first() else {
        return Reply::line(format!("Admin commands: {}", SUBCOMMANDS.join(", ")));
    };

    match sub.to_lowercase().as_str() {
        "create" => {
            let Some(name) = args.get(1) else {
                return usage("/qadmin create <quest>");
            };
            match engine.quests_mut().create(name) {
                Ok(quest) => Reply::line(format!("Quest {} successfully created!", quest.name)).quests(),
                Err(e) => Reply::line(e),
            }
        }
        "delete" => {
            let Some(name) = args.get(1) else {
                return usage("/qadmin delete <quest>");
            };
            if !engine.quests().contains(name) {
                return Reply::line(format!("Quest {} does not exist", name));
            }
            let touched = engine.reset_quest_for_all_players(name, false);
            match engine.quests_mut().delete(name) {
                Some(quest) => Reply::line(format!(
                    "Quest {} successfully deleted! It was removed from {} players.",
                    quest.name, touched
                ))
                .quests(),
                None => Reply::line(format!("Quest {} does not exist", name)),
            }
        }
        "edit" => edit::execute(engine, &args[1..]),
        "give" | "forcegive" => {
            let force = sub.eq_ignore_ascii_case("forcegive");
            let (Some(player_name), Some(quest_name)) = (args.get(1), args.get(2)) else {
                return usage(&format!("/qadmin {} <player> <quest>", sub));
            };
            let uuid = match resolve_player(engine, player_name) {
                Ok(uuid) => uuid,
                Err(e) => return Reply::line(e),
            };
            if !engine.quests().contains(quest_name) {
                return Reply::line(format!("Quest {} does not exist", quest_name));
            }
            let result = if force {
                engine.force_accept_quest(uuid, quest_name)
            } else {
                engine.accept_quest(uuid, quest_name, false, false)
            };
            Reply::line(result)
        }
        "failquest" | "completequest" => {
            let (Some(player_name), Some(quest_name)) = (args.get(1), args.get(2)) else {
                return usage(&format!("/qadmin {} <player> <quest>", sub));
            };
            let uuid = match resolve_player(engine, player_name) {
                Ok(uuid) => uuid,
                Err(e) => return Reply::line(e),
            };
            let display = engine.host().display_name(uuid);
            let fail = sub.eq_ignore_ascii_case("failquest");
            let done = if fail {
                engine.fail_quest(uuid, quest_name)
            } else {
                engine.force_active_quest_completed(uuid, quest_name)
            };
            match (done, fail) {
                (true, true) => Reply::line(format!(
                    "The active quest {} has been failed for player {} !",
                    quest_name, display
                )),
                (true, false) => Reply::line(format!(
                    "The active quest {} has been completed for player {} !",
                    quest_name, display
                )),
                (false, _) => Reply::line(format!(
                    "Player {} does not have the quest {} active.",
                    display, quest_name
                )),
            }
        }
        "listallquests" => {
            let mut lines = vec![format!("All Quests ({}):", engine.quests().len())];
            for (i, quest) in engine.quests().all().enumerate() {
                lines.push(format!("{}. {}", i + 1, quest.name));
            }
            Reply::lines(lines)
        }
        "activequests" => {
            let Some(player_name) = args.get(1) else {
                return usage("/qadmin activeQuests <player>");
            };
            let uuid = match resolve_player(engine, player_name) {
                Ok(uuid) => uuid,
                Err(e) => return Reply::line(e),
            };
            let lines = player::active_quest_lines(engine, uuid);
            if lines.is_empty() {
                return Reply::line(format!("Player {} seems to not have accepted any quests!", player_name));
            }
            let mut reply = vec![format!("Active quests of player {}:", player_name)];
            reply.extend(lines);
            reply.push(format!("Total active quests: {}.", reply.len() - 1));
            Reply::lines(reply)
        }
        "completedquests" => {
            let Some(player_name) = args.get(1) else {
                return usage("/qadmin completedQuests <player>");
            };
            let uuid = match resolve_player(engine, player_name) {
                Ok(uuid) => uuid,
                Err(e) => return Reply::line(e),
            };
            completed_quests(engine, uuid, player_name)
        }
        "progress" => {
            let (Some(player_name), Some(quest_name)) = (args.get(1), args.get(2)) else {
                return usage("/qadmin progress <player> <quest>");
            };
            let uuid = match resolve_player(engine, player_name) {
                Ok(uuid) => uuid,
                Err(e) => return Reply::line(e),
            };
            let lines = player::progress_lines(engine, uuid, quest_name);
            if lines.is_empty() {
                Reply::line(format!(
                    "Player {} does not have the quest {} active.",
                    player_name, quest_name
                ))
            } else {
                Reply::lines(lines)
            }
        }
        "questpoints" => quest_points(engine, &args[1..]),
        "triggerobjective" => {
            let (Some(trigger_name), Some(player_name)) = (args.get(1), args.get(2)) else {
                return usage("/qadmin triggerObjective <trigger> <player>");
            };
            let uuid = match resolve_player(engine, player_name) {
                Ok(uuid) => uuid,
                Err(e) => return Reply::line(e),
            };
            if !engine.quests().trigger_name_exists(trigger_name) {
                return Reply::line(format!(
                    "No TriggerCommand objective uses the trigger {}",
                    trigger_name
                ));
            }
            let updates = engine.trigger_objective(trigger_name, uuid);
            Reply::line(format!(
                "Triggered {} for player {} ({} objectives progressed).",
                trigger_name,
                player_name,
                updates.len()
            ))
        }
        "variables" => variables(engine, &args[1..]),
        "actions" => actions(engine, &args[1..]),
        "listobjectivetypes" => type_list("Objective types", OBJECTIVE_TYPES),
        "listrequirementtypes" => type_list("Requirement types", CONDITION_TYPES),
        "listrewardtypes" => type_list("Reward types", ACTION_TYPES),
        "listvariables" => list_variables(engine),
        "listplaceholders" => {
            let mut lines = vec!["All Placeholders (Case-sensitive):".to_string()];
            for (token, description) in COMMAND_PLACEHOLDERS {
                lines.push(format!("{} - {}", token, description));
            }
            Reply::lines(lines)
        }
        "resetandremovequestforallplayers" | "resetandfailquestforallplayers" => {
            let Some(quest_name) = args.get(1) else {
                return usage(&format!("/qadmin {} <quest>", sub));
            };
            if !engine.quests().contains(quest_name) {
                return Reply::line(format!("Quest {} does not exist", quest_name));
            }
            let fail = sub.eq_ignore_ascii_case("resetandfailquestforallplayers");
            let touched = engine.reset_quest_for_all_players(quest_name, fail);
            Reply::line(format!(
                "The quest {} has been reset for {} players.",
                quest_name, touched
            ))
        }
        "save" => {
            engine.mark_all_dirty();
            info!("Save requested by {:?}", sender);
            Reply::line("Quests, actions and player data have been saved.")
                .quests()
                .actions()
        }
        "reload" => reload(engine, files),
        other => Reply::line(format!("Unknown subcommand: {}", other)),
    }
}

fn completed_quests(engine: &QuestEngine, uuid: Uuid, player_name: &str) -> Reply {
    let completed = engine
        .get_quest_player(uuid)
        .map(|p| p.completed_quests.clone())
        .unwrap_or_default();
    if completed.is_empty() {
        return Reply::line(format!("Player {} has not completed any quests!", player_name));
    }

    let mut lines = vec![format!("Completed quests of player {}:", player_name)];
    for (i, record) in completed.iter().enumerate() {
        lines.push(format!(
            "{}. {}. Completed: {}",
            i + 1,
            record.quest_name,
            record.completed_at.format("%Y-%m-%d %H:%M:%S")
        ));
    }
    lines.push(format!("Total completed quests: {}.", completed.len()));
    Reply::lines(lines)
}

/// `questPoints <player> show|set|add|remove [amount]`
fn quest_points(engine: &mut QuestEngine, args: &[String]) -> Reply {
    let (Some(player_name), Some(action)) = (args.first(), args.get(1)) else {
        return usage("/qadmin questPoints <player> show|set|add|remove [amount]");
    };
    let uuid = match resolve_player(engine, player_name) {
        Ok(uuid) => uuid,
        Err(e) => return Reply::line(e),
    };

    let action = action.to_lowercase();
    if action == "show" {
        let points = engine
            .get_quest_player(uuid)
            .map(|p| p.quest_points)
            .unwrap_or(0);
        return Reply::line(format!("Quest points for player {}: {}", player_name, points));
    }

    let amount = match args.get(2).map(|raw| raw.parse::<i64>()) {
        Some(Ok(amount)) if amount >= 0 => amount,
        Some(_) => return Reply::line("The amount must be a positive whole number."),
        None => return usage(&format!("/qadmin questPoints <player> {} <amount>", action)),
    };

    match action.as_str() {
        "set" => {
            engine.set_quest_points(uuid, amount);
            Reply::line(format!(
                "Quest points for player {} have been set to {}.",
                player_name, amount
            ))
        }
        "add" => {
            let total = engine.add_quest_points(uuid, amount);
            Reply::line(format!(
                "Quest points for player {} have been increased by {}. New total: {}",
                player_name, amount, total
            ))
        }
        "remove" => {
            let total = engine.add_quest_points(uuid, -amount);
            Reply::line(format!(
                "Quest points for player {} have been reduced by {}. New total: {}",
                player_name, amount, total
            ))
        }
        other => Reply::line(format!("Unknown quest point action: {}", other)),
    }
}

/// `variables get <variable> <player> [args…]` / `variables set <variable> <player> <value> [args…]`
fn variables(engine: &mut QuestEngine, args: &[String]) -> Reply {
    let (Some(mode), Some(requested), Some(player_name)) = (args.first(), args.get(1), args.get(2)) else {
        return usage("/qadmin variables get|set <variable> <player> [value] [arguments...]");
    };
    let identifier = match engine.require_variable(requested) {
        Ok(identifier) => identifier,
        Err(e) => return Reply::line(e.to_string()),
    };
    let uuid = match resolve_player(engine, player_name) {
        Ok(uuid) => uuid,
        Err(e) => return Reply::line(e),
    };
    let Some(variable) = engine.variables().lookup(&identifier) else {
        return Reply::line(format!("Variable {} does not exist", identifier));
    };

    match mode.to_lowercase().as_str() {
        "get" => {
            let extra = &args[3..];
            let variable_args = match VariableArgs::from_positional(variable.as_ref(), extra) {
                Ok(variable_args) => variable_args,
                Err(missing) => return Reply::line(format!("Missing argument <{}>", missing)),
            };
            match engine.get_variable(uuid, &identifier, &variable_args) {
                Some(value) => Reply::line(format!(
                    "{} for player {}: {}",
                    identifier,
                    player_name,
                    value.display()
                )),
                None => Reply::line(format!("{} has no value for player {}.", identifier, player_name)),
            }
        }
        "set" => {
            if !variable.can_set_value() {
                return Reply::line(format!("Variable {} cannot be set.", identifier));
            }
            let Some(raw) = args.get(3) else {
                return usage("/qadmin variables set <variable> <player> <value> [arguments...]");
            };
            let variable_args = match VariableArgs::from_positional(variable.as_ref(), &args[4..]) {
                Ok(variable_args) => variable_args,
                Err(missing) => return Reply::line(format!("Missing argument <{}>", missing)),
            };
            let value = match variable.data_type() {
                VariableDataType::Boolean => match parse_bool(raw) {
                    Some(b) => VariableValue::Boolean(b),
                    None => return Reply::line(format!("'{}' is not true or false.", raw)),
                },
                VariableDataType::Number => match engine.evaluate_expression(raw, uuid, &variable_args) {
                    Ok(n) => VariableValue::Number(n),
                    Err(e) => return Reply::line(format!("Invalid value '{}': {}", raw, e)),
                },
                VariableDataType::String => VariableValue::String(raw.clone()),
                VariableDataType::List => VariableValue::List(
                    raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
                ),
                VariableDataType::ItemStackList => {
                    return Reply::line(format!("Variable {} cannot be set from a command.", identifier));
                }
            };
            if engine.set_variable(uuid, &identifier, value.clone(), &variable_args) {
                Reply::line(format!(
                    "{} has been set to {} for player {}.",
                    identifier,
                    value.display(),
                    player_name
                ))
            } else {
                Reply::line(format!("{} could not be set for player {}.", identifier, player_name))
            }
        }
        other => Reply::line(format!("Unknown variables action: {}", other)),
    }
}

/// `actions add|edit|list|execute`
fn actions(engine: &mut QuestEngine, args: &[String]) -> Reply {
    let Some(mode) = args.first() else {
        return usage("/qadmin actions add|edit|list|execute ...");
    };

    match mode.to_lowercase().as_str() {
        "add" => {
            let Some(name) = args.get(1) else {
                return usage("/qadmin actions add <name> <type> [arguments...]");
            };
            if engine.actions().contains(name) {
                return Reply::line(format!("Action {} already exists!", name));
            }
            match parse_action(engine, &args[2..]) {
                Ok(action) => {
                    engine.actions_mut().insert(name, action);
                    Reply::line(format!("Action {} successfully created!", name)).actions()
                }
                Err(e) => Reply::line(e),
            }
        }
        "edit" => {
            let (Some(name), Some(field)) = (args.get(1), args.get(2)) else {
                return usage("/qadmin actions edit <name> delete|info|displayName [value]");
            };
            let Some(action) = engine.actions().get(name).cloned() else {
                return Reply::line(format!("Action {} does not exist", name));
            };
            match field.to_lowercase().as_str() {
                "delete" => {
                    engine.actions_mut().remove(name);
                    Reply::line(format!("Action {} successfully deleted!", name)).actions()
                }
                "info" => Reply::lines(vec![
                    format!("Action {}:", name),
                    format!("Type: {}", action.kind.type_name()),
                    action.description_line(),
                ]),
                "displayname" => {
                    if args.len() < 4 {
                        return usage("/qadmin actions edit <name> displayName <display name>");
                    }
                    let display_name = args[3..].join(" ");
                    let mut action = action;
                    action.name = display_name.clone();
                    engine.actions_mut().insert(name, action);
                    Reply::line(format!(
                        "Display name of action {} has been set to {}!",
                        name, display_name
                    ))
                    .actions()
                }
                other => Reply::line(format!("Unknown action edit field: {}", other)),
            }
        }
        "list" => {
            let mut lines = vec![format!("All Actions ({}):", engine.actions().len())];
            for (i, (name, action)) in engine.actions().iter().enumerate() {
                lines.push(format!("{}. {} [{}]", i + 1, name, action.kind.type_name()));
                lines.push(format!("   {}", action.description_line()));
            }
            Reply::lines(lines)
        }
        "execute" => {
            let (Some(name), Some(player_name)) = (args.get(1), args.get(2)) else {
                return usage("/qadmin actions execute <name> <player>");
            };
            let uuid = match resolve_player(engine, player_name) {
                Ok(uuid) => uuid,
                Err(e) => return Reply::line(e),
            };
            if engine.execute_named_action(uuid, name, None) {
                Reply::line(format!("Action {} has been executed for player {}.", name, player_name))
            } else {
                Reply::line(format!("Action {} does not exist", name))
            }
        }
        other => Reply::line(format!("Unknown actions subcommand: {}", other)),
    }
}

fn type_list(title: &str, types: &[&str]) -> Reply {
    let mut lines = vec![format!("{}:", title)];
    lines.extend(types.iter().map(|t| format!("- {}", t)));
    Reply::lines(lines)
}

fn list_variables(engine: &QuestEngine) -> Reply {
    let mut lines = vec![format!("All Variables ({}):", engine.variables().len())];
    for identifier in engine.variables().identifiers() {
        let Some(variable) = engine.variables().lookup(identifier) else {
            continue;
        };
        let mut line = format!("- {} ({})", identifier, variable.data_type().as_str());
        if variable.can_set_value() {
            line.push_str(" [settable]");
        }
        let required: Vec<&str> = variable
            .required_strings()
            .iter()
            .chain(variable.required_numbers())
            .chain(variable.required_booleans())
            .copied()
            .collect();
        if !required.is_empty() {
            line.push_str(&format!(" arguments: {}", required.join(", ")));
        }
        lines.push(line);
    }
    Reply::lines(lines)
}

fn reload(engine: &mut QuestEngine, files: &DataFiles) -> Reply {
    let quests = match QuestStore::load(&files.quests) {
        Ok(quests) => quests,
        Err(e) => {
            warn!("Reload of {:?} failed: {}", files.quests, e);
            return Reply::line(format!("Quests could not be reloaded: {}", e));
        }
    };
    let actions = match ActionStore::load(&files.actions) {
        Ok(actions) => actions,
        Err(e) => {
            warn!("Reload of {:?} failed: {}", files.actions, e);
            return Reply::line(format!("Actions could not be reloaded: {}", e));
        }
    };
    let (quest_count, action_count) = (quests.len(), actions.len());
    engine.replace_definitions(quests, actions);
    Reply::line(format!(
        "Reloaded {} quests and {} actions.",
        quest_count, action_count
    ))
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "true" | "yes" | "on" => Some(true),
        "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse `<Type> <args…> [--negate]` into a condition, checking that any
/// integration it needs is present
pub(crate) fn parse_condition(engine: &QuestEngine, args: &[String]) -> Result<Condition, String> {
    let negated = args.iter().any(|a| a.eq_ignore_ascii_case("--negate"));
    let args: Vec<String> = args
        .iter()
        .filter(|a| !a.eq_ignore_ascii_case("--negate"))
        .cloned()
        .collect();
    let Some((condition_type, rest)) = args.split_first() else {
        return Err(format!("Missing condition type. Available: {}", CONDITION_TYPES.join(", ")));
    };

    let kind = ConditionKind::from_args(condition_type, rest, engine.variables())?;
    check_condition_support(engine, &kind)?;

    let mut condition = Condition::new(kind);
    condition.negated = negated;
    Ok(condition)
}

/// Reject conditions whose integration is missing or whose quest is unknown
pub(crate) fn check_condition_support(engine: &QuestEngine, kind: &ConditionKind) -> Result<(), String> {
    let host = engine.host();
    match kind {
        ConditionKind::Money { .. } if host.economy.is_none() => {
            Err("The server does not have an economy plugin enabled".to_string())
        }
        ConditionKind::UltimateClansClanLevel { .. } if host.clans.is_none() => {
            Err("The server does not have the UltimateClans integration enabled".to_string())
        }
        ConditionKind::TownyNationName { .. } if host.nations.is_none() => {
            Err("The server does not have the Towny integration enabled".to_string())
        }
        ConditionKind::OtherQuest { other_quest_name, .. } if !engine.quests().contains(other_quest_name) => {
            Err(format!("Quest {} does not exist", other_quest_name))
        }
        _ => Ok(()),
    }
}

/// Parse `<Type> <args…>` into an action
pub(crate) fn parse_action(engine: &QuestEngine, args: &[String]) -> Result<Action, String> {
    let Some((action_type, rest)) = args.split_first() else {
        return Err(format!("Missing action type. Available: {}", ACTION_TYPES.join(", ")));
    };
    let kind = ActionKind::from_args(action_type, rest, engine.variables())?;
    match &kind {
        ActionKind::GiveMoney { .. } if engine.host().economy.is_none() => {
            return Err("The server does not have an economy plugin enabled".to_string());
        }
        ActionKind::Action { action_name } if !engine.actions().contains(action_name) => {
            return Err(format!("Action {} does not exist", action_name));
        }
        _ => {}
    }
    Ok(Action::new(kind))
}
