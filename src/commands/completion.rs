//! Tab Completion
//!
//! Suggestions per argument position. Only reads definitions and registry
//! data, so it is safe to call while a command is being prepared.

use super::edit::{EDIT_FIELDS, LIST_OPERATIONS, OBJECTIVE_EDIT_FIELDS};
use super::{admin, player, tokenize, CommandSender, ADMIN_ALIASES, PLAYER_ALIASES};
use crate::action::ACTION_TYPES;
use crate::condition::CONDITION_TYPES;
use crate::engine::QuestEngine;
use crate::objective::OBJECTIVE_TYPES;
use crate::quest::TriggerType;
use crate::variable::VariableArgs;

const BOOLEANS: &[&str] = &["true", "false"];

/// Suggestions for the last (possibly empty) word of a partial command line
pub fn complete(engine: &QuestEngine, sender: CommandSender, line: &str) -> Vec<String> {
    let line = line.trim_start().trim_start_matches('/');
    let mut tokens = tokenize(line);
    if tokens.is_empty() || line.ends_with(char::is_whitespace) {
        tokens.push(String::new());
    }
    let Some((partial, previous)) = tokens.split_last() else {
        return Vec::new();
    };

    let candidates = match previous.split_first() {
        None => ADMIN_ALIASES
            .iter()
            .chain(PLAYER_ALIASES)
            .map(|s| s.to_string())
            .collect(),
        Some((root, args)) => {
            let root = root.to_lowercase();
            if ADMIN_ALIASES.contains(&root.as_str()) {
                admin_candidates(engine, args)
            } else if PLAYER_ALIASES.contains(&root.as_str()) {
                player_candidates(engine, sender, args)
            } else {
                Vec::new()
            }
        }
    };

    let prefix = partial.to_lowercase();
    let mut matches: Vec<String> = Vec::new();
    for candidate in candidates {
        if candidate.to_lowercase().starts_with(&prefix) && !matches.contains(&candidate) {
            matches.push(candidate);
        }
    }
    matches
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn quest_names(engine: &QuestEngine) -> Vec<String> {
    engine.quests().names()
}

fn online_players(engine: &QuestEngine) -> Vec<String> {
    engine.host().server.online_players()
}

fn action_names(engine: &QuestEngine) -> Vec<String> {
    engine.actions().names().cloned().collect()
}

fn trigger_types() -> Vec<String> {
    TriggerType::ALL.iter().map(|t| t.as_str().to_string()).collect()
}

fn trigger_names(engine: &QuestEngine) -> Vec<String> {
    engine
        .quests()
        .all()
        .flat_map(|q| q.objectives.iter().filter_map(|o| o.trigger_name()))
        .map(|name| name.to_string())
        .collect()
}

fn objective_ids(engine: &QuestEngine, quest_name: &str) -> Vec<String> {
    engine
        .quests()
        .get(quest_name)
        .map(|q| q.objectives.iter().map(|o| o.id.to_string()).collect())
        .unwrap_or_default()
}

fn player_candidates(engine: &QuestEngine, sender: CommandSender, args: &[String]) -> Vec<String> {
    let Some(sub) = args.first() else {
        return owned(player::SUBCOMMANDS);
    };
    if args.len() != 1 {
        return Vec::new();
    }
    match sub.to_lowercase().as_str() {
        "take" => engine
            .quests()
            .all()
            .filter(|q| q.take_enabled)
            .map(|q| q.name.clone())
            .collect(),
        "abort" | "progress" => match sender {
            CommandSender::Player(uuid) => engine
                .get_quest_player(uuid)
                .map(|p| p.active_quests.iter().map(|a| a.quest_name.clone()).collect())
                .unwrap_or_default(),
            CommandSender::Console => quest_names(engine),
        },
        _ => Vec::new(),
    }
}

fn admin_candidates(engine: &QuestEngine, args: &[String]) -> Vec<String> {
    let Some((sub, rest)) = args.split_first() else {
        return owned(admin::SUBCOMMANDS);
    };
    let position = rest.len();

    match sub.to_lowercase().as_str() {
        "delete" | "resetandremovequestforallplayers" | "resetandfailquestforallplayers" if position == 0 => {
            quest_names(engine)
        }
        "give" | "forcegive" | "failquest" | "completequest" | "progress" => match position {
            0 => online_players(engine),
            1 => quest_names(engine),
            _ => Vec::new(),
        },
        "activequests" | "completedquests" if position == 0 => online_players(engine),
        "questpoints" => match position {
            0 => online_players(engine),
            1 => owned(&["show", "set", "add", "remove"]),
            _ => Vec::new(),
        },
        "triggerobjective" => match position {
            0 => trigger_names(engine),
            1 => online_players(engine),
            _ => Vec::new(),
        },
        "variables" => variable_candidates(engine, rest),
        "actions" => match (position, rest.first().map(|s| s.to_lowercase())) {
            (0, _) => owned(&["add", "edit", "list", "execute"]),
            (1, Some(op)) if op == "edit" || op == "execute" => action_names(engine),
            (2, Some(op)) if op == "add" => owned(ACTION_TYPES),
            (2, Some(op)) if op == "edit" => owned(&["delete", "info", "displayName"]),
            (2, Some(op)) if op == "execute" => online_players(engine),
            _ => Vec::new(),
        },
        "edit" => edit_candidates(engine, rest),
        _ => Vec::new(),
    }
}

/// `variables get|set <variable> <player> [value]`
fn variable_candidates(engine: &QuestEngine, rest: &[String]) -> Vec<String> {
    match rest.len() {
        0 => owned(&["get", "set"]),
        1 => engine.variables().identifiers().to_vec(),
        2 => online_players(engine),
        3 if rest[0].eq_ignore_ascii_case("set") => {
            let Some(variable) = engine.variables().lookup(&rest[1]) else {
                return Vec::new();
            };
            let player = engine
                .resolve_player(&rest[2])
                .and_then(|uuid| engine.get_quest_player(uuid));
            variable.possible_values(&engine.ctx(), player, &VariableArgs::default())
        }
        _ => Vec::new(),
    }
}

/// `edit <quest> <field> …`
fn edit_candidates(engine: &QuestEngine, rest: &[String]) -> Vec<String> {
    let Some((quest_name, rest)) = rest.split_first() else {
        return quest_names(engine);
    };
    let Some((field, rest)) = rest.split_first() else {
        return owned(EDIT_FIELDS);
    };
    let words: Vec<String> = rest.iter().map(|s| s.to_lowercase()).collect();
    let words: Vec<&str> = words.iter().map(|s| s.as_str()).collect();

    match (field.to_lowercase().as_str(), words.as_slice()) {
        ("takeenabled", []) => owned(BOOLEANS),
        ("requirements" | "rewards", []) => owned(LIST_OPERATIONS),
        ("requirements", ["add"]) => owned(CONDITION_TYPES),
        ("requirements", ["add", "boolean" | "number" | "string"]) => engine.variables().identifiers().to_vec(),
        ("requirements", ["add", "otherquest"]) => quest_names(engine),
        ("rewards", ["add"]) => owned(ACTION_TYPES),
        ("rewards", ["add", "action"]) => action_names(engine),
        ("triggers", []) => owned(&["add", "list", "remove", "clear"]),
        ("triggers", ["add"]) => trigger_types(),
        ("triggers", ["add", _]) => action_names(engine),
        ("triggers", ["add", _, _]) => {
            let mut ids = vec!["0".to_string()];
            ids.extend(objective_ids(engine, quest_name));
            ids
        }
        ("triggers", ["add", _, _, _]) => vec!["ALL".to_string()],
        ("npcs", []) => owned(&["add", "remove", "list", "clear"]),
        ("objectives", []) => owned(&["add", "list", "clear", "edit"]),
        ("objectives", ["add"]) => owned(OBJECTIVE_TYPES),
        ("objectives", ["add", "condition"]) => owned(CONDITION_TYPES),
        ("objectives", ["add", "otherquest"]) => quest_names(engine),
        ("objectives", ["add", "craftitems" | "collectitems"]) => vec!["any".to_string()],
        ("objectives", ["edit"]) => objective_ids(engine, quest_name),
        ("objectives", ["edit", _]) => owned(OBJECTIVE_EDIT_FIELDS),
        ("objectives", ["edit", _, "conditions" | "rewards"]) => owned(LIST_OPERATIONS),
        ("objectives", ["edit", _, "conditions", "add"]) => owned(CONDITION_TYPES),
        ("objectives", ["edit", _, "rewards", "add"]) => owned(ACTION_TYPES),
        ("objectives", ["edit", _, "dependencies"]) => owned(&["add", "remove", "list", "clear"]),
        ("objectives", ["edit", id, "dependencies", "add" | "remove"]) => objective_ids(engine, quest_name)
            .into_iter()
            .filter(|other| other.as_str() != *id)
            .collect(),
        ("objectives", ["edit", _, "showlocation" | "checkonlywhenvariablechanges"]) => owned(BOOLEANS),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::Harness;

    fn console(h: &Harness, line: &str) -> Vec<String> {
        complete(&h.engine, CommandSender::Console, line)
    }

    #[test]
    fn test_root_and_subcommands() {
        let h = Harness::new();
        assert_eq!(console(&h, "/nq"), vec!["nqa", "nq"]);
        assert!(console(&h, "qadmin ").contains(&"listAllQuests".to_string()));
        assert_eq!(console(&h, "qadmin lista"), vec!["listAllQuests"]);
        assert_eq!(console(&h, "qadmin RESETANDF"), vec!["resetAndFailQuestForAllPlayers"]);
        assert!(console(&h, "unknown ").is_empty());
    }

    #[test]
    fn test_quest_and_player_arguments() {
        let mut h = Harness::new();
        h.console("qadmin create Miner");
        h.console("qadmin create Farmer");
        h.console("qadmin edit Farmer takeEnabled false");
        h.host.add_player("Steve");

        assert_eq!(console(&h, "qadmin give "), vec!["Steve"]);
        assert_eq!(console(&h, "qadmin give Steve M"), vec!["Miner"]);
        assert_eq!(console(&h, "nq take "), vec!["Miner"]);
        assert_eq!(console(&h, "qadmin edit miner ob"), vec!["objectives"]);
        assert!(console(&h, "qadmin edit Miner objectives add ").contains(&"TriggerCommand".to_string()));
    }

    #[test]
    fn test_nested_edit_arguments() {
        let mut h = Harness::new();
        h.console("qadmin create Miner");
        h.console("qadmin edit Miner objectives add CraftItems chest");
        h.console("qadmin edit Miner objectives add TriggerCommand done");
        h.console("qadmin actions add bonus GiveQuestPoints 1");

        assert_eq!(console(&h, "qadmin edit Miner objectives edit "), vec!["1", "2"]);
        assert_eq!(
            console(&h, "qadmin edit Miner objectives edit 2 dependencies add "),
            vec!["1"]
        );
        assert_eq!(console(&h, "qadmin edit Miner triggers add BEGIN "), vec!["bonus"]);
        assert_eq!(console(&h, "qadmin edit Miner triggers add BEGIN bonus "), vec!["0", "1", "2"]);
        assert_eq!(console(&h, "qadmin triggerObjective "), vec!["done"]);
        assert!(console(&h, "qadmin variables get Q").contains(&"QuestPoints".to_string()));
        assert_eq!(console(&h, "qadmin variables set Tag Steve "), vec!["true", "false"]);
    }
}
