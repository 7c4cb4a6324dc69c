//! Actions and Rewards
//!
//! Side-effecting operations run as quest/objective rewards, by triggers, or
//! by admins. Execution lives in the engine because setting a variable has to
//! go through change propagation.

pub mod store;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::variable::{VariableArgs, VariableDataType, VariableRegistry};

pub use store::ActionStore;

/// Persisted form of an action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAction {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default)]
    pub specifics: toml::Table,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

fn default_item_amount() -> u32 {
    1
}

/// Every action type and its type-specific fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "specifics", rename_all_fields = "camelCase")]
pub enum ActionKind {
    ConsoleCommand {
        console_command: String,
    },
    GiveMoney {
        money_amount: f64,
    },
    GiveQuestPoints {
        quest_points_amount: i64,
    },
    GiveItem {
        item: String,
        #[serde(default = "default_item_amount")]
        amount: u32,
    },
    Boolean {
        variable_name: String,
        operator: String,
        expression: String,
        #[serde(default)]
        additional_strings: BTreeMap<String, String>,
    },
    Number {
        variable_name: String,
        operator: String,
        expression: String,
        #[serde(default)]
        additional_strings: BTreeMap<String, String>,
    },
    Action {
        action_name: String,
    },
}

/// Type identifiers accepted by `rewards add` / `actions add`
pub const ACTION_TYPES: &[&str] = &[
    "ConsoleCommand",
    "GiveMoney",
    "GiveQuestPoints",
    "GiveItem",
    "Boolean",
    "Number",
    "Action",
];

/// Tokens replaced in console commands before dispatch
pub const COMMAND_PLACEHOLDERS: &[(&str, &str)] = &[
    ("{PLAYER}", "Name of the player"),
    ("{PLAYERUUID}", "UUID of the player"),
    ("{QUEST}", "Relevant quest name"),
];

pub const BOOLEAN_OPERATORS: &[&str] = &["set", "setNot"];
pub const NUMBER_OPERATORS: &[&str] = &["set", "add", "deduct", "multiply", "divide"];

impl ActionKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ActionKind::ConsoleCommand { .. } => "ConsoleCommand",
            ActionKind::GiveMoney { .. } => "GiveMoney",
            ActionKind::GiveQuestPoints { .. } => "GiveQuestPoints",
            ActionKind::GiveItem { .. } => "GiveItem",
            ActionKind::Boolean { .. } => "Boolean",
            ActionKind::Number { .. } => "Number",
            ActionKind::Action { .. } => "Action",
        }
    }

    /// Build an action from command arguments (everything after the type).
    /// A console command takes the rest of the line.
    pub fn from_args(action_type: &str, args: &[String], variables: &VariableRegistry) -> Result<Self, String> {
        let arg = |i: usize, name: &str| -> Result<String, String> {
            args.get(i)
                .cloned()
                .ok_or_else(|| format!("Missing argument <{}> for {} action", name, action_type))
        };

        let kind = match action_type.to_lowercase().as_str() {
            "consolecommand" => {
                if args.is_empty() {
                    return Err("Missing argument <command> for ConsoleCommand action".to_string());
                }
                ActionKind::ConsoleCommand {
                    console_command: args.join(" ").trim_start_matches('/').to_string(),
                }
            }
            "givemoney" => {
                let raw = arg(0, "amount")?;
                ActionKind::GiveMoney {
                    money_amount: raw
                        .parse()
                        .map_err(|_| format!("'{}' is not a valid amount of money", raw))?,
                }
            }
            "givequestpoints" => {
                let raw = arg(0, "amount")?;
                ActionKind::GiveQuestPoints {
                    quest_points_amount: raw
                        .parse()
                        .map_err(|_| format!("'{}' is not a valid number of quest points", raw))?,
                }
            }
            "giveitem" => {
                let item = arg(0, "item")?;
                let amount = match args.get(1) {
                    Some(raw) => raw
                        .parse()
                        .map_err(|_| format!("'{}' is not a valid item amount", raw))?,
                    None => 1,
                };
                ActionKind::GiveItem { item, amount }
            }
            "boolean" | "number" => {
                let wanted = if action_type.eq_ignore_ascii_case("boolean") {
                    VariableDataType::Boolean
                } else {
                    VariableDataType::Number
                };
                let requested = arg(0, "variable")?;
                let variable_name = variables
                    .canonical(&requested)
                    .ok_or_else(|| format!("Variable '{}' does not exist", requested))?
                    .to_string();
                let variable = variables
                    .lookup(&variable_name)
                    .ok_or_else(|| format!("Variable '{}' could not be created", variable_name))?;
                if !variable.can_set_value() || variable.data_type() != wanted {
                    return Err(format!(
                        "Variable '{}' cannot be set by a {} action",
                        variable_name, action_type
                    ));
                }
                let operator = arg(1, "operator")?;
                let allowed = if wanted == VariableDataType::Boolean {
                    BOOLEAN_OPERATORS
                } else {
                    NUMBER_OPERATORS
                };
                if !allowed.iter().any(|op| op.eq_ignore_ascii_case(&operator)) {
                    return Err(format!("Invalid operator '{}'", operator));
                }
                let expression = arg(2, "expression")?;
                let extra: Vec<String> = args.iter().skip(3).cloned().collect();
                let additional_strings = VariableArgs::from_positional(variable.as_ref(), &extra)
                    .map_err(|missing| format!("Missing argument <{}> for variable {}", missing, variable_name))?
                    .strings;

                if wanted == VariableDataType::Boolean {
                    ActionKind::Boolean { variable_name, operator, expression, additional_strings }
                } else {
                    ActionKind::Number { variable_name, operator, expression, additional_strings }
                }
            }
            "action" => ActionKind::Action {
                action_name: arg(0, "action name")?,
            },
            _ => return Err(format!("Unknown action type '{}'", action_type)),
        };
        Ok(kind)
    }
}

/// An action with an optional display name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    pub kind: ActionKind,
    pub name: String,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self { kind, name: String::new() }
    }

    pub fn from_raw(raw: &RawAction) -> Result<Self, String> {
        let mut tagged = toml::Table::new();
        tagged.insert("type".to_string(), toml::Value::String(raw.action_type.clone()));
        tagged.insert("specifics".to_string(), toml::Value::Table(raw.specifics.clone()));

        let kind: ActionKind = toml::Value::Table(tagged)
            .try_into()
            .map_err(|e| format!("Invalid {} action: {}", raw.action_type, e))?;

        Ok(Self { kind, name: raw.name.clone() })
    }

    pub fn to_raw(&self) -> RawAction {
        let specifics = match toml::Value::try_from(&self.kind) {
            Ok(toml::Value::Table(mut table)) => match table.remove("specifics") {
                Some(toml::Value::Table(specifics)) => specifics,
                _ => toml::Table::new(),
            },
            Ok(_) | Err(_) => {
                warn!("Failed to serialize {} action", self.kind.type_name());
                toml::Table::new()
            }
        };

        RawAction {
            action_type: self.kind.type_name().to_string(),
            specifics,
            name: self.name.clone(),
        }
    }

    /// The variable this action writes, if any
    pub fn variable_name(&self) -> Option<&str> {
        match &self.kind {
            ActionKind::Boolean { variable_name, .. } | ActionKind::Number { variable_name, .. } => {
                Some(variable_name)
            }
            ActionKind::GiveMoney { .. } => Some("Money"),
            ActionKind::GiveQuestPoints { .. } => Some("QuestPoints"),
            _ => None,
        }
    }

    /// One-line summary for listings
    pub fn description_line(&self) -> String {
        let body = match &self.kind {
            ActionKind::ConsoleCommand { console_command } => format!("Console command: /{}", console_command),
            ActionKind::GiveMoney { money_amount } => format!("Money: {}", money_amount),
            ActionKind::GiveQuestPoints { quest_points_amount } => {
                format!("Quest points: {}", quest_points_amount)
            }
            ActionKind::GiveItem { item, amount } => format!("Item: {}x {}", amount, item),
            ActionKind::Boolean { variable_name, operator, expression, .. }
            | ActionKind::Number { variable_name, operator, expression, .. } => {
                format!("{} {} {}", variable_name, operator, expression)
            }
            ActionKind::Action { action_name } => format!("Run action: {}", action_name),
        };
        if self.name.is_empty() {
            format!("-- {}", body)
        } else {
            format!("-- {} ({})", self.name, body)
        }
    }
}

/// Apply a number operator to the current value
pub fn apply_number_operator(operator: &str, current: f64, operand: f64) -> Option<f64> {
    match operator.to_lowercase().as_str() {
        "set" => Some(operand),
        "add" => Some(current + operand),
        "deduct" => Some(current - operand),
        "multiply" => Some(current * operand),
        "divide" if operand != 0.0 => Some(current / operand),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IntegrationsConfig;

    #[test]
    fn test_console_command_joins_rest_of_line() {
        let registry = VariableRegistry::new();
        let args: Vec<String> = vec!["/say".into(), "hi".into(), "{PLAYER}".into()];
        let kind = ActionKind::from_args("ConsoleCommand", &args, &registry).unwrap();
        assert_eq!(
            kind,
            ActionKind::ConsoleCommand { console_command: "say hi {PLAYER}".to_string() }
        );
    }

    #[test]
    fn test_read_only_variable_rejected() {
        let registry = VariableRegistry::with_defaults(&IntegrationsConfig::default());
        let args: Vec<String> = vec!["ActiveQuests".into(), "set".into(), "1".into()];
        assert!(ActionKind::from_args("Number", &args, &registry).is_err());

        let args: Vec<String> = vec!["QuestPoints".into(), "multiply".into(), "2".into()];
        assert!(ActionKind::from_args("Number", &args, &registry).is_ok());
    }

    #[test]
    fn test_raw_round_trip() {
        let mut action = Action::new(ActionKind::Boolean {
            variable_name: "Permission".to_string(),
            operator: "setNot".to_string(),
            expression: "true".to_string(),
            additional_strings: BTreeMap::from([("Permission".to_string(), "vip".to_string())]),
        });
        action.name = "Revoke VIP".to_string();

        let raw = action.to_raw();
        assert_eq!(raw.action_type, "Boolean");
        assert_eq!(raw.specifics.get("operator").and_then(|v| v.as_str()), Some("setNot"));
        assert_eq!(Action::from_raw(&raw).unwrap(), action);
    }

    #[test]
    fn test_unknown_type_is_error() {
        let raw = RawAction {
            action_type: "Teleport".to_string(),
            specifics: toml::Table::new(),
            name: String::new(),
        };
        assert!(Action::from_raw(&raw).is_err());
    }

    #[test]
    fn test_number_operators() {
        assert_eq!(apply_number_operator("add", 2.0, 3.0), Some(5.0));
        assert_eq!(apply_number_operator("Deduct", 2.0, 3.0), Some(-1.0));
        assert_eq!(apply_number_operator("divide", 2.0, 0.0), None);
        assert_eq!(apply_number_operator("pow", 2.0, 3.0), None);
    }
}
