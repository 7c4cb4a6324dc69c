//! Conditions and Requirements
//!
//! Predicates that gate quest acceptance (quest `requirements`) and objective
//! completion (objective `conditions`). A check returns an empty string when
//! satisfied, otherwise a player-facing line describing what is missing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::quest::state::QuestPlayer;
use crate::variable::{EvalContext, VariableArgs, VariableDataType, VariableRegistry};

/// Persisted form of a condition: type tag beside a `specifics` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCondition {
    #[serde(rename = "type")]
    pub condition_type: String,
    #[serde(default)]
    pub specifics: toml::Table,
    #[serde(default)]
    pub negated: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default = "default_progress_needed")]
    pub progress_needed: i64,
}

fn default_progress_needed() -> i64 {
    1
}

fn default_completions() -> i64 {
    1
}

fn default_equals() -> String {
    "equals".to_string()
}

/// Every condition type and its type-specific fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "specifics", rename_all_fields = "camelCase")]
pub enum ConditionKind {
    Permission {
        required_permission: String,
    },
    UltimateClansClanLevel {
        min_clan_level: i64,
    },
    TownyNationName {
        towny_nation_name: String,
    },
    QuestPoints {
        min_quest_points: i64,
        #[serde(default)]
        deduct: bool,
    },
    Money {
        min_money: f64,
        #[serde(default)]
        deduct: bool,
    },
    OtherQuest {
        other_quest_name: String,
        #[serde(default = "default_completions")]
        completions_needed: i64,
    },
    Boolean {
        variable_name: String,
        #[serde(default = "default_equals")]
        operator: String,
        expression: String,
        #[serde(default)]
        additional_strings: BTreeMap<String, String>,
    },
    Number {
        variable_name: String,
        #[serde(default = "default_equals")]
        operator: String,
        expression: String,
        #[serde(default)]
        additional_strings: BTreeMap<String, String>,
    },
    String {
        variable_name: String,
        #[serde(default = "default_equals")]
        operator: String,
        #[serde(default)]
        expected: String,
        #[serde(default)]
        additional_strings: BTreeMap<String, String>,
    },
}

/// Type identifiers accepted by `requirements add` / `conditions add`
pub const CONDITION_TYPES: &[&str] = &[
    "Permission",
    "UltimateClansClanLevel",
    "TownyNationName",
    "QuestPoints",
    "Money",
    "OtherQuest",
    "Boolean",
    "Number",
    "String",
];

pub const NUMBER_OPERATORS: &[&str] = &["equals", "lessThan", "lessOrEqualThan", "moreThan", "moreOrEqualThan"];
pub const STRING_OPERATORS: &[&str] = &["equals", "equalsIgnoreCase", "contains", "startsWith", "endsWith", "isEmpty"];

impl ConditionKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ConditionKind::Permission { .. } => "Permission",
            ConditionKind::UltimateClansClanLevel { .. } => "UltimateClansClanLevel",
            ConditionKind::TownyNationName { .. } => "TownyNationName",
            ConditionKind::QuestPoints { .. } => "QuestPoints",
            ConditionKind::Money { .. } => "Money",
            ConditionKind::OtherQuest { .. } => "OtherQuest",
            ConditionKind::Boolean { .. } => "Boolean",
            ConditionKind::Number { .. } => "Number",
            ConditionKind::String { .. } => "String",
        }
    }

    /// Build a condition from command arguments (everything after the type)
    pub fn from_args(condition_type: &str, args: &[String], variables: &VariableRegistry) -> Result<Self, String> {
        let arg = |i: usize, name: &str| -> Result<String, String> {
            args.get(i)
                .cloned()
                .ok_or_else(|| format!("Missing argument <{}> for {} condition", name, condition_type))
        };
        let number = |i: usize, name: &str| -> Result<i64, String> {
            let raw = arg(i, name)?;
            raw.parse::<i64>()
                .map_err(|_| format!("'{}' is not a valid number for <{}>", raw, name))
        };
        let flag = |i: usize| -> bool {
            args.get(i)
                .map(|s| s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("deduct"))
                .unwrap_or(false)
        };

        let kind = match condition_type.to_lowercase().as_str() {
            "permission" => ConditionKind::Permission {
                required_permission: arg(0, "permission")?,
            },
            "ultimateclansclanlevel" => {
                let min_clan_level = number(0, "minLevel")?;
                if min_clan_level < 1 {
                    return Err("The minimum clan level must be at least 1".to_string());
                }
                ConditionKind::UltimateClansClanLevel { min_clan_level }
            }
            "townynationname" => ConditionKind::TownyNationName {
                towny_nation_name: arg(0, "nation name")?,
            },
            "questpoints" => ConditionKind::QuestPoints {
                min_quest_points: number(0, "amount")?,
                deduct: flag(1),
            },
            "money" => {
                let raw = arg(0, "amount")?;
                let min_money = raw
                    .parse::<f64>()
                    .map_err(|_| format!("'{}' is not a valid amount of money", raw))?;
                ConditionKind::Money { min_money, deduct: flag(1) }
            }
            "otherquest" => ConditionKind::OtherQuest {
                other_quest_name: arg(0, "quest name")?,
                completions_needed: match args.get(1) {
                    Some(_) => number(1, "completions")?,
                    None => 1,
                },
            },
            "boolean" | "number" | "string" => {
                let wanted = match condition_type.to_lowercase().as_str() {
                    "boolean" => VariableDataType::Boolean,
                    "number" => VariableDataType::Number,
                    _ => VariableDataType::String,
                };
                let requested = arg(0, "variable")?;
                let variable_name = variables
                    .canonical(&requested)
                    .ok_or_else(|| format!("Variable '{}' does not exist", requested))?
                    .to_string();
                let variable = variables
                    .lookup(&variable_name)
                    .ok_or_else(|| format!("Variable '{}' could not be created", variable_name))?;
                if variable.data_type() != wanted {
                    return Err(format!(
                        "Variable '{}' is of type {}, not {}",
                        variable_name,
                        variable.data_type().as_str(),
                        wanted.as_str()
                    ));
                }
                let operator = arg(1, "operator")?;
                let value = arg(2, "expression")?;
                let extra: Vec<String> = args.iter().skip(3).cloned().collect();
                let additional = VariableArgs::from_positional(variable.as_ref(), &extra)
                    .map_err(|missing| format!("Missing argument <{}> for variable {}", missing, variable_name))?;
                let additional_strings = additional.strings;

                match wanted {
                    VariableDataType::Boolean => ConditionKind::Boolean {
                        variable_name,
                        operator,
                        expression: value,
                        additional_strings,
                    },
                    VariableDataType::Number => {
                        if !NUMBER_OPERATORS.iter().any(|op| op.eq_ignore_ascii_case(&operator)) {
                            return Err(format!("Invalid operator '{}'", operator));
                        }
                        ConditionKind::Number {
                            variable_name,
                            operator,
                            expression: value,
                            additional_strings,
                        }
                    }
                    _ => {
                        if !STRING_OPERATORS.iter().any(|op| op.eq_ignore_ascii_case(&operator)) {
                            return Err(format!("Invalid operator '{}'", operator));
                        }
                        ConditionKind::String {
                            variable_name,
                            operator,
                            expected: value,
                            additional_strings,
                        }
                    }
                }
            }
            _ => return Err(format!("Unknown condition type '{}'", condition_type)),
        };
        Ok(kind)
    }
}

/// Result of evaluating a condition before negation
enum Outcome {
    Satisfied,
    Unsatisfied(String),
    /// Missing integration or broken configuration; reported even when negated
    Unavailable(String),
}

/// A condition owned by a quest (requirement) or one of its objectives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCondition", into = "RawCondition")]
pub struct Condition {
    pub kind: ConditionKind,
    pub negated: bool,
    pub description: String,
    pub progress_needed: i64,
    /// Owning objective; `None` for quest-level requirements
    pub objective_id: Option<i32>,
}

impl Condition {
    pub fn new(kind: ConditionKind) -> Self {
        Self {
            kind,
            negated: false,
            description: String::new(),
            progress_needed: 1,
            objective_id: None,
        }
    }

    pub fn from_raw(raw: &RawCondition) -> Result<Self, String> {
        let mut tagged = toml::Table::new();
        tagged.insert("type".to_string(), toml::Value::String(raw.condition_type.clone()));
        tagged.insert("specifics".to_string(), toml::Value::Table(raw.specifics.clone()));

        let kind: ConditionKind = toml::Value::Table(tagged)
            .try_into()
            .map_err(|e| format!("Invalid {} condition: {}", raw.condition_type, e))?;

        Ok(Self {
            kind,
            negated: raw.negated,
            description: raw.description.clone(),
            progress_needed: raw.progress_needed.max(1),
            objective_id: None,
        })
    }

    pub fn to_raw(&self) -> RawCondition {
        let specifics = match toml::Value::try_from(&self.kind) {
            Ok(toml::Value::Table(mut table)) => match table.remove("specifics") {
                Some(toml::Value::Table(specifics)) => specifics,
                _ => toml::Table::new(),
            },
            Ok(_) | Err(_) => {
                warn!("Failed to serialize {} condition", self.kind.type_name());
                toml::Table::new()
            }
        };

        RawCondition {
            condition_type: self.kind.type_name().to_string(),
            specifics,
            negated: self.negated,
            description: self.description.clone(),
            progress_needed: self.progress_needed,
        }
    }

    /// The variable whose changes can flip this condition
    pub fn variable_name(&self) -> &str {
        match &self.kind {
            ConditionKind::Permission { .. } => "Permission",
            ConditionKind::UltimateClansClanLevel { .. } => "UltimateClansClanLevel",
            ConditionKind::TownyNationName { .. } => "TownyNationName",
            ConditionKind::QuestPoints { .. } => "QuestPoints",
            ConditionKind::Money { .. } => "Money",
            ConditionKind::OtherQuest { .. } => "CompletedQuests",
            ConditionKind::Boolean { variable_name, .. }
            | ConditionKind::Number { variable_name, .. }
            | ConditionKind::String { variable_name, .. } => variable_name,
        }
    }

    /// Check the condition. With `enforce`, deductions happen if (and only
    /// if) the check passes right now.
    pub fn check(&self, player: &mut QuestPlayer, ctx: &EvalContext<'_>, enforce: bool) -> String {
        match (self.evaluate(player, ctx), self.negated) {
            (Outcome::Unavailable(message), _) => message,
            (Outcome::Satisfied, false) => {
                if enforce {
                    self.enforce(player, ctx)
                } else {
                    String::new()
                }
            }
            (Outcome::Unsatisfied(message), false) => message,
            (Outcome::Satisfied, true) => {
                if self.description.is_empty() {
                    format!("\nYou must not fulfill: {}", self.kind_line())
                } else {
                    format!("\n{}", self.description)
                }
            }
            (Outcome::Unsatisfied(_), true) => String::new(),
        }
    }

    fn evaluate(&self, player: &QuestPlayer, ctx: &EvalContext<'_>) -> Outcome {
        match &self.kind {
            ConditionKind::Permission { required_permission } => {
                if !ctx.host.server.is_online(player.uuid) {
                    return Outcome::Unsatisfied("\nYou need to be online.".to_string());
                }
                if ctx.host.server.has_permission(player.uuid, required_permission) {
                    Outcome::Satisfied
                } else {
                    Outcome::Unsatisfied(format!(
                        "\nYou need the following permission: {}.",
                        required_permission
                    ))
                }
            }
            ConditionKind::UltimateClansClanLevel { min_clan_level } => {
                let Some(clans) = ctx.host.clans.as_ref() else {
                    return Outcome::Unavailable(
                        "\nError: The server does not have UltimateClans enabled. Please ask the Owner to install UltimateClans for UltimateClans stuff to work.".to_string(),
                    );
                };
                match clans.clan_level(player.uuid) {
                    Some(level) if level >= *min_clan_level => Outcome::Satisfied,
                    _ => Outcome::Unsatisfied(format!(
                        "\nYou need to be in a Clan with at least level {}.",
                        min_clan_level
                    )),
                }
            }
            ConditionKind::TownyNationName { towny_nation_name } => {
                let Some(nations) = ctx.host.nations.as_ref() else {
                    return Outcome::Unavailable(
                        "\nError: The server does not have Towny enabled. Please ask the Owner to install Towny for Towny stuff to work.".to_string(),
                    );
                };
                match nations.nation_name(player.uuid) {
                    Some(nation) if nation.replace('_', " ") == *towny_nation_name => Outcome::Satisfied,
                    Some(nation) => Outcome::Unsatisfied(format!(
                        "\nYou need to be in the nation {}. However, you are currently in {}",
                        towny_nation_name,
                        nation.replace('_', " ")
                    )),
                    None => Outcome::Unsatisfied(format!("\nYou need to be in the nation {}", towny_nation_name)),
                }
            }
            ConditionKind::QuestPoints { min_quest_points, .. } => {
                if player.quest_points >= *min_quest_points {
                    Outcome::Satisfied
                } else {
                    Outcome::Unsatisfied(format!(
                        "\nYou need {} more quest points.",
                        min_quest_points - player.quest_points
                    ))
                }
            }
            ConditionKind::Money { min_money, .. } => {
                let Some(economy) = ctx.host.economy.as_ref() else {
                    return Outcome::Unavailable(
                        "\nError: The server does not have an economy plugin enabled. Please ask the Owner to install one for money stuff to work.".to_string(),
                    );
                };
                let balance = economy.balance(player.uuid);
                if balance >= *min_money {
                    Outcome::Satisfied
                } else {
                    Outcome::Unsatisfied(format!("\nYou need {} more money.", min_money - balance))
                }
            }
            ConditionKind::OtherQuest { other_quest_name, completions_needed } => {
                let completions = player.completions_of(other_quest_name) as i64;
                if completions >= *completions_needed {
                    Outcome::Satisfied
                } else if *completions_needed == 1 {
                    Outcome::Unsatisfied(format!("\nFinish the following quest: {}", other_quest_name))
                } else {
                    Outcome::Unsatisfied(format!(
                        "\nFinish the following quest: {} ({} more times)",
                        other_quest_name,
                        completions_needed - completions
                    ))
                }
            }
            ConditionKind::Boolean { variable_name, operator, expression, additional_strings } => {
                let args = VariableArgs { strings: additional_strings.clone(), ..Default::default() };
                let current = match self.read_variable(ctx, variable_name, player, &args) {
                    Ok(value) => value,
                    Err(outcome) => return outcome,
                };
                let Some(current) = current.as_bool() else {
                    warn!("Boolean condition on {} read a non-boolean value", variable_name);
                    return Outcome::Unavailable(format!("\nError reading {} requirement...", variable_name));
                };
                let expected = match ctx.evaluate_boolean(expression, player, &args) {
                    Ok(expected) => expected,
                    Err(e) => return broken(variable_name, e),
                };
                if !operator.eq_ignore_ascii_case("equals") {
                    return Outcome::Unavailable(format!("\nError: invalid operator {} for {}", operator, variable_name));
                }
                if current == expected {
                    Outcome::Satisfied
                } else {
                    Outcome::Unsatisfied(format!("\n{} needs to be {}.", variable_name, expected))
                }
            }
            ConditionKind::Number { variable_name, operator, expression, additional_strings } => {
                let args = VariableArgs { strings: additional_strings.clone(), ..Default::default() };
                let current = match self.read_variable(ctx, variable_name, player, &args) {
                    Ok(value) => value,
                    Err(outcome) => return outcome,
                };
                let Some(current) = current.as_number() else {
                    warn!("Number condition on {} read a non-numeric value", variable_name);
                    return Outcome::Unavailable(format!("\nError reading {} requirement...", variable_name));
                };
                let expected = match ctx.evaluate(expression, player, &args) {
                    Ok(expected) => expected,
                    Err(e) => return broken(variable_name, e),
                };
                let (passes, wording) = match operator.to_lowercase().as_str() {
                    "equals" => (current == expected, "exactly"),
                    "lessthan" => (current < expected, "less than"),
                    "lessorequalthan" => (current <= expected, "at most"),
                    "morethan" => (current > expected, "more than"),
                    "moreorequalthan" => (current >= expected, "at least"),
                    _ => {
                        return Outcome::Unavailable(format!(
                            "\nError: invalid operator {} for {}",
                            operator, variable_name
                        ));
                    }
                };
                if passes {
                    Outcome::Satisfied
                } else {
                    Outcome::Unsatisfied(format!(
                        "\nYou need {} {} {}.",
                        wording, expected, variable_name
                    ))
                }
            }
            ConditionKind::String { variable_name, operator, expected, additional_strings } => {
                let args = VariableArgs { strings: additional_strings.clone(), ..Default::default() };
                let current = match self.read_variable(ctx, variable_name, player, &args) {
                    Ok(value) => value,
                    Err(outcome) => return outcome,
                };
                let Some(current) = current.as_string() else {
                    warn!("String condition on {} read a non-string value", variable_name);
                    return Outcome::Unavailable(format!("\nError reading {} requirement...", variable_name));
                };
                let passes = match operator.to_lowercase().as_str() {
                    "equals" => current == expected,
                    "equalsignorecase" => current.eq_ignore_ascii_case(expected),
                    "contains" => current.contains(expected.as_str()),
                    "startswith" => current.starts_with(expected.as_str()),
                    "endswith" => current.ends_with(expected.as_str()),
                    "isempty" => current.is_empty(),
                    _ => {
                        return Outcome::Unavailable(format!(
                            "\nError: invalid operator {} for {}",
                            operator, variable_name
                        ));
                    }
                };
                if passes {
                    Outcome::Satisfied
                } else {
                    Outcome::Unsatisfied(format!("\n{} needs to {} {}.", variable_name, operator, expected))
                }
            }
        }
    }

    fn read_variable(
        &self,
        ctx: &EvalContext<'_>,
        variable_name: &str,
        player: &QuestPlayer,
        args: &VariableArgs,
    ) -> Result<crate::variable::VariableValue, Outcome> {
        let Some(variable) = ctx.variables.lookup(variable_name) else {
            return Err(Outcome::Unavailable(format!(
                "\nError: variable {} not found. Report this to the Server owner.",
                variable_name
            )));
        };
        variable.get_value(ctx, player, args).ok_or_else(|| {
            Outcome::Unavailable(format!("\nError reading {} requirement...", variable_name))
        })
    }

    /// Perform the deduction for a passing condition, re-checking at this moment
    fn enforce(&self, player: &mut QuestPlayer, ctx: &EvalContext<'_>) -> String {
        match &self.kind {
            ConditionKind::QuestPoints { min_quest_points, deduct: true } => {
                if player.remove_quest_points(*min_quest_points) {
                    String::new()
                } else {
                    format!("\nYou need {} more quest points.", min_quest_points - player.quest_points)
                }
            }
            ConditionKind::Money { min_money, deduct: true } => match ctx.host.economy.as_ref() {
                Some(economy) if economy.withdraw(player.uuid, *min_money) => String::new(),
                Some(_) => format!("\nYou need {} money.", min_money),
                None => "\nError: The server does not have an economy plugin enabled.".to_string(),
            },
            _ => String::new(),
        }
    }

    /// Whether a passing enforced check takes something from the player
    pub fn deducts(&self) -> bool {
        !self.negated
            && matches!(
                self.kind,
                ConditionKind::QuestPoints { deduct: true, .. } | ConditionKind::Money { deduct: true, .. }
            )
    }

    /// Give back what a successful enforced check took
    fn refund(&self, player: &mut QuestPlayer, ctx: &EvalContext<'_>) {
        match &self.kind {
            ConditionKind::QuestPoints { min_quest_points, deduct: true } => {
                player.add_quest_points(*min_quest_points);
            }
            ConditionKind::Money { min_money, deduct: true } => {
                if let Some(economy) = ctx.host.economy.as_ref() {
                    if !economy.deposit(player.uuid, *min_money) {
                        warn!("Failed to refund {} money to {}", min_money, player.uuid);
                    }
                }
            }
            _ => {}
        }
    }

    fn kind_line(&self) -> String {
        match &self.kind {
            ConditionKind::Permission { required_permission } => {
                format!("Permission needed: {}", required_permission)
            }
            ConditionKind::UltimateClansClanLevel { min_clan_level } => {
                format!("Member of clan with min. level: {}", min_clan_level)
            }
            ConditionKind::TownyNationName { towny_nation_name } => {
                format!("Member of nation: {}", towny_nation_name)
            }
            ConditionKind::QuestPoints { min_quest_points, deduct } => format!(
                "Quest points needed: {}{}",
                min_quest_points,
                if *deduct { " (deducted)" } else { "" }
            ),
            ConditionKind::Money { min_money, deduct } => format!(
                "Money needed: {}{}",
                min_money,
                if *deduct { " (deducted)" } else { "" }
            ),
            ConditionKind::OtherQuest { other_quest_name, completions_needed } => format!(
                "Finish Quest first: {} ({}x)",
                other_quest_name, completions_needed
            ),
            ConditionKind::Boolean { variable_name, operator, expression, .. }
            | ConditionKind::Number { variable_name, operator, expression, .. } => {
                format!("{} {} {}", variable_name, operator, expression)
            }
            ConditionKind::String { variable_name, operator, expected, .. } => {
                format!("{} {} {}", variable_name, operator, expected)
            }
        }
    }

    /// One-line summary for listings
    pub fn description_line(&self) -> String {
        let mut line = format!("-- {}", self.kind_line());
        if self.negated {
            line = format!("-- NOT {}", self.kind_line());
        }
        if !self.description.is_empty() {
            line.push_str(&format!(" ({})", self.description));
        }
        line
    }
}

impl TryFrom<RawCondition> for Condition {
    type Error = String;

    fn try_from(raw: RawCondition) -> Result<Self, Self::Error> {
        Condition::from_raw(&raw)
    }
}

impl From<Condition> for RawCondition {
    fn from(condition: Condition) -> Self {
        condition.to_raw()
    }
}

fn broken(variable_name: &str, error: crate::error::QuestError) -> Outcome {
    warn!("Failed to evaluate condition on {}: {}", variable_name, error);
    Outcome::Unavailable(format!("\nError reading {} requirement...", variable_name))
}

/// Check every condition in declaration order, concatenating failures
pub fn check_all(conditions: &[Condition], player: &mut QuestPlayer, ctx: &EvalContext<'_>, enforce: bool) -> String {
    let mut result = String::new();
    for condition in conditions {
        result.push_str(&condition.check(player, ctx, enforce));
    }
    result
}

/// Check, then enforce, every condition as one unit. If any condition stops
/// passing while deductions are being made, the deductions already made are
/// refunded and the failure is returned.
pub fn enforce_all(conditions: &[Condition], player: &mut QuestPlayer, ctx: &EvalContext<'_>) -> String {
    let missing = check_all(conditions, player, ctx, false);
    if !missing.is_empty() {
        return missing;
    }

    let mut deducted: Vec<&Condition> = Vec::new();
    for condition in conditions {
        let missing = condition.check(player, ctx, true);
        if !missing.is_empty() {
            for done in deducted.iter().rev() {
                done.refund(player, ctx);
            }
            return missing;
        }
        if condition.deducts() {
            deducted.push(condition);
        }
    }
    String::new()
}

/// Variables lowered by enforcing these conditions
pub fn deducting_variables(conditions: &[Condition]) -> Vec<String> {
    conditions
        .iter()
        .filter(|c| c.deducts())
        .map(|c| c.variable_name().to_string())
        .collect()
}
