//! Variable System
//!
//! Named, typed values read from (and sometimes written to) player or host
//! state. Conditions and actions reference variables by identifier; the
//! registry hands out a fresh instance per lookup.

pub mod builtin;
pub mod expression;
pub mod registry;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{QuestError, Result};
use crate::host::HostServices;
use crate::quest::state::QuestPlayer;

pub use expression::ExpressionEvaluator;
pub use registry::{VariableFactory, VariableRegistry};

/// Value type a variable produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableDataType {
    String,
    Boolean,
    Number,
    List,
    ItemStackList,
}

impl VariableDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableDataType::String => "STRING",
            VariableDataType::Boolean => "BOOLEAN",
            VariableDataType::Number => "NUMBER",
            VariableDataType::List => "LIST",
            VariableDataType::ItemStackList => "ITEMSTACK_LIST",
        }
    }
}

/// A variable's current value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Boolean(bool),
    Number(f64),
    String(String),
    List(Vec<String>),
    ItemStackList(Vec<(String, u32)>),
}

impl VariableValue {
    pub fn data_type(&self) -> VariableDataType {
        match self {
            VariableValue::String(_) => VariableDataType::String,
            VariableValue::Boolean(_) => VariableDataType::Boolean,
            VariableValue::Number(_) => VariableDataType::Number,
            VariableValue::List(_) => VariableDataType::List,
            VariableValue::ItemStackList(_) => VariableDataType::ItemStackList,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            VariableValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            VariableValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            VariableValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Text form used in chat output
    pub fn display(&self) -> String {
        match self {
            VariableValue::String(s) => s.clone(),
            VariableValue::Boolean(b) => b.to_string(),
            VariableValue::Number(n) => n.to_string(),
            VariableValue::List(items) => items.join(", "),
            VariableValue::ItemStackList(items) => items
                .iter()
                .map(|(item, amount)| format!("{}x {}", amount, item))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// Extra arguments a variable needs (e.g. which permission node).
///
/// Number and boolean entries are expressions, evaluated when the variable
/// is read or written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableArgs {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub strings: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub numbers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub booleans: BTreeMap<String, String>,
}

impl VariableArgs {
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty() && self.numbers.is_empty() && self.booleans.is_empty()
    }

    pub fn string(&self, key: &str) -> Option<&str> {
        self.strings.get(key).map(|s| s.as_str())
    }

    pub fn with_string(mut self, key: &str, value: &str) -> Self {
        self.strings.insert(key.to_string(), value.to_string());
        self
    }

    /// Fill string arguments positionally from the variable's required names.
    /// Returns the name of the first missing argument, if any.
    pub fn from_positional(variable: &dyn Variable, values: &[String]) -> std::result::Result<Self, String> {
        let mut args = VariableArgs::default();
        let mut values = values.iter();
        for name in variable.required_strings() {
            let value = values.next().ok_or_else(|| name.to_string())?;
            args.strings.insert(name.to_string(), value.clone());
        }
        for name in variable.required_numbers() {
            let value = values.next().ok_or_else(|| name.to_string())?;
            args.numbers.insert(name.to_string(), value.clone());
        }
        for name in variable.required_booleans() {
            let value = values.next().ok_or_else(|| name.to_string())?;
            args.booleans.insert(name.to_string(), value.clone());
        }
        Ok(args)
    }
}

/// Read-only collaborators needed to evaluate variables and expressions
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    pub variables: &'a VariableRegistry,
    pub evaluator: &'a ExpressionEvaluator,
    pub host: &'a HostServices,
}

impl<'a> EvalContext<'a> {
    /// Evaluate an arithmetic expression for a player
    pub fn evaluate(&self, expression: &str, player: &QuestPlayer, args: &VariableArgs) -> Result<f64> {
        self.evaluator.evaluate(expression, self, player, args)
    }

    /// Evaluate a boolean expression: a literal, a Boolean variable's
    /// identifier, or arithmetic compared against 0.98
    pub fn evaluate_boolean(&self, expression: &str, player: &QuestPlayer, args: &VariableArgs) -> Result<bool> {
        let trimmed = expression.trim();
        if trimmed.eq_ignore_ascii_case("true") {
            return Ok(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Ok(false);
        }
        if let Some(variable) = self.variables.lookup(trimmed) {
            if variable.data_type() == VariableDataType::Boolean {
                return variable
                    .get_value(self, player, args)
                    .and_then(|v| v.as_bool())
                    .ok_or_else(|| QuestError::expression(trimmed, "boolean variable has no value"));
            }
        }
        Ok(self.evaluate(trimmed, player, args)? >= 0.98)
    }

    /// Read a variable's value by identifier
    pub fn get_value(&self, identifier: &str, player: &QuestPlayer, args: &VariableArgs) -> Option<VariableValue> {
        self.variables.lookup(identifier)?.get_value(self, player, args)
    }

    /// Evaluate a required number argument
    pub fn number_arg(&self, args: &VariableArgs, key: &str, player: &QuestPlayer) -> Result<f64> {
        let expression = args
            .numbers
            .get(key)
            .ok_or_else(|| QuestError::Other(format!("Missing number argument '{}'", key)))?;
        self.evaluate(expression, player, &VariableArgs::default())
    }

    /// Evaluate a required boolean argument
    pub fn boolean_arg(&self, args: &VariableArgs, key: &str, player: &QuestPlayer) -> Result<bool> {
        let expression = args
            .booleans
            .get(key)
            .ok_or_else(|| QuestError::Other(format!("Missing boolean argument '{}'", key)))?;
        self.evaluate_boolean(expression, player, &VariableArgs::default())
    }
}

/// A named, typed value source
pub trait Variable: Send + Sync {
    fn data_type(&self) -> VariableDataType;

    fn can_set_value(&self) -> bool {
        false
    }

    /// Names of extra string arguments callers must supply
    fn required_strings(&self) -> &'static [&'static str] {
        &[]
    }

    /// Names of extra number-expression arguments
    fn required_numbers(&self) -> &'static [&'static str] {
        &[]
    }

    /// Names of extra boolean-expression arguments
    fn required_booleans(&self) -> &'static [&'static str] {
        &[]
    }

    fn get_value(&self, ctx: &EvalContext<'_>, player: &QuestPlayer, args: &VariableArgs) -> Option<VariableValue>;

    /// Write a new value. Only called when `can_set_value` is true; the
    /// engine handles propagation afterwards.
    fn set_value_internally(
        &self,
        _ctx: &EvalContext<'_>,
        _value: &VariableValue,
        _player: &mut QuestPlayer,
        _args: &VariableArgs,
    ) -> bool {
        false
    }

    /// Suggestions for tab completion
    fn possible_values(&self, _ctx: &EvalContext<'_>, _player: Option<&QuestPlayer>, _args: &VariableArgs) -> Vec<String> {
        Vec::new()
    }

    fn plural(&self) -> &'static str;

    fn singular(&self) -> &'static str;
}
