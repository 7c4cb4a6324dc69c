//! Expression Evaluator
//!
//! Substitutes Number variables into an arithmetic expression and evaluates
//! the result in a sandboxed Lua VM.

use mlua::{Lua, Value};
use tracing::debug;

use super::{EvalContext, VariableArgs, VariableDataType};
use crate::error::{QuestError, Result};
use crate::quest::state::QuestPlayer;

/// Evaluates arithmetic expressions that may reference Number variables
pub struct ExpressionEvaluator {
    lua: Lua,
}

impl ExpressionEvaluator {
    pub fn new() -> Result<Self> {
        let lua = Lua::new();

        // Only arithmetic ever reaches the VM, but strip the escape hatches anyway
        let globals = lua.globals();
        globals.set("os", Value::Nil)?;
        globals.set("io", Value::Nil)?;
        globals.set("loadfile", Value::Nil)?;
        globals.set("dofile", Value::Nil)?;
        globals.set("require", Value::Nil)?;
        drop(globals);

        Ok(Self { lua })
    }

    /// Substitute variables, then evaluate
    pub fn evaluate(
        &self,
        expression: &str,
        ctx: &EvalContext<'_>,
        player: &QuestPlayer,
        args: &VariableArgs,
    ) -> Result<f64> {
        let substituted = self.substitute(expression, ctx, player, args);
        if substituted != expression {
            debug!("Expression '{}' -> '{}'", expression, substituted);
        }
        self.evaluate_arithmetic(expression, &substituted)
    }

    /// Replace every Number variable identifier in `expression` with its
    /// current value. Longer identifiers are replaced first so that one
    /// identifier contained in another never corrupts it.
    pub fn substitute(
        &self,
        expression: &str,
        ctx: &EvalContext<'_>,
        player: &QuestPlayer,
        args: &VariableArgs,
    ) -> String {
        let mut result = expression.to_string();

        for identifier in ctx.variables.identifiers_longest_first() {
            if !result.contains(identifier) {
                continue;
            }
            let Some(variable) = ctx.variables.lookup(identifier) else {
                debug!("Variable '{}' could not be created, skipping", identifier);
                continue;
            };
            if variable.data_type() != VariableDataType::Number {
                continue;
            }
            match variable.get_value(ctx, player, args).and_then(|v| v.as_number()) {
                Some(value) => {
                    result = result.replace(identifier, &format!("({:?})", value));
                }
                None => debug!("Variable '{}' has no numeric value, skipping", identifier),
            }
        }

        result
    }

    /// Evaluate a plain arithmetic expression (no identifiers left)
    pub fn evaluate_arithmetic(&self, original: &str, text: &str) -> Result<f64> {
        if text.trim().is_empty() {
            return Err(QuestError::expression(original, "expression is empty"));
        }
        if let Some(c) = text.chars().find(|c| !is_arithmetic_char(*c)) {
            return Err(QuestError::expression(
                original,
                format!("unexpected character '{}' after substitution ('{}')", c, text),
            ));
        }
        // "--" starts a Lua comment
        if text.contains("--") {
            return Err(QuestError::expression(original, "double minus is not allowed"));
        }

        // Lua integers wrap on overflow; every literal is made a float
        let value: f64 = self
            .lua
            .load(format!("return ({})", float_literals(text)))
            .set_name("expression")
            .eval()?;

        if !value.is_finite() {
            return Err(QuestError::expression(original, "result is not a finite number"));
        }
        Ok(value)
    }
}

/// Append `.0` to integer literals so Lua evaluates in floating point
fn float_literals(text: &str) -> String {
    let mut result = String::with_capacity(text.len() + 8);
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if !(c.is_ascii_digit() || c == '.') {
            result.push(c);
            continue;
        }

        let mut literal = String::from(c);
        while let Some(&next) = chars.peek() {
            let exponent_sign = matches!(next, '+' | '-') && literal.ends_with(['e', 'E']);
            if next.is_ascii_digit() || matches!(next, '.' | 'e' | 'E') || exponent_sign {
                literal.push(next);
                chars.next();
            } else {
                break;
            }
        }
        let is_float = literal.contains(['.', 'e', 'E']);
        result.push_str(&literal);
        if !is_float {
            result.push_str(".0");
        }
    }
    result
}

fn is_arithmetic_char(c: char) -> bool {
    c.is_ascii_digit()
        || c.is_whitespace()
        || matches!(c, '.' | 'e' | 'E' | '+' | '-' | '*' | '/' | '%' | '^' | '(' | ')')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IntegrationsConfig;
    use crate::host::{HostServices, MemoryHost};
    use crate::variable::{Variable, VariableRegistry, VariableValue};
    use std::sync::Arc;
    use uuid::Uuid;

    struct FixedNumber(f64);

    impl Variable for FixedNumber {
        fn data_type(&self) -> VariableDataType {
            VariableDataType::Number
        }
        fn get_value(&self, _: &EvalContext<'_>, _: &QuestPlayer, _: &VariableArgs) -> Option<VariableValue> {
            Some(VariableValue::Number(self.0))
        }
        fn plural(&self) -> &'static str {
            "Fixed"
        }
        fn singular(&self) -> &'static str {
            "Fixed"
        }
    }

    fn money() -> Box<dyn Variable> {
        Box::new(FixedNumber(5.0))
    }

    fn money_double() -> Box<dyn Variable> {
        Box::new(FixedNumber(10.0))
    }

    fn big() -> Box<dyn Variable> {
        Box::new(FixedNumber(3_000_000_000.0))
    }

    fn negative() -> Box<dyn Variable> {
        Box::new(FixedNumber(-3.0))
    }

    fn setup() -> (VariableRegistry, ExpressionEvaluator, HostServices) {
        let mut registry = VariableRegistry::new();
        registry.register("Money", money);
        registry.register("MoneyDouble", money_double);
        registry.register("Debt", negative);
        let host = HostServices::memory(Arc::new(MemoryHost::new()), &IntegrationsConfig::default());
        (registry, ExpressionEvaluator::new().unwrap(), host)
    }

    #[test]
    fn test_plain_arithmetic() {
        let evaluator = ExpressionEvaluator::new().unwrap();
        assert_eq!(evaluator.evaluate_arithmetic("x", "1 + 2 * 3").unwrap(), 7.0);
        assert_eq!(evaluator.evaluate_arithmetic("x", "7 / 2").unwrap(), 3.5);
        assert_eq!(evaluator.evaluate_arithmetic("x", "2 ^ 10").unwrap(), 1024.0);
        assert_eq!(evaluator.evaluate_arithmetic("x", "(1 + 1) % 2").unwrap(), 0.0);
    }

    #[test]
    fn test_large_products_do_not_wrap() {
        let evaluator = ExpressionEvaluator::new().unwrap();
        let value = evaluator.evaluate_arithmetic("x", "3000000000 * 4000000000").unwrap();
        assert_eq!(value, 1.2e19);
        assert_eq!(evaluator.evaluate_arithmetic("x", "9223372036854775807 + 1").unwrap(), 9.223372036854775808e18);
        assert_eq!(evaluator.evaluate_arithmetic("x", "1.5e3 + 5E-1").unwrap(), 1500.5);
    }

    #[test]
    fn test_large_variable_values_stay_positive() {
        let mut registry = VariableRegistry::new();
        registry.register("Big", big);
        let evaluator = ExpressionEvaluator::new().unwrap();
        let host = HostServices::memory(Arc::new(MemoryHost::new()), &IntegrationsConfig::default());
        let ctx = EvalContext { variables: &registry, evaluator: &evaluator, host: &host };
        let player = QuestPlayer::new(Uuid::new_v4());

        let value = ctx.evaluate("Big * 4000000000", &player, &VariableArgs::default()).unwrap();
        assert!(value > 0.0);
        assert_eq!(value, 1.2e19);
    }

    #[test]
    fn test_float_literals() {
        assert_eq!(float_literals("1 + 2.5 * (3)"), "1.0 + 2.5 * (3.0)");
        assert_eq!(float_literals("1e5 - 2E-3"), "1e5 - 2E-3");
        assert_eq!(float_literals("(-3.0) % 2"), "(-3.0) % 2.0");
    }

    #[test]
    fn test_longer_identifier_substituted_first() {
        let (registry, evaluator, host) = setup();
        let ctx = EvalContext { variables: &registry, evaluator: &evaluator, host: &host };
        let player = QuestPlayer::new(Uuid::new_v4());
        let args = VariableArgs::default();

        assert_eq!(evaluator.substitute("MoneyDouble + Money", &ctx, &player, &args), "(10.0) + (5.0)");
        assert_eq!(ctx.evaluate("MoneyDouble + Money", &player, &args).unwrap(), 15.0);
        assert_eq!(ctx.evaluate("Money*2", &player, &args).unwrap(), 10.0);
    }

    #[test]
    fn test_negative_values_are_parenthesised() {
        let (registry, evaluator, host) = setup();
        let ctx = EvalContext { variables: &registry, evaluator: &evaluator, host: &host };
        let player = QuestPlayer::new(Uuid::new_v4());
        assert_eq!(ctx.evaluate("10 - Debt", &player, &VariableArgs::default()).unwrap(), 13.0);
    }

    #[test]
    fn test_malformed_expression_is_error() {
        let (registry, evaluator, host) = setup();
        let ctx = EvalContext { variables: &registry, evaluator: &evaluator, host: &host };
        let player = QuestPlayer::new(Uuid::new_v4());
        let args = VariableArgs::default();

        assert!(ctx.evaluate("UnknownVariable + 1", &player, &args).is_err());
        assert!(ctx.evaluate("1 +", &player, &args).is_err());
        assert!(ctx.evaluate("", &player, &args).is_err());
        assert!(ctx.evaluate("5 -- 3", &player, &args).is_err());
        assert!(ctx.evaluate("1 / 0", &player, &args).is_err());
    }
}
