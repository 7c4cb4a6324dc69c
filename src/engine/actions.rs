//! Action execution

use tracing::{info, warn};
use uuid::Uuid;

use super::{QuestEngine, MAX_ACTION_DEPTH};
use crate::action::{apply_number_operator, Action, ActionKind};
use crate::quest::QuestPlayer;
use crate::variable::{VariableArgs, VariableDataType, VariableValue};

impl QuestEngine {
    /// Run an action for a player. Never fails; problems are reported to the
    /// player and logged.
    pub fn execute_action(&mut self, uuid: Uuid, action: &Action, quest_name: Option<&str>) {
        if self.action_depth >= MAX_ACTION_DEPTH {
            warn!(
                "Action nesting deeper than {} for {}, not running {}",
                MAX_ACTION_DEPTH,
                uuid,
                action.kind.type_name()
            );
            return;
        }
        self.action_depth += 1;
        self.run_action(uuid, action, quest_name);
        self.action_depth -= 1;
    }

    /// Run a named action from the action store
    pub fn execute_named_action(&mut self, uuid: Uuid, action_name: &str, quest_name: Option<&str>) -> bool {
        let Some(action) = self.actions.get(action_name).cloned() else {
            warn!("Action {} does not exist", action_name);
            return false;
        };
        self.execute_action(uuid, &action, quest_name);
        true
    }

    fn run_action(&mut self, uuid: Uuid, action: &Action, quest_name: Option<&str>) {
        match &action.kind {
            ActionKind::ConsoleCommand { console_command } => {
                let mut command = console_command
                    .replace("{PLAYER}", &self.host.display_name(uuid))
                    .replace("{PLAYERUUID}", &uuid.to_string())
                    .replace("{QUEST}", quest_name.unwrap_or(""));
                if let Some(placeholders) = &self.host.placeholders {
                    command = placeholders.apply(uuid, &command);
                }
                if !self.host.server.dispatch_console_command(&command) {
                    warn!("Console command '{}' could not be dispatched", command);
                }
            }
            ActionKind::GiveMoney { money_amount } => {
                let Some(economy) = self.host.economy.clone() else {
                    self.send_message(
                        uuid,
                        "Error: cannot give you the money reward because the server does not have an economy plugin enabled.",
                    );
                    return;
                };
                let done = if *money_amount >= 0.0 {
                    economy.deposit(uuid, *money_amount)
                } else {
                    economy.withdraw(uuid, -money_amount)
                };
                if done {
                    self.variable_changed("Money");
                } else {
                    warn!("Economy refused to change balance of {} by {}", uuid, money_amount);
                }
            }
            ActionKind::GiveQuestPoints { quest_points_amount } => {
                self.get_or_create_quest_player(uuid).add_quest_points(*quest_points_amount);
                self.dirty.insert(uuid);
                if *quest_points_amount > 0 {
                    self.send_message(uuid, &format!("You have received {} quest points!", quest_points_amount));
                }
                self.variable_changed("QuestPoints");
            }
            ActionKind::GiveItem { item, amount } => {
                if !self.host.server.give_item(uuid, item, *amount) {
                    warn!("Could not give {}x {} to {}", amount, item, uuid);
                }
            }
            ActionKind::Boolean { variable_name, operator, expression, additional_strings } => {
                let args = VariableArgs { strings: additional_strings.clone(), ..Default::default() };
                self.run_boolean_action(uuid, variable_name, operator, expression, &args);
            }
            ActionKind::Number { variable_name, operator, expression, additional_strings } => {
                let args = VariableArgs { strings: additional_strings.clone(), ..Default::default() };
                self.run_number_action(uuid, variable_name, operator, expression, &args);
            }
            ActionKind::Action { action_name } => {
                if !self.execute_named_action(uuid, action_name, quest_name) {
                    self.send_message(uuid, &format!("Error: action {} does not exist.", action_name));
                }
            }
        }
    }

    /// Resolve a settable variable of the wanted type, reporting problems to the player
    fn settable(&self, uuid: Uuid, variable_name: &str, wanted: VariableDataType) -> bool {
        let Some(variable) = self.variables.lookup(variable_name) else {
            self.send_message(
                uuid,
                &format!("Error: variable {} not found. Report this to the Server owner.", variable_name),
            );
            return false;
        };
        if !variable.can_set_value() {
            self.send_message(
                uuid,
                &format!("Error: variable {} cannot be set. Report this to the Server owner.", variable_name),
            );
            return false;
        }
        if variable.data_type() != wanted {
            warn!(
                "Variable {} is {} but a {} action tried to set it",
                variable_name,
                variable.data_type().as_str(),
                wanted.as_str()
            );
            return false;
        }
        true
    }

    fn run_boolean_action(&mut self, uuid: Uuid, variable_name: &str, operator: &str, expression: &str, args: &VariableArgs) {
        if !self.settable(uuid, variable_name, VariableDataType::Boolean) {
            return;
        }

        let fresh;
        let player = match self.players.get(&uuid) {
            Some(player) => player,
            None => {
                fresh = QuestPlayer::new(uuid);
                &fresh
            }
        };
        let ctx = self.ctx();

        if let Some(current) = ctx.get_value(variable_name, player, args) {
            if current.as_bool().is_none() {
                warn!("Variable {} did not hold a boolean, aborting action", variable_name);
                return;
            }
        }

        let new_value = match ctx.evaluate_boolean(expression, player, args) {
            Ok(value) => value,
            Err(e) => {
                warn!("Boolean action on {} failed: {}", variable_name, e);
                self.send_message(uuid, &format!("Error: could not evaluate {}.", expression));
                return;
            }
        };
        let new_value = match operator.to_lowercase().as_str() {
            "set" => new_value,
            "setnot" => !new_value,
            _ => {
                warn!("Unknown boolean operator {} for {}", operator, variable_name);
                return;
            }
        };

        if !self.set_variable(uuid, variable_name, VariableValue::Boolean(new_value), args) {
            warn!("Variable {} rejected {} for {}", variable_name, new_value, uuid);
        }
    }

    fn run_number_action(&mut self, uuid: Uuid, variable_name: &str, operator: &str, expression: &str, args: &VariableArgs) {
        if !self.settable(uuid, variable_name, VariableDataType::Number) {
            return;
        }

        let fresh;
        let player = match self.players.get(&uuid) {
            Some(player) => player,
            None => {
                fresh = QuestPlayer::new(uuid);
                &fresh
            }
        };
        let ctx = self.ctx();

        let current = match ctx.get_value(variable_name, player, args) {
            Some(value) => match value.as_number() {
                Some(n) => n,
                None => {
                    warn!("Variable {} did not hold a number, aborting action", variable_name);
                    return;
                }
            },
            None => 0.0,
        };
        let operand = match ctx.evaluate(expression, player, args) {
            Ok(value) => value,
            Err(e) => {
                warn!("Number action on {} failed: {}", variable_name, e);
                self.send_message(uuid, &format!("Error: could not evaluate {}.", expression));
                return;
            }
        };
        let Some(new_value) = apply_number_operator(operator, current, operand) else {
            warn!("Number action {} {} {} is not valid", variable_name, operator, operand);
            return;
        };

        info!("{} {} {} -> {} for {}", variable_name, operator, operand, new_value, uuid);
        if !self.set_variable(uuid, variable_name, VariableValue::Number(new_value), args) {
            warn!("Variable {} rejected {} for {}", variable_name, new_value, uuid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::engine_with;
    use crate::action::{Action, ActionKind};
    use crate::host::EconomyService;

    #[test]
    fn test_console_command_placeholders() {
        let (mut engine, host) = engine_with(vec![]);
        let uuid = host.add_player("Steve");
        let action = Action::new(ActionKind::ConsoleCommand {
            console_command: "give {PLAYER} diamond # {QUEST} {PLAYERUUID}".to_string(),
        });
        engine.execute_action(uuid, &action, Some("Miner"));
        assert_eq!(
            host.console_commands(),
            vec![format!("give Steve diamond # Miner {}", uuid)]
        );
    }

    #[test]
    fn test_number_action_on_money() {
        let (mut engine, host) = engine_with(vec![]);
        let uuid = host.add_player("Steve");
        host.deposit(uuid, 10.0);
        let action = Action::new(ActionKind::Number {
            variable_name: "Money".to_string(),
            operator: "multiply".to_string(),
            expression: "3".to_string(),
            additional_strings: Default::default(),
        });
        engine.execute_action(uuid, &action, None);
        assert_eq!(host.balance(uuid), 30.0);

        let divide_by_zero = Action::new(ActionKind::Number {
            variable_name: "Money".to_string(),
            operator: "divide".to_string(),
            expression: "0".to_string(),
            additional_strings: Default::default(),
        });
        engine.execute_action(uuid, &divide_by_zero, None);
        assert_eq!(host.balance(uuid), 30.0);
    }

    #[test]
    fn test_read_only_variable_is_reported() {
        let (mut engine, host) = engine_with(vec![]);
        let uuid = host.add_player("Steve");
        let action = Action::new(ActionKind::Number {
            variable_name: "TownyTownPlotCount".to_string(),
            operator: "set".to_string(),
            expression: "4".to_string(),
            additional_strings: Default::default(),
        });
        engine.execute_action(uuid, &action, None);
        assert!(host.messages(uuid).iter().any(|m| m.contains("cannot be set")));
    }

    #[test]
    fn test_self_referencing_named_action_terminates() {
        let (mut engine, host) = engine_with(vec![]);
        let uuid = host.add_player("Steve");
        engine.actions_mut().insert("again", Action::new(ActionKind::Action { action_name: "again".to_string() }));
        engine.execute_named_action(uuid, "again", None);
        assert!(engine.execute_named_action(uuid, "AGAIN", None));
        assert!(!engine.execute_named_action(uuid, "missing", None));
    }

    #[test]
    fn test_give_money_without_economy() {
        use crate::action::ActionStore;
        use crate::config::IntegrationsConfig;
        use crate::engine::QuestEngine;
        use crate::host::{HostServices, MemoryHost};
        use crate::quest::QuestStore;
        use crate::variable::VariableRegistry;
        use std::sync::Arc;

        let host = Arc::new(MemoryHost::new());
        let integrations = IntegrationsConfig { economy: false, ..Default::default() };
        let mut engine = QuestEngine::new(
            QuestStore::new(),
            ActionStore::new(),
            VariableRegistry::with_defaults(&integrations),
            HostServices::memory(host.clone(), &integrations),
        )
        .unwrap();
        let uuid = host.add_player("Steve");
        engine.execute_action(uuid, &Action::new(ActionKind::GiveMoney { money_amount: 5.0 }), None);
        assert!(host.messages(uuid).iter().any(|m| m.contains("economy")));
        assert_eq!(host.balance(uuid), 0.0);
    }
}
