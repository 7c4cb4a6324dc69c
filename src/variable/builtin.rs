//! Built-in variables

use super::{EvalContext, Variable, VariableArgs, VariableDataType, VariableValue};
use crate::quest::state::QuestPlayer;

// ============================================================================
// Quest state
// ============================================================================

pub struct QuestPointsVariable;

impl Variable for QuestPointsVariable {
    fn data_type(&self) -> VariableDataType {
        VariableDataType::Number
    }

    fn can_set_value(&self) -> bool {
        true
    }

    fn get_value(&self, _ctx: &EvalContext<'_>, player: &QuestPlayer, _args: &VariableArgs) -> Option<VariableValue> {
        Some(VariableValue::Number(player.quest_points as f64))
    }

    fn set_value_internally(
        &self,
        _ctx: &EvalContext<'_>,
        value: &VariableValue,
        player: &mut QuestPlayer,
        _args: &VariableArgs,
    ) -> bool {
        match value.as_number() {
            Some(n) => {
                player.quest_points = (n.round() as i64).max(0);
                true
            }
            None => false,
        }
    }

    fn plural(&self) -> &'static str {
        "Quest Points"
    }

    fn singular(&self) -> &'static str {
        "Quest Point"
    }
}

pub struct ActiveQuestsVariable;

impl Variable for ActiveQuestsVariable {
    fn data_type(&self) -> VariableDataType {
        VariableDataType::List
    }

    fn get_value(&self, _ctx: &EvalContext<'_>, player: &QuestPlayer, _args: &VariableArgs) -> Option<VariableValue> {
        Some(VariableValue::List(
            player.active_quests.iter().map(|q| q.quest_name.clone()).collect(),
        ))
    }

    fn plural(&self) -> &'static str {
        "Active Quests"
    }

    fn singular(&self) -> &'static str {
        "Active Quest"
    }
}

pub struct CompletedQuestsVariable;

impl Variable for CompletedQuestsVariable {
    fn data_type(&self) -> VariableDataType {
        VariableDataType::List
    }

    fn get_value(&self, _ctx: &EvalContext<'_>, player: &QuestPlayer, _args: &VariableArgs) -> Option<VariableValue> {
        Some(VariableValue::List(
            player
                .completed_quests
                .iter()
                .map(|q| q.quest_name.clone())
                .collect(),
        ))
    }

    fn plural(&self) -> &'static str {
        "Completed Quests"
    }

    fn singular(&self) -> &'static str {
        "Completed Quest"
    }
}

/// Boolean flag stored on the quest player, keyed by `TagName`
pub struct TagVariable;

impl Variable for TagVariable {
    fn data_type(&self) -> VariableDataType {
        VariableDataType::Boolean
    }

    fn can_set_value(&self) -> bool {
        true
    }

    fn required_strings(&self) -> &'static [&'static str] {
        &["TagName"]
    }

    fn get_value(&self, _ctx: &EvalContext<'_>, player: &QuestPlayer, args: &VariableArgs) -> Option<VariableValue> {
        let tag = args.string("TagName")?;
        Some(VariableValue::Boolean(player.tags.contains(&tag.to_lowercase())))
    }

    fn set_value_internally(
        &self,
        _ctx: &EvalContext<'_>,
        value: &VariableValue,
        player: &mut QuestPlayer,
        args: &VariableArgs,
    ) -> bool {
        let (Some(tag), Some(set)) = (args.string("TagName"), value.as_bool()) else {
            return false;
        };
        if set {
            player.tags.insert(tag.to_lowercase());
        } else {
            player.tags.remove(&tag.to_lowercase());
        }
        true
    }

    fn possible_values(&self, _ctx: &EvalContext<'_>, _player: Option<&QuestPlayer>, _args: &VariableArgs) -> Vec<String> {
        vec!["true".to_string(), "false".to_string()]
    }

    fn plural(&self) -> &'static str {
        "Tags"
    }

    fn singular(&self) -> &'static str {
        "Tag"
    }
}

// ============================================================================
// Host server
// ============================================================================

pub struct PermissionVariable;

impl Variable for PermissionVariable {
    fn data_type(&self) -> VariableDataType {
        VariableDataType::Boolean
    }

    fn can_set_value(&self) -> bool {
        true
    }

    fn required_strings(&self) -> &'static [&'static str] {
        &["Permission"]
    }

    fn get_value(&self, ctx: &EvalContext<'_>, player: &QuestPlayer, args: &VariableArgs) -> Option<VariableValue> {
        let node = args.string("Permission")?;
        Some(VariableValue::Boolean(ctx.host.server.has_permission(player.uuid, node)))
    }

    fn set_value_internally(
        &self,
        ctx: &EvalContext<'_>,
        value: &VariableValue,
        player: &mut QuestPlayer,
        args: &VariableArgs,
    ) -> bool {
        match (args.string("Permission"), value.as_bool()) {
            (Some(node), Some(set)) => ctx.host.server.set_permission(player.uuid, node, set),
            _ => false,
        }
    }

    fn possible_values(&self, _ctx: &EvalContext<'_>, _player: Option<&QuestPlayer>, _args: &VariableArgs) -> Vec<String> {
        vec!["true".to_string(), "false".to_string()]
    }

    fn plural(&self) -> &'static str {
        "Permissions"
    }

    fn singular(&self) -> &'static str {
        "Permission"
    }
}

pub struct PlayerCurrentBiomeVariable;

impl Variable for PlayerCurrentBiomeVariable {
    fn data_type(&self) -> VariableDataType {
        VariableDataType::String
    }

    fn get_value(&self, ctx: &EvalContext<'_>, player: &QuestPlayer, _args: &VariableArgs) -> Option<VariableValue> {
        ctx.host
            .server
            .current_biome(player.uuid)
            .map(VariableValue::String)
    }

    fn plural(&self) -> &'static str {
        "Biomes"
    }

    fn singular(&self) -> &'static str {
        "Biome"
    }
}

// ============================================================================
// Integrations
// ============================================================================

pub struct MoneyVariable;

impl Variable for MoneyVariable {
    fn data_type(&self) -> VariableDataType {
        VariableDataType::Number
    }

    fn can_set_value(&self) -> bool {
        true
    }

    fn get_value(&self, ctx: &EvalContext<'_>, player: &QuestPlayer, _args: &VariableArgs) -> Option<VariableValue> {
        let economy = ctx.host.economy.as_ref()?;
        Some(VariableValue::Number(economy.balance(player.uuid)))
    }

    fn set_value_internally(
        &self,
        ctx: &EvalContext<'_>,
        value: &VariableValue,
        player: &mut QuestPlayer,
        _args: &VariableArgs,
    ) -> bool {
        let (Some(economy), Some(target)) = (ctx.host.economy.as_ref(), value.as_number()) else {
            return false;
        };
        let current = economy.balance(player.uuid);
        if target > current {
            economy.deposit(player.uuid, target - current)
        } else if target < current {
            economy.withdraw(player.uuid, current - target)
        } else {
            true
        }
    }

    fn plural(&self) -> &'static str {
        "Money"
    }

    fn singular(&self) -> &'static str {
        "Money"
    }
}

pub struct ClanLevelVariable;

impl Variable for ClanLevelVariable {
    fn data_type(&self) -> VariableDataType {
        VariableDataType::Number
    }

    fn get_value(&self, ctx: &EvalContext<'_>, player: &QuestPlayer, _args: &VariableArgs) -> Option<VariableValue> {
        let clans = ctx.host.clans.as_ref()?;
        // No clan counts as level 0
        Some(VariableValue::Number(clans.clan_level(player.uuid).unwrap_or(0) as f64))
    }

    fn plural(&self) -> &'static str {
        "Clan Levels"
    }

    fn singular(&self) -> &'static str {
        "Clan Level"
    }
}

pub struct NationNameVariable;

impl Variable for NationNameVariable {
    fn data_type(&self) -> VariableDataType {
        VariableDataType::String
    }

    fn get_value(&self, ctx: &EvalContext<'_>, player: &QuestPlayer, _args: &VariableArgs) -> Option<VariableValue> {
        let nations = ctx.host.nations.as_ref()?;
        Some(VariableValue::String(nations.nation_name(player.uuid).unwrap_or_default()))
    }

    fn plural(&self) -> &'static str {
        "Nation Names"
    }

    fn singular(&self) -> &'static str {
        "Nation Name"
    }
}

pub struct NationTownCountVariable;

impl Variable for NationTownCountVariable {
    fn data_type(&self) -> VariableDataType {
        VariableDataType::Number
    }

    fn get_value(&self, ctx: &EvalContext<'_>, player: &QuestPlayer, _args: &VariableArgs) -> Option<VariableValue> {
        let nations = ctx.host.nations.as_ref()?;
        Some(VariableValue::Number(nations.nation_town_count(player.uuid).unwrap_or(0) as f64))
    }

    fn plural(&self) -> &'static str {
        "Towns in Nation"
    }

    fn singular(&self) -> &'static str {
        "Town in Nation"
    }
}

pub struct TownResidentCountVariable;

impl Variable for TownResidentCountVariable {
    fn data_type(&self) -> VariableDataType {
        VariableDataType::Number
    }

    fn get_value(&self, ctx: &EvalContext<'_>, player: &QuestPlayer, _args: &VariableArgs) -> Option<VariableValue> {
        let nations = ctx.host.nations.as_ref()?;
        Some(VariableValue::Number(nations.town_resident_count(player.uuid).unwrap_or(0) as f64))
    }

    fn plural(&self) -> &'static str {
        "Town Residents"
    }

    fn singular(&self) -> &'static str {
        "Town Resident"
    }
}

pub struct TownPlotCountVariable;

impl Variable for TownPlotCountVariable {
    fn data_type(&self) -> VariableDataType {
        VariableDataType::Number
    }

    fn get_value(&self, ctx: &EvalContext<'_>, player: &QuestPlayer, _args: &VariableArgs) -> Option<VariableValue> {
        let nations = ctx.host.nations.as_ref()?;
        Some(VariableValue::Number(nations.town_plot_count(player.uuid).unwrap_or(0) as f64))
    }

    fn plural(&self) -> &'static str {
        "Town Plots"
    }

    fn singular(&self) -> &'static str {
        "Town Plot"
    }
}

pub struct PlaceholderNumberVariable;

impl Variable for PlaceholderNumberVariable {
    fn data_type(&self) -> VariableDataType {
        VariableDataType::Number
    }

    fn required_strings(&self) -> &'static [&'static str] {
        &["Placeholder"]
    }

    fn get_value(&self, ctx: &EvalContext<'_>, player: &QuestPlayer, args: &VariableArgs) -> Option<VariableValue> {
        let placeholders = ctx.host.placeholders.as_ref()?;
        let placeholder = args.string("Placeholder")?;
        let text = placeholders.apply(player.uuid, placeholder);
        text.trim().parse::<f64>().ok().map(VariableValue::Number)
    }

    fn plural(&self) -> &'static str {
        "Placeholders"
    }

    fn singular(&self) -> &'static str {
        "Placeholder"
    }
}

pub struct PlaceholderStringVariable;

impl Variable for PlaceholderStringVariable {
    fn data_type(&self) -> VariableDataType {
        VariableDataType::String
    }

    fn required_strings(&self) -> &'static [&'static str] {
        &["Placeholder"]
    }

    fn get_value(&self, ctx: &EvalContext<'_>, player: &QuestPlayer, args: &VariableArgs) -> Option<VariableValue> {
        let placeholders = ctx.host.placeholders.as_ref()?;
        let placeholder = args.string("Placeholder")?;
        Some(VariableValue::String(placeholders.apply(player.uuid, placeholder)))
    }

    fn plural(&self) -> &'static str {
        "Placeholders"
    }

    fn singular(&self) -> &'static str {
        "Placeholder"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IntegrationsConfig;
    use crate::host::{HostServices, MemoryHost};
    use crate::variable::{ExpressionEvaluator, VariableRegistry};
    use std::sync::Arc;

    #[test]
    fn test_money_set_uses_deposit_and_withdraw() {
        let host = Arc::new(MemoryHost::new());
        let uuid = host.add_player("Alex");
        let services = HostServices::memory(host.clone(), &IntegrationsConfig::default());
        let registry = VariableRegistry::with_defaults(&IntegrationsConfig::default());
        let evaluator = ExpressionEvaluator::new().unwrap();
        let ctx = EvalContext { variables: &registry, evaluator: &evaluator, host: &services };
        let mut player = QuestPlayer::new(uuid);
        let args = VariableArgs::default();

        assert!(MoneyVariable.set_value_internally(&ctx, &VariableValue::Number(25.0), &mut player, &args));
        assert_eq!(MoneyVariable.get_value(&ctx, &player, &args), Some(VariableValue::Number(25.0)));
        assert!(MoneyVariable.set_value_internally(&ctx, &VariableValue::Number(5.0), &mut player, &args));
        assert_eq!(host.player(uuid).unwrap().balance, 5.0);
    }

    #[test]
    fn test_tag_requires_name() {
        let services = HostServices::memory(Arc::new(MemoryHost::new()), &IntegrationsConfig::default());
        let registry = VariableRegistry::new();
        let evaluator = ExpressionEvaluator::new().unwrap();
        let ctx = EvalContext { variables: &registry, evaluator: &evaluator, host: &services };
        let mut player = QuestPlayer::new(uuid::Uuid::new_v4());

        assert_eq!(TagVariable.get_value(&ctx, &player, &VariableArgs::default()), None);

        let args = VariableArgs::default().with_string("TagName", "Visited");
        assert!(TagVariable.set_value_internally(&ctx, &VariableValue::Boolean(true), &mut player, &args));
        assert_eq!(TagVariable.get_value(&ctx, &player, &args), Some(VariableValue::Boolean(true)));
    }
}
