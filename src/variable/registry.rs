//! Variable Registry
//!
//! Maps identifiers to factory functions. Each lookup builds a fresh
//! instance; unknown identifiers yield `None` and callers skip.

use std::collections::HashMap;

use tracing::{info, warn};

use super::builtin::*;
use super::Variable;
use crate::config::IntegrationsConfig;

/// Builds a new variable instance
pub type VariableFactory = fn() -> Box<dyn Variable>;

/// Registry of every known variable identifier
#[derive(Default)]
pub struct VariableRegistry {
    factories: HashMap<String, VariableFactory>,
    /// Registration order, used for listings
    identifiers: Vec<String>,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in variables for the enabled integrations
    pub fn with_defaults(integrations: &IntegrationsConfig) -> Self {
        let mut registry = Self::new();
        registry.register_default_variables(integrations);
        registry
    }

    pub fn register(&mut self, identifier: &str, factory: VariableFactory) {
        if self.factories.insert(identifier.to_string(), factory).is_some() {
            warn!("Variable '{}' registered twice, replacing the old one", identifier);
        } else {
            self.identifiers.push(identifier.to_string());
        }
        info!("Registered variable <{}>", identifier);
    }

    /// Fresh instance for an identifier (exact match first, then case-insensitive)
    pub fn lookup(&self, identifier: &str) -> Option<Box<dyn Variable>> {
        let factory = match self.factories.get(identifier) {
            Some(factory) => factory,
            None => {
                let canonical = self.canonical(identifier)?;
                self.factories.get(canonical)?
            }
        };
        Some(factory())
    }

    /// Registered spelling of an identifier
    pub fn canonical(&self, identifier: &str) -> Option<&str> {
        self.identifiers
            .iter()
            .find(|id| id.eq_ignore_ascii_case(identifier))
            .map(|id| id.as_str())
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.canonical(identifier).is_some()
    }

    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    /// Identifiers ordered so that no identifier precedes one that contains it
    pub fn identifiers_longest_first(&self) -> Vec<&str> {
        let mut identifiers: Vec<&str> = self.identifiers.iter().map(|s| s.as_str()).collect();
        identifiers.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        identifiers
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    /// Register the built-in variables. Integration-backed ones are only
    /// registered when that integration is enabled.
    pub fn register_default_variables(&mut self, integrations: &IntegrationsConfig) {
        self.register("QuestPoints", || Box::new(QuestPointsVariable));
        self.register("ActiveQuests", || Box::new(ActiveQuestsVariable));
        self.register("CompletedQuests", || Box::new(CompletedQuestsVariable));
        self.register("Permission", || Box::new(PermissionVariable));
        self.register("Tag", || Box::new(TagVariable));
        self.register("PlayerCurrentBiome", || Box::new(PlayerCurrentBiomeVariable));

        if integrations.economy {
            self.register("Money", || Box::new(MoneyVariable));
        }
        if integrations.ultimate_clans {
            self.register("UltimateClansClanLevel", || Box::new(ClanLevelVariable));
        }
        if integrations.towny {
            self.register("TownyNationName", || Box::new(NationNameVariable));
            self.register("TownyNationTownCount", || Box::new(NationTownCountVariable));
            self.register("TownyTownResidentCount", || Box::new(TownResidentCountVariable));
            self.register("TownyTownPlotCount", || Box::new(TownPlotCountVariable));
        }
        if integrations.placeholder_api {
            self.register("PlaceholderAPINumber", || Box::new(PlaceholderNumberVariable));
            self.register("PlaceholderAPIString", || Box::new(PlaceholderStringVariable));
        }

        info!("{} variables available", self.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::VariableDataType;

    #[test]
    fn test_lookup_is_fresh_and_case_insensitive() {
        let registry = VariableRegistry::with_defaults(&IntegrationsConfig::default());
        let variable = registry.lookup("questpoints").unwrap();
        assert_eq!(variable.data_type(), VariableDataType::Number);
        assert!(variable.can_set_value());
        assert_eq!(registry.canonical("questpoints"), Some("QuestPoints"));
        assert!(registry.lookup("NoSuchVariable").is_none());
    }

    #[test]
    fn test_disabled_integrations_not_registered() {
        let integrations = IntegrationsConfig {
            economy: false,
            towny: false,
            ultimate_clans: true,
            placeholder_api: false,
        };
        let registry = VariableRegistry::with_defaults(&integrations);
        assert!(!registry.contains("Money"));
        assert!(!registry.contains("TownyNationName"));
        assert!(registry.contains("UltimateClansClanLevel"));
    }

    #[test]
    fn test_longest_first_ordering() {
        let registry = VariableRegistry::with_defaults(&IntegrationsConfig::default());
        let ordered = registry.identifiers_longest_first();
        for (i, a) in ordered.iter().enumerate() {
            for b in &ordered[i + 1..] {
                assert!(!b.contains(a) || a == b, "{} must come after {}", a, b);
            }
        }
    }
}
