//! Host Services
//!
//! The quest engine never talks to the game world directly. Everything it
//! needs from the surrounding server (permissions, economy, clan and nation
//! membership, placeholders, console commands) goes through these traits.
//! Optional integrations are `None` when the backing plugin is not installed.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use uuid::Uuid;

use crate::config::IntegrationsConfig;

/// Core server capabilities, always present
pub trait ServerHost: Send + Sync {
    fn player_uuid(&self, name: &str) -> Option<Uuid>;
    fn player_name(&self, uuid: Uuid) -> Option<String>;
    fn is_online(&self, uuid: Uuid) -> bool;
    fn has_permission(&self, uuid: Uuid, node: &str) -> bool;
    fn set_permission(&self, uuid: Uuid, node: &str, value: bool) -> bool;
    fn send_message(&self, uuid: Uuid, message: &str);
    fn dispatch_console_command(&self, command: &str) -> bool;
    fn give_item(&self, uuid: Uuid, item: &str, amount: u32) -> bool;
    fn current_biome(&self, uuid: Uuid) -> Option<String>;
    fn online_players(&self) -> Vec<String>;
}

/// Economy plugin (balance query, deposit, withdraw)
pub trait EconomyService: Send + Sync {
    fn balance(&self, uuid: Uuid) -> f64;
    fn deposit(&self, uuid: Uuid, amount: f64) -> bool;
    fn withdraw(&self, uuid: Uuid, amount: f64) -> bool;
}

/// Clan plugin, read-only
pub trait ClanService: Send + Sync {
    fn clan_level(&self, uuid: Uuid) -> Option<i64>;
}

/// Town / nation plugin, read-only
pub trait NationService: Send + Sync {
    fn nation_name(&self, uuid: Uuid) -> Option<String>;
    fn nation_town_count(&self, uuid: Uuid) -> Option<i64>;
    fn town_resident_count(&self, uuid: Uuid) -> Option<i64>;
    fn town_plot_count(&self, uuid: Uuid) -> Option<i64>;
}

/// Placeholder substitution service
pub trait PlaceholderService: Send + Sync {
    fn apply(&self, uuid: Uuid, text: &str) -> String;
}

/// All collaborators handed to the engine at construction
#[derive(Clone)]
pub struct HostServices {
    pub server: Arc<dyn ServerHost>,
    pub economy: Option<Arc<dyn EconomyService>>,
    pub clans: Option<Arc<dyn ClanService>>,
    pub nations: Option<Arc<dyn NationService>>,
    pub placeholders: Option<Arc<dyn PlaceholderService>>,
}

impl HostServices {
    /// Wire every service to one in-memory host, honouring the integration toggles
    pub fn memory(host: Arc<MemoryHost>, integrations: &IntegrationsConfig) -> Self {
        Self {
            server: host.clone(),
            economy: integrations
                .economy
                .then(|| host.clone() as Arc<dyn EconomyService>),
            clans: integrations
                .ultimate_clans
                .then(|| host.clone() as Arc<dyn ClanService>),
            nations: integrations
                .towny
                .then(|| host.clone() as Arc<dyn NationService>),
            placeholders: integrations
                .placeholder_api
                .then(|| host.clone() as Arc<dyn PlaceholderService>),
        }
    }

    pub fn integrations(&self) -> IntegrationsConfig {
        IntegrationsConfig {
            economy: self.economy.is_some(),
            towny: self.nations.is_some(),
            ultimate_clans: self.clans.is_some(),
            placeholder_api: self.placeholders.is_some(),
        }
    }

    /// Display name for messages, falling back to the UUID
    pub fn display_name(&self, uuid: Uuid) -> String {
        self.server
            .player_name(uuid)
            .unwrap_or_else(|| uuid.to_string())
    }
}

// ============================================================================
// In-memory host
// ============================================================================

/// Per-player data held by the in-memory host
#[derive(Debug, Clone, Default)]
pub struct MemoryPlayer {
    pub name: String,
    pub online: bool,
    pub permissions: HashSet<String>,
    pub balance: f64,
    pub biome: Option<String>,
    pub clan_level: Option<i64>,
    pub nation: Option<String>,
    pub nation_town_count: Option<i64>,
    pub town_resident_count: Option<i64>,
    pub town_plot_count: Option<i64>,
    pub items: HashMap<String, u32>,
    pub placeholders: HashMap<String, String>,
    pub messages: Vec<String>,
}

/// Host backed by concurrent maps. Used by the standalone server, where a
/// game server registers its players over HTTP, and by tests.
#[derive(Default)]
pub struct MemoryHost {
    names: DashMap<String, Uuid>,
    players: DashMap<Uuid, MemoryPlayer>,
    console_log: Mutex<Vec<String>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or re-register) an online player
    pub fn add_player(&self, name: &str) -> Uuid {
        if let Some(uuid) = self.names.get(&name.to_lowercase()) {
            let uuid = *uuid;
            if let Some(mut player) = self.players.get_mut(&uuid) {
                player.online = true;
            }
            return uuid;
        }
        self.add_player_with_uuid(name, Uuid::new_v4())
    }

    pub fn add_player_with_uuid(&self, name: &str, uuid: Uuid) -> Uuid {
        self.names.insert(name.to_lowercase(), uuid);
        self.players.insert(
            uuid,
            MemoryPlayer {
                name: name.to_string(),
                online: true,
                ..Default::default()
            },
        );
        uuid
    }

    pub fn set_online(&self, uuid: Uuid, online: bool) {
        if let Some(mut player) = self.players.get_mut(&uuid) {
            player.online = online;
        }
    }

    pub fn with_player<R>(&self, uuid: Uuid, f: impl FnOnce(&mut MemoryPlayer) -> R) -> Option<R> {
        self.players.get_mut(&uuid).map(|mut p| f(&mut p))
    }

    pub fn player(&self, uuid: Uuid) -> Option<MemoryPlayer> {
        self.players.get(&uuid).map(|p| p.clone())
    }

    pub fn messages(&self, uuid: Uuid) -> Vec<String> {
        self.players
            .get(&uuid)
            .map(|p| p.messages.clone())
            .unwrap_or_default()
    }

    pub fn console_commands(&self) -> Vec<String> {
        self.console_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }
}

impl ServerHost for MemoryHost {
    fn player_uuid(&self, name: &str) -> Option<Uuid> {
        if let Ok(uuid) = Uuid::parse_str(name) {
            if self.players.contains_key(&uuid) {
                return Some(uuid);
            }
        }
        self.names.get(&name.to_lowercase()).map(|u| *u)
    }

    fn player_name(&self, uuid: Uuid) -> Option<String> {
        self.players.get(&uuid).map(|p| p.name.clone())
    }

    fn is_online(&self, uuid: Uuid) -> bool {
        self.players.get(&uuid).map(|p| p.online).unwrap_or(false)
    }

    fn has_permission(&self, uuid: Uuid, node: &str) -> bool {
        self.players
            .get(&uuid)
            .map(|p| p.permissions.contains(node))
            .unwrap_or(false)
    }

    fn set_permission(&self, uuid: Uuid, node: &str, value: bool) -> bool {
        self.with_player(uuid, |p| {
            if value {
                p.permissions.insert(node.to_string());
            } else {
                p.permissions.remove(node);
            }
        })
        .is_some()
    }

    fn send_message(&self, uuid: Uuid, message: &str) {
        self.with_player(uuid, |p| p.messages.push(message.to_string()));
    }

    fn dispatch_console_command(&self, command: &str) -> bool {
        match self.console_log.lock() {
            Ok(mut log) => {
                log.push(command.to_string());
                true
            }
            Err(_) => false,
        }
    }

    fn give_item(&self, uuid: Uuid, item: &str, amount: u32) -> bool {
        self.with_player(uuid, |p| {
            *p.items.entry(item.to_string()).or_insert(0) += amount;
        })
        .is_some()
    }

    fn current_biome(&self, uuid: Uuid) -> Option<String> {
        self.players.get(&uuid).and_then(|p| p.biome.clone())
    }

    fn online_players(&self) -> Vec<String> {
        self.players
            .iter()
            .filter(|p| p.online)
            .map(|p| p.name.clone())
            .collect()
    }
}

impl EconomyService for MemoryHost {
    fn balance(&self, uuid: Uuid) -> f64 {
        self.players.get(&uuid).map(|p| p.balance).unwrap_or(0.0)
    }

    fn deposit(&self, uuid: Uuid, amount: f64) -> bool {
        self.with_player(uuid, |p| p.balance += amount).is_some()
    }

    fn withdraw(&self, uuid: Uuid, amount: f64) -> bool {
        self.with_player(uuid, |p| {
            if p.balance >= amount {
                p.balance -= amount;
                true
            } else {
                false
            }
        })
        .unwrap_or(false)
    }
}

impl ClanService for MemoryHost {
    fn clan_level(&self, uuid: Uuid) -> Option<i64> {
        self.players.get(&uuid).and_then(|p| p.clan_level)
    }
}

impl NationService for MemoryHost {
    fn nation_name(&self, uuid: Uuid) -> Option<String> {
        self.players.get(&uuid).and_then(|p| p.nation.clone())
    }

    fn nation_town_count(&self, uuid: Uuid) -> Option<i64> {
        self.players.get(&uuid).and_then(|p| p.nation_town_count)
    }

    fn town_resident_count(&self, uuid: Uuid) -> Option<i64> {
        self.players.get(&uuid).and_then(|p| p.town_resident_count)
    }

    fn town_plot_count(&self, uuid: Uuid) -> Option<i64> {
        self.players.get(&uuid).and_then(|p| p.town_plot_count)
    }
}

impl PlaceholderService for MemoryHost {
    fn apply(&self, uuid: Uuid, text: &str) -> String {
        let Some(player) = self.players.get(&uuid) else {
            return text.to_string();
        };
        let mut result = text.to_string();
        for (key, value) in &player.placeholders {
            result = result.replace(key.as_str(), value);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_lookup_is_case_insensitive() {
        let host = MemoryHost::new();
        let uuid = host.add_player("Steve");
        assert_eq!(host.player_uuid("steve"), Some(uuid));
        assert_eq!(host.player_uuid(&uuid.to_string()), Some(uuid));
        assert_eq!(host.player_name(uuid).as_deref(), Some("Steve"));
        // Re-adding keeps the same UUID
        assert_eq!(host.add_player("STEVE"), uuid);
    }

    #[test]
    fn test_withdraw_requires_funds() {
        let host = MemoryHost::new();
        let uuid = host.add_player("Alex");
        host.deposit(uuid, 10.0);
        assert!(!host.withdraw(uuid, 20.0));
        assert!(host.withdraw(uuid, 4.0));
        assert_eq!(host.balance(uuid), 6.0);
    }

    #[test]
    fn test_disabled_integrations_are_none() {
        let host = Arc::new(MemoryHost::new());
        let integrations = IntegrationsConfig {
            economy: false,
            towny: true,
            ultimate_clans: false,
            placeholder_api: true,
        };
        let services = HostServices::memory(host, &integrations);
        assert!(services.economy.is_none());
        assert!(services.nations.is_some());
        assert!(services.clans.is_none());
        assert!(!services.integrations().economy);
    }
}
