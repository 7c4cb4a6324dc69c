//! Named Actions
//!
//! Actions defined once under a name (`actions.<name>` in actions.toml) and
//! referenced by triggers, `Action` rewards and the `actions execute` command.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{Action, RawAction};
use crate::error::Result;

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawActionDocument {
    #[serde(default)]
    actions: BTreeMap<String, RawAction>,
}

/// Named actions, looked up case-insensitively
#[derive(Debug, Default)]
pub struct ActionStore {
    actions: BTreeMap<String, Action>,
}

impl ActionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load actions.toml. A missing file is an empty store; broken entries
    /// are skipped.
    pub fn load(path: &Path) -> std::result::Result<Self, String> {
        let mut store = Self::new();
        if !path.exists() {
            warn!("Actions file {:?} not found, starting with no named actions", path);
            return Ok(store);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {:?}: {}", path, e))?;
        store.load_str(&content)
            .map_err(|e| format!("Failed to parse {:?}: {}", path, e))?;

        info!("Loaded {} actions from {:?}", store.len(), path);
        Ok(store)
    }

    /// Replace the contents with the actions in a TOML document
    pub fn load_str(&mut self, content: &str) -> std::result::Result<(), String> {
        let document: RawActionDocument = toml::from_str(content).map_err(|e| e.to_string())?;

        self.actions.clear();
        for (name, raw) in &document.actions {
            match Action::from_raw(raw) {
                Ok(mut action) => {
                    if action.name.is_empty() {
                        action.name = name.clone();
                    }
                    self.actions.insert(name.clone(), action);
                }
                Err(e) => warn!("Skipping action '{}': {}", name, e),
            }
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let document = RawActionDocument {
            actions: self
                .actions
                .iter()
                .map(|(name, action)| (name.clone(), action.to_raw()))
                .collect(),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(&document)?)?;
        Ok(())
    }

    fn key_of(&self, name: &str) -> Option<&String> {
        self.actions.keys().find(|k| k.eq_ignore_ascii_case(name))
    }

    pub fn get(&self, name: &str) -> Option<&Action> {
        let key = self.key_of(name)?;
        self.actions.get(key)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.key_of(name).is_some()
    }

    /// Add or replace a named action
    pub fn insert(&mut self, name: &str, mut action: Action) {
        if let Some(existing) = self.key_of(name).cloned() {
            self.actions.remove(&existing);
        }
        if action.name.is_empty() {
            action.name = name.to_string();
        }
        self.actions.insert(name.to_string(), action);
    }

    pub fn remove(&mut self, name: &str) -> Option<Action> {
        let key = self.key_of(name)?.clone();
        self.actions.remove(&key)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.actions.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Action)> {
        self.actions.iter()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use tempfile::TempDir;

    #[test]
    fn test_load_skips_invalid_entries() {
        let mut store = ActionStore::new();
        store
            .load_str(
                r#"
[actions.reward_vip]
type = "GiveQuestPoints"
specifics = { questPointsAmount = 5 }

[actions.broken]
type = "Teleport"
"#,
            )
            .unwrap();

        assert_eq!(store.len(), 1);
        let action = store.get("REWARD_VIP").unwrap();
        assert_eq!(action.kind, ActionKind::GiveQuestPoints { quest_points_amount: 5 });
        assert_eq!(action.name, "reward_vip");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("actions.toml");

        let mut store = ActionStore::new();
        store.insert(
            "greet",
            Action::new(ActionKind::ConsoleCommand { console_command: "say hi {PLAYER}".to_string() }),
        );
        store.save(&path).unwrap();

        let loaded = ActionStore::load(&path).unwrap();
        assert_eq!(loaded.get("greet"), store.get("greet"));
    }
}
