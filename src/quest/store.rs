//! Quest Store
//!
//! Owns every quest definition, keyed case-insensitively by name, and reads /
//! writes them as one versioned quests.toml document. Supports hot-reloading
//! during development.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::definition::{Quest, RawQuestDocument, SCHEMA_VERSION};
use crate::condition::ConditionKind;
use crate::error::{QuestError, Result};
use crate::objective::ObjectiveKind;

/// All quest definitions
#[derive(Debug, Default)]
pub struct QuestStore {
    /// Lowercase name -> quest
    quests: BTreeMap<String, Quest>,
}

impl QuestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load quests.toml. A missing file is an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        let mut store = Self::new();
        if !path.exists() {
            warn!("Quest file {:?} does not exist, starting with no quests", path);
            return Ok(store);
        }

        let content = std::fs::read_to_string(path)?;
        store.load_str(&content)?;
        info!("Loaded {} quest definitions from {:?}", store.len(), path);
        Ok(store)
    }

    /// Replace the contents with the quests in a TOML document
    pub fn load_str(&mut self, content: &str) -> Result<()> {
        let document: RawQuestDocument = toml::from_str(content)?;
        if document.schema_version > SCHEMA_VERSION {
            return Err(QuestError::SchemaVersion {
                found: document.schema_version,
                supported: SCHEMA_VERSION,
            });
        }

        self.quests.clear();
        for (name, raw) in &document.quests {
            if self.contains(name) {
                warn!("Duplicate quest name '{}' (names are case-insensitive), skipping", name);
                continue;
            }
            match Quest::from_raw(name, raw) {
                Ok(quest) => {
                    info!("Loaded quest: {} ({} objectives)", quest.name, quest.objectives.len());
                    self.quests.insert(name.to_lowercase(), quest);
                }
                Err(e) => warn!("Failed to load quest '{}': {}", name, e),
            }
        }

        self.validate_references();
        Ok(())
    }

    /// Warn about references to quests that do not exist
    fn validate_references(&self) {
        for quest in self.quests.values() {
            for condition in &quest.requirements {
                if let ConditionKind::OtherQuest { other_quest_name, .. } = &condition.kind {
                    if !self.contains(other_quest_name) {
                        warn!(
                            "Quest '{}' requires non-existent quest '{}'",
                            quest.name, other_quest_name
                        );
                    }
                }
            }
            for objective in &quest.objectives {
                if let ObjectiveKind::OtherQuest { other_quest_name, .. } = &objective.kind {
                    if !self.contains(other_quest_name) {
                        warn!(
                            "Objective {} of quest '{}' references non-existent quest '{}'",
                            objective.id, quest.name, other_quest_name
                        );
                    }
                }
            }
        }
    }

    pub fn to_document(&self) -> RawQuestDocument {
        RawQuestDocument {
            schema_version: SCHEMA_VERSION,
            quests: self
                .quests
                .values()
                .map(|quest| (quest.name.clone(), quest.to_raw()))
                .collect(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(&self.to_document())?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reserve a new quest name
    pub fn create(&mut self, name: &str) -> std::result::Result<&mut Quest, String> {
        if name.trim().is_empty() {
            return Err("Quest name must not be empty".to_string());
        }
        let key = name.to_lowercase();
        if self.quests.contains_key(&key) {
            return Err(format!("Quest {} already exists!", name));
        }
        info!("Created quest {}", name);
        Ok(self.quests.entry(key).or_insert_with(|| Quest::new(name)))
    }

    pub fn insert(&mut self, quest: Quest) {
        self.quests.insert(quest.name.to_lowercase(), quest);
    }

    /// Remove a quest and everything it owns
    pub fn delete(&mut self, name: &str) -> Option<Quest> {
        let removed = self.quests.remove(&name.to_lowercase());
        if let Some(quest) = &removed {
            info!("Deleted quest {}", quest.name);
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<&Quest> {
        self.quests.get(&name.to_lowercase())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Quest> {
        self.quests.get_mut(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.quests.contains_key(&name.to_lowercase())
    }

    pub fn all(&self) -> impl Iterator<Item = &Quest> {
        self.quests.values()
    }

    pub fn names(&self) -> Vec<String> {
        self.quests.values().map(|q| q.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.quests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quests.is_empty()
    }

    /// Whether any quest has a TriggerCommand objective with this name
    pub fn trigger_name_exists(&self, trigger_name: &str) -> bool {
        self.quests.values().any(|q| q.uses_trigger_name(trigger_name))
    }

    /// Watch the data files for changes and report them on the returned channel
    pub fn start_file_watcher(
        files: Vec<PathBuf>,
    ) -> std::result::Result<tokio::sync::mpsc::Receiver<HotReloadEvent>, String> {
        use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};

        let (tx, rx) = tokio::sync::mpsc::channel(32);

        // notify is sync, so the watcher lives on its own thread
        std::thread::spawn(move || {
            let (notify_tx, notify_rx) = std::sync::mpsc::channel();

            let mut watcher = match RecommendedWatcher::new(
                move |res: std::result::Result<notify::Event, notify::Error>| {
                    if let Ok(event) = res {
                        let _ = notify_tx.send(event);
                    }
                },
                Config::default(),
            ) {
                Ok(w) => w,
                Err(e) => {
                    tracing::error!("Failed to create file watcher: {}", e);
                    return;
                }
            };

            // Watch the parent directories; editors often replace files instead of writing in place
            let mut dirs: Vec<PathBuf> = files
                .iter()
                .filter_map(|f| f.parent().map(|p| p.to_path_buf()))
                .collect();
            dirs.sort();
            dirs.dedup();
            for dir in &dirs {
                if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
                    tracing::error!("Failed to watch {:?}: {}", dir, e);
                }
            }

            info!("Quest hot-reload watcher started for {:?}", files);

            while let Ok(event) = notify_rx.recv() {
                use notify::EventKind;
                if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    continue;
                }
                for path in &event.paths {
                    let watched = files
                        .iter()
                        .any(|f| f.file_name().is_some() && f.file_name() == path.file_name());
                    if !watched {
                        continue;
                    }
                    info!("Detected change in {:?}, triggering reload", path);
                    if tx
                        .blocking_send(HotReloadEvent::Changed(path.to_string_lossy().to_string()))
                        .is_err()
                    {
                        // Receiver dropped, stop watching
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}

/// Events from the hot-reload watcher
#[derive(Debug, Clone)]
pub enum HotReloadEvent {
    /// A watched file changed on disk
    Changed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, ActionKind};
    use crate::condition::Condition;
    use crate::objective::Objective;
    use crate::quest::definition::{Trigger, TriggerType};
    use tempfile::TempDir;

    fn sample_quest() -> Quest {
        let mut quest = Quest::new("Woodcutter");
        quest.display_name = "The Woodcutter".to_string();
        quest.max_accepts = 3;
        quest.accept_cooldown = 60;

        let mut chop = Objective::new(
            1,
            ObjectiveKind::CollectItems { item_to_collect: "OAK_LOG".to_string(), collect_any_item: false },
        );
        chop.progress_needed = 16;
        chop.conditions.push(Condition {
            objective_id: Some(1),
            ..Condition::new(ConditionKind::Permission { required_permission: "jobs.wood".to_string() })
        });
        quest.add_objective(chop);

        let mut craft = Objective::new(
            2,
            ObjectiveKind::CraftItems { item_to_craft: "CHEST".to_string(), craft_any_item: false },
        );
        craft.dependencies = vec![1];
        craft.rewards.push(Action::new(ActionKind::GiveItem { item: "DIAMOND".to_string(), amount: 1 }));
        quest.add_objective(craft);

        quest.requirements.push(Condition::new(ConditionKind::QuestPoints { min_quest_points: 5, deduct: true }));
        quest.rewards.push(Action::new(ActionKind::GiveQuestPoints { quest_points_amount: 10 }));
        quest.triggers.push(Trigger::new(TriggerType::Death, "fail_on_death"));
        quest
    }

    #[test]
    fn test_create_rejects_duplicates_case_insensitively() {
        let mut store = QuestStore::new();
        assert!(store.create("Q1").is_ok());
        assert!(store.create("q1").is_err());
        assert!(store.get("Q1").is_some());
        assert!(store.delete("q1").is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_and_reload_reproduces_quests() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quests.toml");

        let mut store = QuestStore::new();
        store.insert(sample_quest());
        store.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("schemaVersion = 1"));

        let loaded = QuestStore::load(&path).unwrap();
        assert_eq!(loaded.get("woodcutter"), Some(&sample_quest()));
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let mut store = QuestStore::new();
        let result = store.load_str("schemaVersion = 99\n");
        assert!(matches!(result, Err(QuestError::SchemaVersion { found: 99, .. })));
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = QuestStore::load(&dir.path().join("quests.toml")).unwrap();
        assert!(store.is_empty());
    }
}
