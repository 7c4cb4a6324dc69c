//! Command Layer
//!
//! Text commands as typed in chat or the console. Every command answers with
//! chat lines; nothing here panics on bad input.

pub mod admin;
pub mod completion;
pub mod edit;
pub mod player;

use std::path::PathBuf;

use tracing::{debug, error};
use uuid::Uuid;

use crate::engine::QuestEngine;

pub use completion::complete;

/// Permission needed for `/notquestsadmin`
pub const ADMIN_PERMISSION: &str = "notquests.admin";
/// Permission needed for `/notquests`
pub const USE_PERMISSION: &str = "notquests.use";

pub const ADMIN_ALIASES: &[&str] = &["notquestsadmin", "qadmin", "nqa"];
pub const PLAYER_ALIASES: &[&str] = &["notquests", "nq"];

/// Who issued a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSender {
    Console,
    Player(Uuid),
}

/// Where definition files are written after edits
#[derive(Debug, Clone)]
pub struct DataFiles {
    pub quests: PathBuf,
    pub actions: PathBuf,
}

/// Result of a subcommand before definitions are persisted
#[derive(Debug, Default)]
pub struct Reply {
    pub lines: Vec<String>,
    pub quests_changed: bool,
    pub actions_changed: bool,
}

impl Reply {
    pub fn line(text: impl Into<String>) -> Self {
        Self { lines: vec![text.into()], ..Default::default() }
    }

    pub fn lines(lines: Vec<String>) -> Self {
        Self { lines, ..Default::default() }
    }

    /// Mark quest definitions as modified
    pub fn quests(mut self) -> Self {
        self.quests_changed = true;
        self
    }

    pub fn actions(mut self) -> Self {
        self.actions_changed = true;
        self
    }
}

/// Split a command line into words; double quotes group words
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut has_token = false;

    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                has_token = true;
            }
            c if c.is_whitespace() && !quoted => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        tokens.push(current);
    }
    tokens
}

/// Run a full command line (`/qadmin create Q1`) and return the chat lines
pub fn execute(engine: &mut QuestEngine, files: &DataFiles, sender: CommandSender, line: &str) -> Vec<String> {
    let tokens = tokenize(line.trim().trim_start_matches('/'));
    let Some((root, args)) = tokens.split_first() else {
        return vec!["Please enter a command.".to_string()];
    };
    debug!("{:?} ran '{}'", sender, line);

    let root = root.to_lowercase();
    let reply = if ADMIN_ALIASES.contains(&root.as_str()) {
        if !has_permission(engine, sender, ADMIN_PERMISSION) {
            return vec![format!("No permission! Required permission node: {}", ADMIN_PERMISSION)];
        }
        admin::execute(engine, files, sender, args)
    } else if PLAYER_ALIASES.contains(&root.as_str()) {
        let CommandSender::Player(uuid) = sender else {
            return vec!["This command can only be run by a player.".to_string()];
        };
        if !has_permission(engine, sender, USE_PERMISSION) {
            return vec![format!("No permission! Required permission node: {}", USE_PERMISSION)];
        }
        player::execute(engine, uuid, args)
    } else {
        return vec![format!("Unknown command: {}", root)];
    };

    persist(engine, files, reply)
}

fn has_permission(engine: &QuestEngine, sender: CommandSender, node: &str) -> bool {
    match sender {
        CommandSender::Console => true,
        CommandSender::Player(uuid) => engine.host().server.has_permission(uuid, node),
    }
}

/// Write changed definition files
fn persist(engine: &QuestEngine, files: &DataFiles, reply: Reply) -> Vec<String> {
    let mut lines = reply.lines;
    if reply.quests_changed {
        if let Err(e) = engine.quests().save(&files.quests) {
            error!("Failed to save quests to {:?}: {}", files.quests, e);
            lines.push(format!("Error: quests could not be saved: {}", e));
        }
    }
    if reply.actions_changed {
        if let Err(e) = engine.actions().save(&files.actions) {
            error!("Failed to save actions to {:?}: {}", files.actions, e);
            lines.push(format!("Error: actions could not be saved: {}", e));
        }
    }
    lines
}

/// Resolve a player argument or produce the standard error line
pub(crate) fn resolve_player(engine: &QuestEngine, name: &str) -> Result<Uuid, String> {
    engine
        .resolve_player(name)
        .ok_or_else(|| format!("Player {} is not online or was not found!", name))
}

pub(crate) fn usage(text: &str) -> Reply {
    Reply::line(format!("Usage: {}", text))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::engine::tests::engine_with;
    use crate::host::MemoryHost;
    use std::sync::Arc;
    use tempfile::TempDir;

    pub(crate) struct Harness {
        pub engine: QuestEngine,
        pub host: Arc<MemoryHost>,
        pub files: DataFiles,
        pub _dir: TempDir,
    }

    impl Harness {
        pub fn new() -> Self {
            let (engine, host) = engine_with(vec![]);
            let dir = TempDir::new().unwrap();
            let files = DataFiles {
                quests: dir.path().join("quests.toml"),
                actions: dir.path().join("actions.toml"),
            };
            Self { engine, host, files, _dir: dir }
        }

        pub fn console(&mut self, line: &str) -> Vec<String> {
            execute(&mut self.engine, &self.files, CommandSender::Console, line)
        }

        pub fn player(&mut self, uuid: Uuid, line: &str) -> Vec<String> {
            execute(&mut self.engine, &self.files, CommandSender::Player(uuid), line)
        }

        pub fn joined(&mut self, line: &str) -> String {
            self.console(line).join("\n")
        }
    }

    #[test]
    fn test_tokenize_quotes() {
        assert_eq!(tokenize("qadmin  edit Q1 displayName \"The  Quest\""), vec![
            "qadmin",
            "edit",
            "Q1",
            "displayName",
            "The  Quest"
        ]);
        assert_eq!(tokenize("a \"\" b"), vec!["a", "", "b"]);
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_aliases_and_permissions() {
        let mut h = Harness::new();
        assert!(h.joined("/nqa create Q1").contains("created"));
        assert!(h.joined("notquestsadmin listAllQuests").contains("Q1"));
        assert!(h.joined("foo").contains("Unknown command"));
        assert!(h.joined("nq activeQuests").contains("only be run by a player"));

        let uuid = h.host.add_player("Steve");
        assert!(h.player(uuid, "qadmin create Q2").join("").contains("No permission"));
        h.host.with_player(uuid, |p| p.permissions.insert(ADMIN_PERMISSION.to_string()));
        assert!(h.player(uuid, "qadmin create Q2").join("").contains("created"));
    }

    #[test]
    fn test_definition_edits_are_saved() {
        let mut h = Harness::new();
        h.console("qadmin create Miner");
        h.console("qadmin edit Miner maxAccepts 2");
        let content = std::fs::read_to_string(&h.files.quests).unwrap();
        assert!(content.contains("maxAccepts = 2"));
    }
}
