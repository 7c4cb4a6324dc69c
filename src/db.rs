use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::engine::QuestEngine;
use crate::error::{QuestError, Result};
use crate::quest::{ActiveObjective, ActiveQuest, CompletedQuest, QuestPlayer};

/// Player quest state storage
pub struct Database {
    pool: SqlitePool,
    /// Held from snapshot to commit so saves of one player land in order
    save_lock: Mutex<()>,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        // Run migrations
        Self::migrate(&pool).await?;

        Ok(Self {
            pool,
            save_lock: Mutex::new(()),
        })
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS quest_players (
                uuid TEXT PRIMARY KEY,
                quest_points INTEGER NOT NULL DEFAULT 0,
                tags_json TEXT NOT NULL DEFAULT '[]',
                last_accepted_json TEXT NOT NULL DEFAULT '{}',
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS active_quests (
                id TEXT PRIMARY KEY,
                player_uuid TEXT NOT NULL,
                quest_name TEXT NOT NULL,
                accepted_at TEXT NOT NULL,
                objectives_json TEXT NOT NULL DEFAULT '[]',
                trigger_progress_json TEXT NOT NULL DEFAULT '{}',
                FOREIGN KEY(player_uuid) REFERENCES quest_players(uuid)
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS completed_quests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                player_uuid TEXT NOT NULL,
                quest_name TEXT NOT NULL,
                accepted_at TEXT,
                completed_at TEXT NOT NULL,
                FOREIGN KEY(player_uuid) REFERENCES quest_players(uuid)
            )
            "#,
        )
        .execute(pool)
        .await?;

        let _ = sqlx::query("CREATE INDEX IF NOT EXISTS idx_active_player ON active_quests(player_uuid)")
            .execute(pool)
            .await;
        let _ = sqlx::query("CREATE INDEX IF NOT EXISTS idx_completed_player ON completed_quests(player_uuid)")
            .execute(pool)
            .await;

        tracing::info!("Database migrations complete");
        Ok(())
    }

    /// Write every player the engine marked dirty. Failed writes are marked
    /// dirty again for the next pass.
    pub async fn save_dirty_players(&self, engine: &Mutex<QuestEngine>) -> usize {
        let _guard = self.save_lock.lock().await;
        let dirty = engine.lock().await.take_dirty_players();

        let mut saved = 0;
        for player in &dirty {
            match self.save_player(player).await {
                Ok(()) => saved += 1,
                Err(e) => {
                    warn!("Failed to save quest data for {}: {}", player.uuid, e);
                    engine.lock().await.mark_dirty(player.uuid);
                }
            }
        }
        saved
    }

    /// Replace everything stored for one player
    pub async fn save_player(&self, player: &QuestPlayer) -> Result<()> {
        let uuid = player.uuid.to_string();
        let tags_json = serde_json::to_string(&player.tags)?;
        let last_accepted: BTreeMap<&String, String> = player
            .last_accepted
            .iter()
            .map(|(name, at)| (name, at.to_rfc3339()))
            .collect();
        let last_accepted_json = serde_json::to_string(&last_accepted)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO quest_players (uuid, quest_points, tags_json, last_accepted_json, updated_at)
            VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(uuid) DO UPDATE SET
                quest_points = excluded.quest_points,
                tags_json = excluded.tags_json,
                last_accepted_json = excluded.last_accepted_json,
                updated_at = CURRENT_TIMESTAMP"#,
        )
        .bind(&uuid)
        .bind(player.quest_points)
        .bind(&tags_json)
        .bind(&last_accepted_json)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM active_quests WHERE player_uuid = ?")
            .bind(&uuid)
            .execute(&mut *tx)
            .await?;
        for active in &player.active_quests {
            sqlx::query(
                r#"INSERT INTO active_quests
                (id, player_uuid, quest_name, accepted_at, objectives_json, trigger_progress_json)
                VALUES (?, ?, ?, ?, ?, ?)"#,
            )
            .bind(active.id.to_string())
            .bind(&uuid)
            .bind(&active.quest_name)
            .bind(active.accepted_at.to_rfc3339())
            .bind(serde_json::to_string(&active.objectives)?)
            .bind(serde_json::to_string(&active.trigger_progress)?)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM completed_quests WHERE player_uuid = ?")
            .bind(&uuid)
            .execute(&mut *tx)
            .await?;
        for completed in &player.completed_quests {
            sqlx::query(
                "INSERT INTO completed_quests (player_uuid, quest_name, accepted_at, completed_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&uuid)
            .bind(&completed.quest_name)
            .bind(completed.accepted_at.map(|at| at.to_rfc3339()))
            .bind(completed.completed_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Load every stored player
    pub async fn load_all_players(&self) -> Result<Vec<QuestPlayer>> {
        let rows = sqlx::query("SELECT uuid, quest_points, tags_json, last_accepted_json FROM quest_players")
            .fetch_all(&self.pool)
            .await?;

        let mut players: HashMap<Uuid, QuestPlayer> = HashMap::new();
        for row in rows {
            let uuid = parse_uuid(row.get("uuid"))?;
            let tags: BTreeSet<String> = serde_json::from_str(row.get("tags_json"))?;
            let last_accepted_raw: BTreeMap<String, String> = serde_json::from_str(row.get("last_accepted_json"))?;
            let mut last_accepted = HashMap::new();
            for (name, at) in last_accepted_raw {
                last_accepted.insert(name, parse_time(&at)?);
            }

            let mut player = QuestPlayer::new(uuid);
            player.quest_points = row.get("quest_points");
            player.tags = tags;
            player.last_accepted = last_accepted;
            players.insert(uuid, player);
        }

        let rows = sqlx::query(
            "SELECT id, player_uuid, quest_name, accepted_at, objectives_json, trigger_progress_json FROM active_quests ORDER BY accepted_at",
        )
        .fetch_all(&self.pool)
        .await?;
        for row in rows {
            let owner = parse_uuid(row.get("player_uuid"))?;
            let objectives: Vec<ActiveObjective> = serde_json::from_str(row.get("objectives_json"))?;
            let trigger_progress: BTreeMap<usize, i64> = serde_json::from_str(row.get("trigger_progress_json"))?;
            let active = ActiveQuest {
                id: parse_uuid(row.get("id"))?,
                quest_name: row.get("quest_name"),
                accepted_at: parse_time(row.get("accepted_at"))?,
                objectives,
                trigger_progress,
            };
            players
                .entry(owner)
                .or_insert_with(|| QuestPlayer::new(owner))
                .active_quests
                .push(active);
        }

        let rows = sqlx::query(
            "SELECT player_uuid, quest_name, accepted_at, completed_at FROM completed_quests ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        for row in rows {
            let owner = parse_uuid(row.get("player_uuid"))?;
            let accepted_at: Option<String> = row.get("accepted_at");
            let completed = CompletedQuest {
                quest_name: row.get("quest_name"),
                accepted_at: accepted_at.as_deref().map(parse_time).transpose()?,
                completed_at: parse_time(row.get("completed_at"))?,
            };
            players
                .entry(owner)
                .or_insert_with(|| QuestPlayer::new(owner))
                .completed_quests
                .push(completed);
        }

        tracing::info!("Loaded quest data of {} players", players.len());
        Ok(players.into_values().collect())
    }
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| QuestError::Other(format!("Stored UUID '{}' is invalid: {}", raw, e)))
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| QuestError::Other(format!("Stored timestamp '{}' is invalid: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quest::ObjectiveStatus;
    use tempfile::TempDir;

    async fn open(dir: &TempDir) -> Database {
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("test.db").display());
        Database::new(&url).await.unwrap()
    }

    #[tokio::test]
    async fn test_player_round_trip() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir).await;

        let mut player = QuestPlayer::new(Uuid::new_v4());
        player.quest_points = 42;
        player.tags.insert("door_open".to_string());
        player.record_acceptance("Miner", Utc::now());

        let mut objective = ActiveObjective::new(1, 5);
        objective.unlock();
        objective.add_progress(3);
        let mut active = ActiveQuest::new("Miner", vec![objective, ActiveObjective::new(2, 1)]);
        active.trigger_progress.insert(0, 2);
        player.active_quests.push(active);

        let done = ActiveQuest::new("Intro", vec![]);
        let done_id = done.id;
        player.active_quests.push(done);
        player.complete_active_quest(done_id);

        db.save_player(&player).await.unwrap();
        // Saving twice replaces instead of duplicating
        db.save_player(&player).await.unwrap();

        let loaded = db.load_all_players().await.unwrap();
        assert_eq!(loaded.len(), 1);
        let loaded = &loaded[0];
        assert_eq!(loaded.uuid, player.uuid);
        assert_eq!(loaded.quest_points, 42);
        assert!(loaded.tags.contains("door_open"));
        assert!(loaded.last_accepted_at("miner").is_some());
        assert_eq!(loaded.completions_of("Intro"), 1);

        let miner = &loaded.active_quests[0];
        assert_eq!(miner.id, player.active_quests[0].id);
        assert_eq!(miner.objectives[0].progress, 3);
        assert_eq!(miner.objectives[0].status, ObjectiveStatus::Unlocked);
        assert_eq!(miner.objectives[1].status, ObjectiveStatus::Locked);
        assert_eq!(miner.trigger_progress.get(&0), Some(&2));
    }

    #[tokio::test]
    async fn test_concurrent_saves_keep_newest_state() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir).await;
        let (engine, host) = crate::engine::tests::engine_with(vec![]);
        let engine = Mutex::new(engine);
        let uuid = host.add_player("Steve");
        engine.lock().await.set_quest_points(uuid, 1);

        let newer = async {
            engine.lock().await.set_quest_points(uuid, 2);
            db.save_dirty_players(&engine).await
        };
        let (first, second) = tokio::join!(db.save_dirty_players(&engine), newer);
        assert!(first + second >= 1);

        let loaded = db.load_all_players().await.unwrap();
        assert_eq!(loaded[0].quest_points, 2);
        // Nothing left over
        assert_eq!(db.save_dirty_players(&engine).await, 0);
    }

    #[tokio::test]
    async fn test_finished_quest_is_removed_on_save() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir).await;

        let mut player = QuestPlayer::new(Uuid::new_v4());
        let active = ActiveQuest::new("Q", vec![]);
        let id = active.id;
        player.active_quests.push(active);
        db.save_player(&player).await.unwrap();

        player.complete_active_quest(id);
        db.save_player(&player).await.unwrap();

        let loaded = db.load_all_players().await.unwrap();
        assert!(loaded[0].active_quests.is_empty());
        assert_eq!(loaded[0].completed_quests.len(), 1);
    }
}
