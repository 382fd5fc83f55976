//! Durable store for the roster, loot history, attendance and raid archives.

use crate::attendance::AttendanceTable;
use crate::error::{StorageError, StorageResult};
use crate::session::CompletedRaid;
use crate::types::{LootRecord, Player};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::{fs as tokio_fs, io::AsyncWriteExt, sync::Mutex};
use tracing::{debug, info, instrument, warn};

const PLAYERS_FILE: &str = "players.json";
const HISTORY_FILE: &str = "loot_history.json";
const ATTENDANCE_FILE: &str = "attendance.json";
const RAID_LOG_DIR: &str = "raid_logs";

/// Load/save surface of the durable store.
#[async_trait]
pub trait LootStore: Send + Sync + std::fmt::Debug {
    /// Load the roster
    async fn load_players(&self) -> StorageResult<Vec<Player>>;

    /// Load every past award
    async fn load_history(&self) -> StorageResult<Vec<LootRecord>>;

    /// Append awards to the durable history. Either all records are
    /// persisted or none are.
    async fn append_history(&self, records: &[LootRecord]) -> StorageResult<()>;

    /// Load attendance counts
    async fn load_attendance(&self) -> StorageResult<AttendanceTable>;

    /// Keep a copy of a finished raid
    async fn archive_session(&self, raid: &CompletedRaid) -> StorageResult<()>;

    /// Every archived raid, oldest first
    async fn load_sessions(&self) -> StorageResult<Vec<CompletedRaid>>;
}

/// JSON files under a single data directory.
#[derive(Debug)]
pub struct JsonLootStore {
    data_dir: PathBuf,
    // Serialises read-modify-write of the history file.
    history_lock: Mutex<()>,
}

impl JsonLootStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            history_lock: Mutex::new(()),
        }
    }

    fn path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }

    /// Reads a JSON file, treating a missing file as `T::default()`.
    async fn read_or_default<T: DeserializeOwned + Default>(&self, path: &Path) -> StorageResult<T> {
        let contents = match tokio_fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} not found, starting empty", path.display());
                return Ok(T::default());
            }
            Err(e) => return Err(StorageError::FileRead(path.to_path_buf(), e)),
        };

        serde_json::from_str(&contents).map_err(|e| StorageError::Deserialization(path.to_path_buf(), e))
    }

    /// Writes JSON through a temporary file and an atomic rename.
    async fn write_atomic<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            tokio_fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::DirectoryCreate(parent.to_path_buf(), e))?;
        }

        let json = serde_json::to_string_pretty(value)
            .map_err(|e| StorageError::Serialization(path.display().to_string(), e))?;
        let temp_path = path.with_extension("tmp");

        let mut file = tokio_fs::File::create(&temp_path)
            .await
            .map_err(|e| StorageError::FileCreate(temp_path.clone(), e))?;
        file.write_all(json.as_bytes())
            .await
            .map_err(|e| StorageError::FileWrite(temp_path.clone(), e))?;
        file.sync_all()
            .await
            .map_err(|e| StorageError::FileSync(temp_path.clone(), e))?;

        tokio_fs::rename(&temp_path, path)
            .await
            .map_err(|e| StorageError::FileRename(temp_path, path.to_path_buf(), e))?;
        Ok(())
    }
}

#[async_trait]
impl LootStore for JsonLootStore {
    #[instrument(skip(self))]
    async fn load_players(&self) -> StorageResult<Vec<Player>> {
        let players: Vec<Player> = self.read_or_default(&self.path(PLAYERS_FILE)).await?;
        info!("Loaded {} players", players.len());
        Ok(players)
    }

    #[instrument(skip(self))]
    async fn load_history(&self) -> StorageResult<Vec<LootRecord>> {
        let records: Vec<LootRecord> = self.read_or_default(&self.path(HISTORY_FILE)).await?;
        info!("Loaded {} loot records", records.len());
        Ok(records)
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn append_history(&self, records: &[LootRecord]) -> StorageResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let _guard = self.history_lock.lock().await;
        let path = self.path(HISTORY_FILE);
        let mut history: Vec<LootRecord> = self.read_or_default(&path).await?;
        history.extend_from_slice(records);
        self.write_atomic(&path, &history).await?;

        info!("Appended {} records to loot history", records.len());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn load_attendance(&self) -> StorageResult<AttendanceTable> {
        self.read_or_default(&self.path(ATTENDANCE_FILE)).await
    }

    #[instrument(skip(self, raid), fields(boss = %raid.boss))]
    async fn archive_session(&self, raid: &CompletedRaid) -> StorageResult<()> {
        let path = self
            .path(RAID_LOG_DIR)
            .join(format!("raid_session_{}.json", raid.started_at));
        self.write_atomic(&path, raid).await?;
        info!("Archived raid session to {}", path.display());
        Ok(())
    }

    /// Unreadable raid logs are skipped with a warning so one bad file does
    /// not hide the rest.
    #[instrument(skip(self))]
    async fn load_sessions(&self) -> StorageResult<Vec<CompletedRaid>> {
        let dir = self.path(RAID_LOG_DIR);
        let mut entries = match tokio_fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::FileRead(dir, e)),
        };

        let mut sessions = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::FileRead(dir.clone(), e))?
        {
            let path = entry.path();
            let is_raid_log = path.extension().is_some_and(|ext| ext == "json")
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with("raid_session_"));
            if !is_raid_log {
                continue;
            }

            match self.read_or_default::<Option<CompletedRaid>>(&path).await {
                Ok(Some(raid)) => sessions.push(raid),
                Ok(None) => {}
                Err(e) => warn!("Skipping raid log: {}", e),
            }
        }

        sessions.sort_by_key(|raid| raid.started_at);
        debug!("Loaded {} archived raid sessions", sessions.len());
        Ok(sessions)
    }
}

/// In-process store, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryLootStore {
    players: Vec<Player>,
    attendance: AttendanceTable,
    history: Mutex<Vec<LootRecord>>,
    archived: Mutex<Vec<CompletedRaid>>,
    fail_writes: AtomicBool,
}

impl MemoryLootStore {
    pub fn new(players: Vec<Player>, history: Vec<LootRecord>, attendance: AttendanceTable) -> Self {
        Self {
            players,
            attendance,
            history: Mutex::new(history),
            archived: Mutex::new(Vec::new()),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent write fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn history(&self) -> Vec<LootRecord> {
        self.history.lock().await.clone()
    }

    pub async fn archived(&self) -> Vec<CompletedRaid> {
        self.archived.lock().await.clone()
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LootStore for MemoryLootStore {
    async fn load_players(&self) -> StorageResult<Vec<Player>> {
        Ok(self.players.clone())
    }

    async fn load_history(&self) -> StorageResult<Vec<LootRecord>> {
        Ok(self.history.lock().await.clone())
    }

    async fn append_history(&self, records: &[LootRecord]) -> StorageResult<()> {
        self.check_writable()?;
        self.history.lock().await.extend_from_slice(records);
        Ok(())
    }

    async fn load_attendance(&self) -> StorageResult<AttendanceTable> {
        Ok(self.attendance.clone())
    }

    async fn archive_session(&self, raid: &CompletedRaid) -> StorageResult<()> {
        self.check_writable()?;
        self.archived.lock().await.push(raid.clone());
        Ok(())
    }

    async fn load_sessions(&self) -> StorageResult<Vec<CompletedRaid>> {
        let mut sessions = self.archived.lock().await.clone();
        sessions.sort_by_key(|raid| raid.started_at);
        Ok(sessions)
    }
}
