//! Локальное key/value хранилище, общее для UI и фоновой задачи.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tokio::task::JoinError;

/// Ключ идентификатора пользователя.
pub const USER_ID_KEY: &str = "user_id";
/// Ключ токена сессии.
pub const SESSION_TOKEN_KEY: &str = "session_token";
/// Ключ списка черновиков (JSON).
pub const DRAFTS_KEY: &str = "drafts";
/// Ключ списка запланированных публикаций (JSON).
pub const SCHEDULE_KEY: &str = "in_schedule";

const LOCK_RETRY_DELAY: Duration = Duration::from_millis(10);
const LOCK_MAX_ATTEMPTS: u32 = 500;
const STALE_LOCK_AGE: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
/// Ошибки локального хранилища.
pub enum StoreError {
    /// Ошибка файловой системы.
    #[error("io error on key '{key}': {source}")]
    Io {
        /// Ключ, на котором произошла ошибка.
        key: String,
        /// Исходная ошибка.
        #[source]
        source: io::Error,
    },

    /// Не удалось захватить блокировку ключа.
    #[error("key '{0}' is locked by another writer")]
    Locked(String),

    /// Недопустимое имя ключа.
    #[error("invalid key '{0}'")]
    InvalidKey(String),

    /// Блокирующая задача хранилища завершилась паникой или была отменена.
    #[error("store task failed: {0}")]
    Task(#[from] JoinError),
}

/// Результат операций хранилища.
pub type StoreResult<T> = Result<T, StoreError>;

/// Строковое key/value хранилище.
///
/// Каждая операция атомарна в пределах одного ключа; `update` выполняет
/// read-modify-write без потери параллельных изменений того же ключа.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Читает значение ключа.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Записывает значение ключа.
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Удаляет ключ. Отсутствующий ключ не считается ошибкой.
    fn remove(&self, key: &str) -> StoreResult<()>;

    /// Атомарно заменяет значение ключа результатом `f`.
    /// `None` от `f` удаляет ключ.
    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<String>) -> Option<String>,
    ) -> StoreResult<()>;
}

/// Выполняет операцию хранилища в пуле блокирующих потоков tokio.
///
/// `FileStore` может ждать чужую файловую блокировку до нескольких секунд,
/// поэтому из async-кода хранилище вызывается только через эту функцию.
pub async fn offload<T, F>(f: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> StoreResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

#[derive(Debug, Default)]
/// Хранилище в памяти процесса.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Создаёт пустое хранилище.
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // отравленный мьютекс не делает данные невалидными: это просто строки
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.entries().remove(key);
        Ok(())
    }

    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<String>) -> Option<String>,
    ) -> StoreResult<()> {
        let mut entries = self.entries();
        let current = entries.get(key).cloned();
        match f(current) {
            Some(value) => entries.insert(key.to_string(), value),
            None => entries.remove(key),
        };
        Ok(())
    }
}

#[derive(Debug)]
/// Хранилище на файловой системе: один файл на ключ.
///
/// Запись идёт через временный файл и атомарный rename. `update` держит
/// файл-блокировку `<key>.lock`, поэтому foreground-процесс и фоновая задача
/// не теряют изменения друг друга.
pub struct FileStore {
    dir: PathBuf,
    local: Mutex<()>,
}

impl FileStore {
    /// Открывает (и при необходимости создаёт) каталог хранилища.
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            key: dir.display().to_string(),
            source,
        })?;

        Ok(Self {
            dir,
            local: Mutex::new(()),
        })
    }

    /// Каталог хранилища.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(key))
    }

    fn read(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn write(&self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        tmp.write_all(value.as_bytes()).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&path).map_err(|err| io_err(err.error))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn lock(&self, key: &str) -> StoreResult<KeyLock> {
        let path = self.path_for(key)?.with_extension("lock");

        let token = unique_token();
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };

        for _ in 0..LOCK_MAX_ATTEMPTS {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    if let Err(err) = file.write_all(token.as_bytes()) {
                        let _ = fs::remove_file(&path);
                        return Err(io_err(err));
                    }
                    return Ok(KeyLock { path, token });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    if is_stale(&path) {
                        tracing::warn!(key, "breaking stale store lock");
                        break_stale_lock(&path).map_err(io_err)?;
                        continue;
                    }
                    thread::sleep(LOCK_RETRY_DELAY);
                }
                Err(source) => return Err(io_err(source)),
            }
        }

        Err(StoreError::Locked(key.to_string()))
    }
}

fn is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > STALE_LOCK_AGE)
}

/// Снимает просроченную блокировку.
///
/// Файл сначала атомарно переименовывается в уникальное имя и только потом
/// проверяется ещё раз. Если под этим именем оказалась свежая блокировка
/// (другой писатель успел снять старую и взять свою), она возвращается
/// на место через `hard_link`, который не перезаписывает существующий файл.
fn break_stale_lock(path: &Path) -> io::Result<()> {
    let aside = path.with_extension(format!("lock.{}", unique_token()));
    match fs::rename(path, &aside) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    }

    if !is_stale(&aside) {
        match fs::hard_link(&aside, path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                tracing::error!(path = %path.display(), "fresh store lock was replaced while breaking a stale one");
            }
            Err(err) => {
                let _ = fs::remove_file(&aside);
                return Err(err);
            }
        }
    }
    fs::remove_file(&aside)
}

fn unique_token() -> String {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!(
        "{}-{nanos}-{}",
        std::process::id(),
        SEQ.fetch_add(1, Ordering::Relaxed)
    )
}

struct KeyLock {
    path: PathBuf,
    token: String,
}

impl Drop for KeyLock {
    fn drop(&mut self) {
        // чужую блокировку не трогаем
        let ours = fs::read_to_string(&self.path).is_ok_and(|raw| raw == self.token);
        if ours {
            let _ = fs::remove_file(&self.path);
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.read(key)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let _guard = self.local.lock().unwrap_or_else(|p| p.into_inner());
        let _lock = self.lock(key)?;
        self.write(key, value)
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let _guard = self.local.lock().unwrap_or_else(|p| p.into_inner());
        let _lock = self.lock(key)?;
        self.delete(key)
    }

    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<String>) -> Option<String>,
    ) -> StoreResult<()> {
        let _guard = self.local.lock().unwrap_or_else(|p| p.into_inner());
        let _lock = self.lock(key)?;

        let current = self.read(key)?;
        match f(current) {
            Some(value) => self.write(key, &value),
            None => self.delete(key),
        }
    }
}
