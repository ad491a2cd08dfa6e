//! Локальные черновики и расписание публикаций.

use std::io;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::models::{Draft, PublishLease, ScheduleEntry};
use crate::storage::{self, DRAFTS_KEY, KeyValueStore, SCHEDULE_KEY, StoreError, StoreResult};

/// Черновики (`drafts`) и запланированные публикации (`in_schedule`).
///
/// Работает без сети. Каждое изменение списка - атомарный read-modify-write
/// одного ключа, поэтому правка из UI не теряется, даже если фоновая задача
/// в этот момент публикует запись из расписания.
pub struct DraftStore<S: KeyValueStore> {
    store: Arc<S>,
}

impl<S: KeyValueStore> Clone for DraftStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: KeyValueStore> DraftStore<S> {
    /// Создаёт хранилище черновиков поверх key/value хранилища.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Выполняет `f` над копией хранилища вне потоков async-рантайма.
    pub async fn offload<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Self) -> StoreResult<T> + Send + 'static,
    {
        let this = self.clone();
        storage::offload(move || f(&this)).await
    }

    /// Все сохранённые черновики в порядке создания.
    pub fn drafts(&self) -> StoreResult<Vec<Draft>> {
        self.read_list(DRAFTS_KEY)
    }

    /// Сохраняет новый черновик.
    pub fn save_draft(&self, text: &str) -> StoreResult<Draft> {
        let scheduled = self.scheduled_ids()?;
        let now = now_ms();
        let text = text.to_string();

        self.modify_list(DRAFTS_KEY, move |drafts: &mut Vec<Draft>| {
            let taken = drafts.iter().map(|d| d.id).chain(scheduled);
            let draft = Draft {
                id: next_id(now, taken),
                text,
            };
            drafts.push(draft.clone());
            tracing::debug!(draft_id = draft.id, "draft saved");
            draft
        })
    }

    /// Удаляет черновик. Возвращает `false`, если такого черновика нет.
    pub fn delete_draft(&self, id: i64) -> StoreResult<bool> {
        Ok(self.take_draft(id)?.is_some())
    }

    /// Забирает черновик в редактор: запись удаляется из хранилища в момент
    /// загрузки текста, повторный вызов вернёт `None`.
    pub fn take_draft(&self, id: i64) -> StoreResult<Option<Draft>> {
        self.modify_list(DRAFTS_KEY, |drafts: &mut Vec<Draft>| {
            let index = drafts.iter().position(|d| d.id == id)?;
            Some(drafts.remove(index))
        })
    }

    /// Переносит черновик в расписание с целевым временем `timestamp`
    /// (unix ms). Черновик при этом из списка черновиков удаляется.
    pub fn schedule_draft(&self, id: i64, timestamp: i64) -> StoreResult<Option<ScheduleEntry>> {
        let Some(draft) = self.take_draft(id)? else {
            return Ok(None);
        };

        let entry = ScheduleEntry::new(draft, timestamp);
        if let Err(err) = self.push_entry(entry.clone()) {
            // черновик уже изъят, возвращаем его на место
            let draft = entry.draft;
            self.modify_list(DRAFTS_KEY, move |drafts: &mut Vec<Draft>| drafts.push(draft))?;
            return Err(err);
        }
        Ok(Some(entry))
    }

    /// Планирует публикацию текста без промежуточного черновика.
    pub fn schedule_text(&self, text: &str, timestamp: i64) -> StoreResult<ScheduleEntry> {
        let drafts: Vec<i64> = self.drafts()?.into_iter().map(|d| d.id).collect();
        let now = now_ms();
        let text = text.to_string();

        self.modify_list(SCHEDULE_KEY, move |entries: &mut Vec<ScheduleEntry>| {
            let taken = entries.iter().map(|e| e.draft.id).chain(drafts);
            let entry = ScheduleEntry::new(
                Draft {
                    id: next_id(now, taken),
                    text,
                },
                timestamp,
            );
            entries.push(entry.clone());
            entry
        })
    }

    /// Все запланированные публикации.
    pub fn schedule(&self) -> StoreResult<Vec<ScheduleEntry>> {
        self.read_list(SCHEDULE_KEY)
    }

    /// Отменяет публикацию. Возвращает снятую запись.
    ///
    /// Запись, которую фоновая задача публикует прямо сейчас, тоже снимается:
    /// при отказе сервера она уже не вернётся в расписание. Успевший уйти
    /// запрос отменить нельзя, об этом говорит `is_publishing()` у результата.
    pub fn cancel_scheduled(&self, id: i64) -> StoreResult<Option<ScheduleEntry>> {
        self.modify_list(SCHEDULE_KEY, |entries: &mut Vec<ScheduleEntry>| {
            let index = entries.iter().position(|e| e.draft.id == id)?;
            Some(entries.remove(index))
        })
    }

    /// Записи, время публикации которых наступило к `now_ms` и которые
    /// никто не публикует.
    pub fn due_entries(&self, now_ms: i64) -> StoreResult<Vec<ScheduleEntry>> {
        Ok(self
            .schedule()?
            .into_iter()
            .filter(|entry| entry.is_due(now_ms) && !entry.is_publishing())
            .collect())
    }

    /// Захватывает свободную запись для публикации. Запись остаётся
    /// в расписании с отметкой `owner` до `release` или `complete`.
    pub(crate) fn claim(
        &self,
        id: i64,
        owner: &str,
        expires_at: i64,
    ) -> StoreResult<Option<ScheduleEntry>> {
        let lease = PublishLease {
            owner: owner.to_string(),
            expires_at,
        };
        self.modify_list(SCHEDULE_KEY, move |entries: &mut Vec<ScheduleEntry>| {
            let entry = entries
                .iter_mut()
                .find(|e| e.draft.id == id && e.lease.is_none())?;
            entry.lease = Some(lease);
            Some(entry.clone())
        })
    }

    /// Снимает отметку: запись снова ждёт публикации. `false`, если запись
    /// за это время отменили.
    pub(crate) fn release(&self, claimed: &ScheduleEntry) -> StoreResult<bool> {
        let id = claimed.draft.id;
        let lease = claimed.lease.clone();
        self.modify_list(SCHEDULE_KEY, move |entries: &mut Vec<ScheduleEntry>| {
            match entries.iter_mut().find(|e| e.draft.id == id && e.lease == lease) {
                Some(entry) => {
                    entry.lease = None;
                    true
                }
                None => false,
            }
        })
    }

    /// Удаляет захваченную запись после публикации или при неизвестном
    /// исходе. `false`, если запись за это время отменили.
    pub(crate) fn complete(&self, claimed: &ScheduleEntry) -> StoreResult<bool> {
        let id = claimed.draft.id;
        let lease = claimed.lease.clone();
        self.modify_list(SCHEDULE_KEY, move |entries: &mut Vec<ScheduleEntry>| {
            let index = entries
                .iter()
                .position(|e| e.draft.id == id && e.lease == lease);
            index.map(|index| entries.remove(index)).is_some()
        })
    }

    /// Удаляет записи с просроченной отметкой: публикатор не вернулся к ним,
    /// и дошёл ли `createPost` до сервера, неизвестно.
    pub(crate) fn drop_expired_leases(&self, now_ms: i64) -> StoreResult<Vec<ScheduleEntry>> {
        self.modify_list(SCHEDULE_KEY, move |entries: &mut Vec<ScheduleEntry>| {
            let (expired, kept): (Vec<_>, Vec<_>) = entries.drain(..).partition(|e| {
                e.lease
                    .as_ref()
                    .is_some_and(|lease| lease.is_expired(now_ms))
            });
            *entries = kept;
            expired
        })
    }

    fn push_entry(&self, entry: ScheduleEntry) -> StoreResult<()> {
        self.modify_list(SCHEDULE_KEY, move |entries: &mut Vec<ScheduleEntry>| {
            if !entries.iter().any(|e| e.draft.id == entry.draft.id) {
                entries.push(entry);
            }
        })
    }

    fn scheduled_ids(&self) -> StoreResult<Vec<i64>> {
        Ok(self.schedule()?.into_iter().map(|e| e.draft.id).collect())
    }

    fn read_list<T: DeserializeOwned>(&self, key: &'static str) -> StoreResult<Vec<T>> {
        let raw = self.store.get(key)?;
        Ok(parse_list(key, raw.as_deref()))
    }

    fn modify_list<T, R>(
        &self,
        key: &'static str,
        f: impl FnOnce(&mut Vec<T>) -> R,
    ) -> StoreResult<R>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut f = Some(f);
        let mut outcome = None;

        self.store.update(key, &mut |current| {
            let mut list = parse_list(key, current.as_deref());
            if let Some(f) = f.take() {
                outcome = Some(f(&mut list));
            }
            match serde_json::to_string(&list) {
                Ok(raw) => Some(raw),
                Err(err) => {
                    tracing::error!(key, error = %err, "failed to encode local list");
                    current
                }
            }
        })?;

        outcome.ok_or_else(|| StoreError::Io {
            key: key.to_string(),
            source: io::Error::other("store did not apply the update"),
        })
    }
}

/// Повреждённый JSON не ошибка: список считается пустым.
fn parse_list<T: DeserializeOwned>(key: &str, raw: Option<&str>) -> Vec<T> {
    let Some(raw) = raw else {
        return Vec::new();
    };

    match serde_json::from_str(raw) {
        Ok(list) => list,
        Err(err) => {
            tracing::warn!(key, error = %err, "corrupted list in local store, treating as empty");
            Vec::new()
        }
    }
}

fn next_id(now: i64, taken: impl IntoIterator<Item = i64>) -> i64 {
    taken
        .into_iter()
        .max()
        .map_or(now, |max| now.max(max + 1))
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn store() -> (DraftStore<MemoryStore>, Arc<MemoryStore>) {
        let kv = Arc::new(MemoryStore::new());
        (DraftStore::new(kv.clone()), kv)
    }

    #[test]
    fn save_then_delete_leaves_store_empty() {
        let (drafts, _) = store();

        let draft = drafts.save_draft("hello").expect("save");
        assert_eq!(drafts.drafts().expect("list"), vec![draft.clone()]);

        assert!(drafts.delete_draft(draft.id).expect("delete"));
        assert!(drafts.drafts().expect("list").is_empty());
        assert!(!drafts.delete_draft(draft.id).expect("second delete"));
    }

    #[test]
    fn take_draft_consumes_exactly_once() {
        let (drafts, kv) = store();
        let draft = drafts.save_draft("hello").expect("save");

        let taken = drafts.take_draft(draft.id).expect("take");
        assert_eq!(taken.map(|d| d.text), Some("hello".to_string()));
        assert!(drafts.take_draft(draft.id).expect("take again").is_none());

        // "перезапуск": новое хранилище поверх тех же данных
        let reopened = DraftStore::new(kv);
        assert!(reopened.drafts().expect("list").is_empty());
    }

    #[test]
    fn ids_are_unique_within_same_millisecond() {
        let (drafts, _) = store();

        let ids: Vec<i64> = (0..5)
            .map(|i| drafts.save_draft(&format!("draft {i}")).expect("save").id)
            .collect();

        let mut unique = ids.clone();
        unique.dedup();
        assert_eq!(unique.len(), ids.len());
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn scheduled_id_is_not_reused_by_new_draft() {
        let (drafts, kv) = store();
        let far_future = now_ms() + 1_000_000;
        kv.set(
            SCHEDULE_KEY,
            &format!(r#"[{{"draft":{{"id":{far_future},"text":"later"}},"timestamp":0}}]"#),
        )
        .expect("seed");

        let draft = drafts.save_draft("new").expect("save");
        assert_eq!(draft.id, far_future + 1);
    }

    #[test]
    fn schedule_draft_moves_draft_into_schedule() {
        let (drafts, _) = store();
        let draft = drafts.save_draft("post me").expect("save");

        let entry = drafts
            .schedule_draft(draft.id, 5_000)
            .expect("schedule")
            .expect("draft exists");
        assert_eq!(entry.draft, draft);
        assert!(drafts.drafts().expect("drafts").is_empty());
        assert_eq!(drafts.schedule().expect("schedule"), vec![entry]);

        assert!(drafts.schedule_draft(draft.id, 5_000).expect("again").is_none());
    }

    #[test]
    fn due_entries_include_exact_target_time() {
        let (drafts, _) = store();
        drafts.schedule_text("early", 1_000).expect("schedule");
        drafts.schedule_text("late", 9_000).expect("schedule");

        let due = drafts.due_entries(1_000).expect("due");
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].draft.text, "early");

        assert_eq!(drafts.due_entries(9_000).expect("due").len(), 2);
        assert!(drafts.due_entries(999).expect("due").is_empty());
    }

    #[test]
    fn corrupted_blob_is_treated_as_empty() {
        let (drafts, kv) = store();
        kv.set(DRAFTS_KEY, "{not json").expect("seed");
        kv.set(SCHEDULE_KEY, "42").expect("seed");

        assert!(drafts.drafts().expect("drafts").is_empty());
        assert!(drafts.schedule().expect("schedule").is_empty());

        let draft = drafts.save_draft("fresh start").expect("save over garbage");
        assert_eq!(drafts.drafts().expect("drafts"), vec![draft]);
    }

    #[test]
    fn claimed_entry_stays_in_schedule_but_is_not_due() {
        let (drafts, _) = store();
        let entry = drafts.schedule_text("in flight", 1_000).expect("schedule");

        let claimed = drafts
            .claim(entry.draft.id, "worker-a", 60_000)
            .expect("claim")
            .expect("entry is free");
        assert!(claimed.is_publishing());
        assert_eq!(drafts.schedule().expect("schedule").len(), 1);
        assert!(drafts.due_entries(2_000).expect("due").is_empty());
        assert!(
            drafts
                .claim(entry.draft.id, "worker-b", 60_000)
                .expect("second claim")
                .is_none()
        );

        assert!(drafts.release(&claimed).expect("release"));
        assert_eq!(drafts.due_entries(2_000).expect("due"), vec![entry]);
    }

    #[test]
    fn cancel_during_publish_is_not_undone() {
        let (drafts, _) = store();
        let entry = drafts.schedule_text("cancel me", 1_000).expect("schedule");
        let claimed = drafts
            .claim(entry.draft.id, "worker-a", 60_000)
            .expect("claim")
            .expect("entry is free");

        let cancelled = drafts
            .cancel_scheduled(entry.draft.id)
            .expect("cancel")
            .expect("claimed entry is still visible");
        assert!(cancelled.is_publishing());

        assert!(!drafts.release(&claimed).expect("release"));
        assert!(!drafts.complete(&claimed).expect("complete"));
        assert!(drafts.schedule().expect("schedule").is_empty());
    }

    #[test]
    fn complete_removes_only_own_claim() {
        let (drafts, _) = store();
        let entry = drafts.schedule_text("done", 1_000).expect("schedule");
        let mut foreign = drafts
            .claim(entry.draft.id, "worker-a", 60_000)
            .expect("claim")
            .expect("entry is free");
        foreign.lease = Some(PublishLease {
            owner: "worker-b".to_string(),
            expires_at: 60_000,
        });

        assert!(!drafts.complete(&foreign).expect("complete foreign"));
        assert_eq!(drafts.schedule().expect("schedule").len(), 1);
    }

    #[test]
    fn expired_claims_are_dropped_not_retried() {
        let (drafts, _) = store();
        let stuck = drafts.schedule_text("stuck", 1_000).expect("schedule");
        let waiting = drafts.schedule_text("waiting", 1_000).expect("schedule");
        drafts
            .claim(stuck.draft.id, "crashed-worker", 5_000)
            .expect("claim")
            .expect("entry is free");

        assert!(drafts.drop_expired_leases(4_999).expect("drop").is_empty());

        let dropped = drafts.drop_expired_leases(5_000).expect("drop");
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].draft.id, stuck.draft.id);
        assert_eq!(drafts.schedule().expect("schedule"), vec![waiting]);
    }

    #[tokio::test]
    async fn offload_sees_same_store() {
        let (drafts, _) = store();
        let draft = drafts
            .offload(|d| d.save_draft("from async"))
            .await
            .expect("offloaded save");

        assert_eq!(drafts.drafts().expect("drafts"), vec![draft]);
    }
}
