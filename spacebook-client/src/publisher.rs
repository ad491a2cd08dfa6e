//! Фоновая публикация запланированных постов.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::api::SpacebookApi;
use crate::drafts::DraftStore;
use crate::error::{SpacebookError, UnreachableKind};
use crate::models::{ScheduleEntry, Session};
use crate::posts::PostEngine;
use crate::session::SessionStore;
use crate::storage::KeyValueStore;

/// Сколько запись может оставаться захваченной публикатором, unix ms.
/// С запасом больше таймаута запроса.
pub const PUBLISH_LEASE_MS: i64 = 5 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Итог одного фонового запуска, по нему хост подбирает частоту запусков.
pub enum FetchResult {
    /// Опубликован хотя бы один пост.
    NewData,
    /// Публиковать было нечего.
    NoData,
    /// Ничего не опубликовано, и были ошибки.
    Failed,
}

/// Задача, которую хост запускает по таймеру.
#[async_trait]
pub trait BackgroundTask: Send + Sync {
    /// Один запуск. `now_ms` - текущее время, unix ms.
    async fn run(&self, now_ms: i64) -> FetchResult;
}

/// Публикует записи расписания, время которых наступило.
///
/// Не делит память с foreground-частью: сессию и расписание читает только
/// из постоянного хранилища.
pub struct BackgroundPublisher<A: SpacebookApi, S: KeyValueStore> {
    posts: PostEngine<A>,
    sessions: SessionStore<S>,
    drafts: DraftStore<S>,
    owner: String,
}

enum EntryOutcome {
    Published,
    Failed,
    Skipped,
}

impl<A: SpacebookApi, S: KeyValueStore> BackgroundPublisher<A, S> {
    /// Создаёт публикатор поверх API и общего хранилища.
    pub fn new(api: Arc<A>, store: Arc<S>) -> Self {
        static SEQ: AtomicU64 = AtomicU64::new(0);

        Self {
            posts: PostEngine::new(api),
            sessions: SessionStore::new(Arc::clone(&store)),
            drafts: DraftStore::new(store),
            owner: format!(
                "publisher-{}-{}",
                std::process::id(),
                SEQ.fetch_add(1, Ordering::Relaxed)
            ),
        }
    }

    /// Публикует все записи, которые должны выйти к `now_ms`.
    ///
    /// Перед `createPost` запись захватывается отметкой в `in_schedule`.
    /// При явном отказе сервера (или если соединение не было установлено)
    /// отметка снимается, и запись ждёт следующего запуска. При таймауте и
    /// прочих неясных исходах запись удаляется без повтора: каждая запись
    /// публикуется не больше одного раза. Отменённая во время запроса запись
    /// в расписание не возвращается.
    pub async fn run_once(&self, now_ms: i64) -> FetchResult {
        let session = match self.sessions.offload(|s| s.load()).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                tracing::debug!("no stored session, nothing to publish");
                return FetchResult::NoData;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to read stored session");
                return FetchResult::Failed;
            }
        };

        match self
            .drafts
            .offload(move |d| d.drop_expired_leases(now_ms))
            .await
        {
            Ok(dropped) => {
                for entry in dropped {
                    tracing::error!(
                        draft_id = entry.draft.id,
                        "publish lease expired, outcome unknown, dropping entry"
                    );
                }
            }
            Err(err) => tracing::error!(error = %err, "failed to expire publish leases"),
        }

        let due = match self.drafts.offload(move |d| d.due_entries(now_ms)).await {
            Ok(due) => due,
            Err(err) => {
                tracing::error!(error = %err, "failed to read schedule");
                return FetchResult::Failed;
            }
        };
        if due.is_empty() {
            return FetchResult::NoData;
        }

        let mut published = 0usize;
        let mut failed = 0usize;
        for entry in due {
            match self.publish_entry(&session, entry, now_ms).await {
                EntryOutcome::Published => published += 1,
                EntryOutcome::Failed => failed += 1,
                EntryOutcome::Skipped => {}
            }
        }

        tracing::info!(published, failed, "scheduled publishing finished");
        if published > 0 {
            FetchResult::NewData
        } else if failed > 0 {
            FetchResult::Failed
        } else {
            FetchResult::NoData
        }
    }

    async fn publish_entry(
        &self,
        session: &Session,
        entry: ScheduleEntry,
        now_ms: i64,
    ) -> EntryOutcome {
        let draft_id = entry.draft.id;
        let owner = self.owner.clone();
        let expires_at = now_ms.saturating_add(PUBLISH_LEASE_MS);
        let claimed = match self
            .drafts
            .offload(move |d| d.claim(draft_id, &owner, expires_at))
            .await
        {
            Ok(Some(claimed)) => claimed,
            // запись уже отменили или её публикует другой процесс
            Ok(None) => return EntryOutcome::Skipped,
            Err(err) => {
                tracing::error!(draft_id, error = %err, "failed to claim schedule entry");
                return EntryOutcome::Failed;
            }
        };

        match self
            .posts
            .publish(session, session.user_id, &claimed.draft.text)
            .await
        {
            Ok(response) if response.ok => {
                tracing::info!(draft_id, "scheduled post published");
                self.finish(claimed).await;
                EntryOutcome::Published
            }
            Ok(response) => {
                tracing::warn!(
                    draft_id,
                    failure = ?response.failure,
                    message = %response.message,
                    "scheduled post rejected, keeping it in schedule"
                );
                self.release(claimed).await
            }
            Err(
                err @ SpacebookError::Unreachable {
                    kind: UnreachableKind::Connect,
                    ..
                },
            ) => {
                tracing::warn!(draft_id, error = %err, "server unreachable, keeping entry in schedule");
                self.release(claimed).await
            }
            Err(err) => {
                tracing::error!(
                    draft_id,
                    error = %err,
                    "publish outcome unknown, dropping entry"
                );
                self.finish(claimed).await;
                EntryOutcome::Failed
            }
        }
    }

    async fn finish(&self, claimed: ScheduleEntry) {
        let draft_id = claimed.draft.id;
        match self.drafts.offload(move |d| d.complete(&claimed)).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!(draft_id, "entry was cancelled while publishing"),
            Err(err) => {
                tracing::error!(draft_id, error = %err, "failed to remove published entry")
            }
        }
    }

    async fn release(&self, claimed: ScheduleEntry) -> EntryOutcome {
        let draft_id = claimed.draft.id;
        match self.drafts.offload(move |d| d.release(&claimed)).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(draft_id, "entry was cancelled while publishing, not restoring")
            }
            Err(err) => {
                tracing::error!(draft_id, error = %err, "failed to release schedule entry")
            }
        }
        EntryOutcome::Failed
    }
}

#[async_trait]
impl<A: SpacebookApi, S: KeyValueStore> BackgroundTask for BackgroundPublisher<A, S> {
    async fn run(&self, now_ms: i64) -> FetchResult {
        self.run_once(now_ms).await
    }
}

#[derive(Debug, Clone, Copy)]
/// Хост фоновой задачи: запускает её по таймеру до сигнала остановки.
///
/// После `NoData` интервал удваивается (не больше `max_interval`), после
/// `NewData` возвращается к базовому.
pub struct IntervalHost {
    interval: Duration,
    max_interval: Duration,
}

impl IntervalHost {
    /// Создаёт хост. `max_interval` меньше `interval` поднимается до него.
    pub fn new(interval: Duration, max_interval: Duration) -> Self {
        Self {
            interval,
            max_interval: max_interval.max(interval),
        }
    }

    /// Следующая пауза после запуска с результатом `result`.
    pub fn next_delay(&self, current: Duration, result: FetchResult) -> Duration {
        match result {
            FetchResult::NewData => self.interval,
            FetchResult::NoData => current.saturating_mul(2).min(self.max_interval),
            FetchResult::Failed => current,
        }
    }

    /// Запускает задачу сразу и далее по таймеру, пока в `shutdown` не придёт
    /// `true` или отправитель не будет закрыт. Возвращает число запусков.
    pub async fn run<T: BackgroundTask + ?Sized>(
        &self,
        task: &T,
        mut shutdown: watch::Receiver<bool>,
    ) -> usize {
        let mut delay = self.interval;
        let mut invocations = 0usize;
        tracing::info!(interval = ?self.interval, "background task registered");

        while !*shutdown.borrow() {
            let result = task.run(chrono::Utc::now().timestamp_millis()).await;
            invocations += 1;
            delay = self.next_delay(delay, result);
            tracing::debug!(?result, next_run_in = ?delay, "background task finished");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!(invocations, "background task unregistered");
        invocations
    }
}
