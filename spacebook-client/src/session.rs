use std::sync::Arc;

use crate::models::Session;
use crate::storage::{self, KeyValueStore, SESSION_TOKEN_KEY, StoreResult, USER_ID_KEY};

/// Постоянное хранилище сессии (`user_id` + `session_token`).
///
/// Единственный владелец этих ключей: остальные компоненты получают
/// [`Session`] явно и не читают хранилище сами.
pub struct SessionStore<S: KeyValueStore> {
    store: Arc<S>,
}

impl<S: KeyValueStore> Clone for SessionStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: KeyValueStore> SessionStore<S> {
    /// Создаёт хранилище сессии поверх key/value хранилища.
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

    /// Загружает сохранённую сессию.
    ///
    /// Неполная или повреждённая запись считается отсутствующей сессией.
    pub fn load(&self) -> StoreResult<Option<Session>> {
        let user_id = self.store.get(USER_ID_KEY)?;
        let token = self.store.get(SESSION_TOKEN_KEY)?;

        let (Some(user_id), Some(token)) = (user_id, token) else {
            return Ok(None);
        };

        Ok(parse_session(&user_id, &token))
    }

    /// Сохраняет сессию.
    pub fn save(&self, session: &Session) -> StoreResult<()> {
        self.store
            .set(USER_ID_KEY, &session.user_id.to_string())?;
        self.store.set(SESSION_TOKEN_KEY, &session.session_token)
    }

    /// Удаляет сессию.
    pub fn clear(&self) -> StoreResult<()> {
        self.store.remove(SESSION_TOKEN_KEY)?;
        self.store.remove(USER_ID_KEY)
    }
}

fn parse_session(raw_user_id: &str, raw_token: &str) -> Option<Session> {
    let user_id = raw_user_id.trim().parse::<i64>().ok()?;
    let token = raw_token.trim();
    if token.is_empty() {
        return None;
    }
    Some(Session::new(user_id, token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn parse_session_trims_token() {
        let session = parse_session(" 7 ", "  abc  ").expect("session should parse");
        assert_eq!(session.user_id, 7);
        assert_eq!(session.session_token, "abc");
    }

    #[test]
    fn parse_session_rejects_blank_token() {
        assert!(parse_session("7", "   ").is_none());
    }

    #[test]
    fn parse_session_rejects_non_numeric_user_id() {
        assert!(parse_session("seven", "abc").is_none());
    }

    #[test]
    fn save_load_clear() {
        let sessions = SessionStore::new(Arc::new(MemoryStore::new()));
        assert!(sessions.load().expect("load").is_none());

        sessions
            .save(&Session::new(12, "token"))
            .expect("save must succeed");
        assert_eq!(
            sessions.load().expect("load"),
            Some(Session::new(12, "token"))
        );

        sessions.clear().expect("clear must succeed");
        assert!(sessions.load().expect("load").is_none());
    }
}
