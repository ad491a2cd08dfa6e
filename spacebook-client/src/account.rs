//! Вход, регистрация, выход и операции над профилем.

use std::sync::Arc;

use crate::api::SpacebookApi;
use crate::error::SpacebookResult;
use crate::models::{Photo, SearchQuery, Session, User, UserPatch, UserSummary};
use crate::response::ApiResponse;
use crate::session::SessionStore;
use crate::storage::KeyValueStore;

/// Первый шаг регистрации: ещё ничего не введено.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistrationDraft;

/// Второй шаг регистрации: email и пароль введены.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationCredentials {
    email: String,
    password: String,
}

/// Готовые данные регистрации.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    email: String,
    password: String,
    first_name: String,
    last_name: String,
}

impl RegistrationDraft {
    /// Начинает регистрацию.
    pub fn new() -> Self {
        Self
    }

    /// Фиксирует email и пароль и переходит к шагу с именем.
    pub fn credentials(
        self,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> RegistrationCredentials {
        RegistrationCredentials {
            email: email.into().trim().to_string(),
            password: password.into(),
        }
    }
}

impl RegistrationCredentials {
    /// Email, введённый на первом шаге.
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Завершает регистрацию именем и фамилией.
    pub fn details(
        self,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Registration {
        Registration {
            email: self.email,
            password: self.password,
            first_name: first_name.into().trim().to_string(),
            last_name: last_name.into().trim().to_string(),
        }
    }
}

impl Registration {
    /// Email.
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Пароль.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Имя.
    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    /// Фамилия.
    pub fn last_name(&self) -> &str {
        &self.last_name
    }
}

/// Аутентификация и операции над профилем пользователя.
///
/// Единственный компонент, который создаёт и уничтожает сохранённую сессию.
pub struct AccountService<A: SpacebookApi, S: KeyValueStore> {
    api: Arc<A>,
    sessions: SessionStore<S>,
}

impl<A: SpacebookApi, S: KeyValueStore> AccountService<A, S> {
    /// Создаёт сервис поверх API и хранилища сессии.
    pub fn new(api: Arc<A>, sessions: SessionStore<S>) -> Self {
        Self { api, sessions }
    }

    /// Входит по email и паролю и сохраняет сессию.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> SpacebookResult<ApiResponse<Session>> {
        let response = self.api.login(email, password).await?.map(Session::from);

        if let Some(session) = response.body.clone() {
            let user_id = session.user_id;
            self.sessions.offload(move |s| s.save(&session)).await?;
            tracing::info!(user_id, "signed in");
        }
        Ok(response)
    }

    /// Регистрирует пользователя и сразу выполняет вход.
    ///
    /// Если регистрация прошла, а вход нет, возвращается ответ входа:
    /// пользователь существует, но должен войти вручную.
    pub async fn register(
        &self,
        registration: &Registration,
    ) -> SpacebookResult<ApiResponse<Session>> {
        let signup = self.api.signup(registration).await?;
        if !signup.ok {
            return Ok(signup.discard_body());
        }

        tracing::info!(email = registration.email(), "account created");
        self.authenticate(registration.email(), registration.password())
            .await
    }

    /// Восстанавливает сохранённую сессию, проверяя её через `getUser`.
    ///
    /// На 401 сохранённая сессия удаляется. Прочие неуспешные ответы
    /// сессию не трогают, но и не восстанавливают её.
    pub async fn restore(&self) -> SpacebookResult<Option<Session>> {
        let Some(session) = self.sessions.offload(|s| s.load()).await? else {
            return Ok(None);
        };

        let response = self.api.get_user(&session, session.user_id).await?;
        if response.ok {
            return Ok(Some(session));
        }

        if response.is_unauthorized() {
            tracing::info!(user_id = session.user_id, "stored session expired");
            self.sessions.offload(|s| s.clear()).await?;
        }
        Ok(None)
    }

    /// Выходит из аккаунта. Локальная сессия удаляется в любом случае.
    pub async fn unauthenticate(&self, session: &Session) -> SpacebookResult<ApiResponse<()>> {
        let result = self.api.logout(session).await;
        self.sessions.offload(|s| s.clear()).await?;
        tracing::info!(user_id = session.user_id, "signed out");
        result
    }

    /// Возвращает профиль пользователя.
    pub async fn user(&self, session: &Session, user_id: i64) -> SpacebookResult<ApiResponse<User>> {
        self.api.get_user(session, user_id).await
    }

    /// Обновляет имя/фамилию текущего пользователя.
    pub async fn update_profile(
        &self,
        session: &Session,
        patch: &UserPatch,
    ) -> SpacebookResult<ApiResponse<()>> {
        self.api
            .update_user(session, session.user_id, patch)
            .await
    }

    /// Возвращает фото профиля.
    pub async fn profile_photo(
        &self,
        session: &Session,
        user_id: i64,
    ) -> SpacebookResult<ApiResponse<Photo>> {
        self.api.get_profile_photo(session, user_id).await
    }

    /// Загружает фото профиля текущего пользователя.
    pub async fn upload_profile_photo(
        &self,
        session: &Session,
        photo: &Photo,
    ) -> SpacebookResult<ApiResponse<()>> {
        self.api
            .upload_profile_photo(session, session.user_id, photo)
            .await
    }

    /// Ищет пользователей.
    pub async fn search(
        &self,
        session: &Session,
        query: &SearchQuery,
    ) -> SpacebookResult<ApiResponse<Vec<UserSummary>>> {
        self.api.search_users(session, query).await
    }
}
