use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Сессия авторизованного пользователя.
///
/// Создаётся при входе/регистрации и передаётся в каждую операцию явно.
pub struct Session {
    /// Идентификатор пользователя.
    pub user_id: i64,
    /// Токен сессии, отправляется в заголовке `X-Authorization`.
    pub session_token: String,
}

impl Session {
    /// Создаёт сессию из идентификатора и токена.
    pub fn new(user_id: i64, session_token: impl Into<String>) -> Self {
        Self {
            user_id,
            session_token: session_token.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Профиль пользователя.
pub struct User {
    /// Идентификатор пользователя.
    pub user_id: i64,
    /// Имя.
    pub first_name: String,
    /// Фамилия.
    pub last_name: String,
    /// Email.
    pub email: String,
    /// Количество друзей.
    pub friend_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Краткие данные пользователя: друг, заявка в друзья, результат поиска.
pub struct UserSummary {
    /// Идентификатор пользователя.
    pub user_id: i64,
    /// Имя.
    pub first_name: String,
    /// Фамилия.
    pub last_name: String,
    /// Email.
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Автор поста.
pub struct Author {
    /// Идентификатор автора.
    pub user_id: i64,
    /// Имя.
    pub first_name: String,
    /// Фамилия.
    pub last_name: String,
    /// Email.
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Пост на странице пользователя.
///
/// Идентификатор всегда назначает сервер. Флага "я лайкнул этот пост"
/// сервер не отдаёт.
pub struct Post {
    /// Идентификатор поста.
    pub post_id: i64,
    /// Текст поста.
    pub text: String,
    /// Время публикации, unix ms.
    pub timestamp: i64,
    /// Автор.
    pub author: Author,
    /// Количество лайков.
    pub num_likes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Ответ на создание поста.
pub struct CreatedPost {
    /// Идентификатор созданного поста.
    pub post_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Ответ после успешного входа.
pub struct LoginResponse {
    /// Идентификатор пользователя.
    pub id: i64,
    /// Токен сессии.
    pub token: String,
}

impl From<LoginResponse> for Session {
    fn from(value: LoginResponse) -> Self {
        Self {
            user_id: value.id,
            session_token: value.token,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Ответ после успешной регистрации.
pub struct SignupResponse {
    /// Идентификатор нового пользователя.
    pub id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Изменение профиля. Поля `None` не отправляются.
pub struct UserPatch {
    /// Новое имя.
    pub first_name: Option<String>,
    /// Новая фамилия.
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Фото профиля.
pub struct Photo {
    /// MIME-тип (`image/png`, `image/jpeg`).
    pub content_type: String,
    /// Содержимое файла.
    pub bytes: Vec<u8>,
}

impl Photo {
    /// Кодирует фото в `data:` URL.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type,
            STANDARD.encode(&self.bytes)
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Где искать пользователей.
pub enum SearchScope {
    /// Среди всех пользователей.
    #[default]
    All,
    /// Только среди друзей.
    Friends,
}

impl SearchScope {
    pub(crate) fn as_query_value(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Friends => "friends",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Параметры поиска пользователей.
pub struct SearchQuery {
    /// Строка поиска.
    pub query: String,
    /// Область поиска.
    pub scope: SearchScope,
    /// Максимум результатов.
    pub limit: u32,
    /// Смещение от начала выборки.
    pub offset: u32,
}

impl SearchQuery {
    /// Лимит, который использует клиент по умолчанию.
    pub const DEFAULT_LIMIT: u32 = 20;

    /// Поиск по всем пользователям с лимитом по умолчанию.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            scope: SearchScope::All,
            limit: Self::DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Флаг уточнения в неуспешном ответе на лайк/анлайк.
pub struct LikeConflict {
    /// Пост уже лайкнут текущим пользователем.
    pub is_already_liked: bool,
    /// Пост уже не лайкнут текущим пользователем.
    pub is_already_unliked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Неотправленный черновик поста. Живёт только в локальном хранилище.
pub struct Draft {
    /// Локальный идентификатор (время создания, unix ms).
    pub id: i64,
    /// Текст черновика.
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Черновик, запланированный к публикации.
pub struct ScheduleEntry {
    /// Черновик.
    pub draft: Draft,
    /// Целевое время публикации, unix ms.
    pub timestamp: i64,
    /// Отметка фоновой публикации, которая сейчас идёт.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease: Option<PublishLease>,
}

impl ScheduleEntry {
    /// Новая запись без отметки публикации.
    pub fn new(draft: Draft, timestamp: i64) -> Self {
        Self {
            draft,
            timestamp,
            lease: None,
        }
    }

    /// Время публикации наступило.
    pub fn is_due(&self, now_ms: i64) -> bool {
        now_ms >= self.timestamp
    }

    /// Запись сейчас публикуется.
    pub fn is_publishing(&self) -> bool {
        self.lease.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Захват записи расписания фоновым публикатором на время `createPost`.
///
/// Запись остаётся в `in_schedule`, поэтому отмена пользователем во время
/// запроса видна публикатору.
pub struct PublishLease {
    /// Идентификатор публикатора.
    pub owner: String,
    /// Срок действия захвата, unix ms.
    pub expires_at: i64,
}

impl PublishLease {
    /// Захват просрочен: публикатор не вернулся к записи вовремя.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Отношение просматривающего к владельцу профиля. Не хранится, вычисляется
/// при каждом открытии профиля.
pub struct FriendshipState {
    /// Просматривающий - владелец профиля.
    pub is_self: bool,
    /// Просматривающий - друг владельца профиля.
    pub is_friend: bool,
}

impl FriendshipState {
    /// Лента постов профиля может быть запрошена.
    pub fn can_view_posts(&self) -> bool {
        self.is_self || self.is_friend
    }
}
