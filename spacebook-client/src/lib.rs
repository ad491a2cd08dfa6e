//! Клиентская библиотека социальной сети Spacebook.
//!
//! Поверх REST API (`reqwest`) предоставляет:
//! - нормализацию ответов в [`ApiResponse`] с таблицей статусов на каждый
//!   эндпоинт ([`HttpClient`]);
//! - вход, регистрацию и профиль ([`AccountService`]);
//! - ленту, CRUD постов и переключение лайка ([`PostEngine`]);
//! - доступ к ленте по дружбе и заявки в друзья ([`FriendshipResolver`]);
//! - локальные черновики и расписание ([`DraftStore`]);
//! - фоновую публикацию расписания ([`BackgroundPublisher`], [`IntervalHost`]).
//!
//! Сессия не хранится внутри клиента: каждая операция получает [`Session`]
//! явно.
#![warn(missing_docs)]

mod account;
mod api;
mod drafts;
mod error;
mod friendship;
mod http_client;
mod models;
mod posts;
mod publisher;
mod response;
mod scope;
mod session;
mod storage;

#[cfg(test)]
mod fake_api;

pub use account::{AccountService, Registration, RegistrationCredentials, RegistrationDraft};
pub use api::SpacebookApi;
pub use drafts::DraftStore;
pub use error::{SpacebookError, SpacebookResult, UnreachableKind};
pub use friendship::{FriendsSnapshot, FriendshipResolver, ProfileView, RequestDecision};
pub use http_client::{AUTH_HEADER, CONNECT_TIMEOUT, HttpClient, REQUEST_TIMEOUT};
pub use models::{
    Author, CreatedPost, Draft, FriendshipState, LikeConflict, LoginResponse, Photo, Post,
    PublishLease, ScheduleEntry, SearchQuery, SearchScope, Session, SignupResponse, User, UserPatch,
    UserSummary,
};
pub use posts::{LikeAction, Mutation, PostEngine, PostPermissions};
pub use publisher::{
    BackgroundPublisher, BackgroundTask, FetchResult, IntervalHost, PUBLISH_LEASE_MS,
};
pub use response::{ApiResponse, FailureKind};
pub use scope::ViewScope;
pub use session::SessionStore;
pub use storage::{
    DRAFTS_KEY, FileStore, KeyValueStore, MemoryStore, SCHEDULE_KEY, SESSION_TOKEN_KEY,
    StoreError, StoreResult, USER_ID_KEY, offload,
};
