//! Друзья, заявки в друзья и доступ к ленте чужого профиля.

use std::sync::Arc;

use crate::api::SpacebookApi;
use crate::error::SpacebookResult;
use crate::models::{FriendshipState, Post, Session, UserSummary};
use crate::response::ApiResponse;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Открытый профиль.
pub struct ProfileView {
    /// Отношение просматривающего к владельцу.
    pub friendship: FriendshipState,
    /// Лента профиля. `None` для незнакомца: ленту не запрашивали.
    pub posts: Option<ApiResponse<Vec<Post>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Согласованные списки друзей и входящих заявок.
pub struct FriendsSnapshot {
    /// Друзья текущего пользователя.
    pub friends: ApiResponse<Vec<UserSummary>>,
    /// Входящие заявки.
    pub requests: ApiResponse<Vec<UserSummary>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Ответ на принятие/отклонение заявки вместе с обновлёнными списками.
pub struct RequestDecision {
    /// Ответ на само действие.
    pub response: ApiResponse<()>,
    /// Оба списка, перечитанные после действия.
    pub snapshot: FriendsSnapshot,
}

/// Определяет, может ли просматривающий видеть ленту профиля, и ведёт
/// заявки в друзья.
pub struct FriendshipResolver<A: SpacebookApi> {
    api: Arc<A>,
}

impl<A: SpacebookApi> FriendshipResolver<A> {
    /// Создаёт резолвер поверх API.
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    /// Отношение к владельцу профиля. Для своего профиля список друзей не
    /// запрашивается.
    pub async fn resolve(
        &self,
        session: &Session,
        profile_id: i64,
    ) -> SpacebookResult<ApiResponse<FriendshipState>> {
        if profile_id == session.user_id {
            return Ok(ApiResponse::success(
                "viewing own profile.",
                FriendshipState {
                    is_self: true,
                    is_friend: false,
                },
            ));
        }

        let friends = self.api.get_friends(session, session.user_id).await?;
        Ok(friends.map(|friends| FriendshipState {
            is_self: false,
            is_friend: friends.iter().any(|f| f.user_id == profile_id),
        }))
    }

    /// Открывает профиль: лента запрашивается ровно один раз и только для
    /// себя или друга.
    pub async fn load_profile(
        &self,
        session: &Session,
        profile_id: i64,
    ) -> SpacebookResult<ApiResponse<ProfileView>> {
        let resolved = self.resolve(session, profile_id).await?;
        let Some(friendship) = resolved.body else {
            return Ok(resolved.discard_body());
        };

        let posts = if friendship.can_view_posts() {
            Some(self.api.get_posts(session, profile_id).await?)
        } else {
            tracing::debug!(profile_id, "not a friend, feed suppressed");
            None
        };

        Ok(ApiResponse::success(
            resolved.message,
            ProfileView { friendship, posts },
        ))
    }

    /// Отправляет заявку в друзья.
    pub async fn add_friend(
        &self,
        session: &Session,
        user_id: i64,
    ) -> SpacebookResult<ApiResponse<()>> {
        self.api.add_friend(session, user_id).await
    }

    /// Друзья пользователя `user_id`.
    pub async fn friends(
        &self,
        session: &Session,
        user_id: i64,
    ) -> SpacebookResult<ApiResponse<Vec<UserSummary>>> {
        self.api.get_friends(session, user_id).await
    }

    /// Входящие заявки текущего пользователя.
    pub async fn friend_requests(
        &self,
        session: &Session,
    ) -> SpacebookResult<ApiResponse<Vec<UserSummary>>> {
        self.api.get_friend_requests(session).await
    }

    /// Принимает заявку и перечитывает оба списка.
    pub async fn accept_request(
        &self,
        session: &Session,
        user_id: i64,
    ) -> SpacebookResult<RequestDecision> {
        let response = self.api.accept_friend_request(session, user_id).await?;
        tracing::info!(user_id, ok = response.ok, "friend request accepted");
        self.decide(session, response).await
    }

    /// Отклоняет заявку и перечитывает оба списка.
    pub async fn decline_request(
        &self,
        session: &Session,
        user_id: i64,
    ) -> SpacebookResult<RequestDecision> {
        let response = self.api.decline_friend_request(session, user_id).await?;
        tracing::info!(user_id, ok = response.ok, "friend request declined");
        self.decide(session, response).await
    }

    /// Перечитывает друзей и заявки одновременно.
    pub async fn refresh(&self, session: &Session) -> SpacebookResult<FriendsSnapshot> {
        let (friends, requests) = tokio::join!(
            self.api.get_friends(session, session.user_id),
            self.api.get_friend_requests(session),
        );
        Ok(FriendsSnapshot {
            friends: friends?,
            requests: requests?,
        })
    }

    // оба списка перечитываются всегда, в том числе после отказа
    async fn decide(
        &self,
        session: &Session,
        response: ApiResponse<()>,
    ) -> SpacebookResult<RequestDecision> {
        let snapshot = self.refresh(session).await?;
        Ok(RequestDecision { response, snapshot })
    }
}
