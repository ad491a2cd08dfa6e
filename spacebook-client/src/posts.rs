//! Посты: лента, CRUD и переключение лайка.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

use crate::api::SpacebookApi;
use crate::error::SpacebookResult;
use crate::models::{CreatedPost, Post, Session};
use crate::response::{ApiResponse, FailureKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Какие действия над постом доступны просматривающему.
pub struct PostPermissions {
    /// Можно поставить/снять лайк.
    pub can_like: bool,
    /// Можно редактировать.
    pub can_edit: bool,
    /// Можно удалить.
    pub can_delete: bool,
}

impl PostPermissions {
    /// Вычисляет права для поста `post` на странице `profile_id`.
    ///
    /// Свой пост можно править и удалять, но нельзя лайкать. Чужой пост на
    /// чужой странице можно лайкать. Чужой пост на своей странице неизменяем.
    pub fn resolve(viewer_id: i64, profile_id: i64, post: &Post) -> Self {
        let own = post.author.user_id == viewer_id;
        let likeable = !own && profile_id != viewer_id;
        Self {
            can_like: likeable,
            can_edit: own,
            can_delete: own,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Что в итоге сделало переключение лайка.
pub enum LikeAction {
    /// Лайк поставлен.
    Liked,
    /// Пост уже был лайкнут, лайк снят.
    Unliked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Результат изменения поста.
pub struct Mutation<T> {
    /// Ответ на само изменение.
    pub response: ApiResponse<T>,
    /// Перезагруженная лента профиля; только если изменение прошло.
    pub feed: Option<ApiResponse<Vec<Post>>>,
}

/// Операции над постами одного просматривающего.
///
/// Лайк, правка и удаление одного поста сериализуются: пока идёт
/// переключение лайка, второе переключение того же поста ждёт.
pub struct PostEngine<A: SpacebookApi> {
    api: Arc<A>,
    locks: LockMap,
}

type LockMap = Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>;

/// Захват одного поста. Запись в карте блокировок живёт, пока её кто-то
/// держит или ждёт.
struct PostGuard<'a> {
    locks: &'a LockMap,
    post_id: i64,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PostGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        let idle = locks
            .get(&self.post_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            locks.remove(&self.post_id);
        }
    }
}

impl<A: SpacebookApi> PostEngine<A> {
    /// Создаёт движок поверх API.
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Права просматривающего на пост.
    pub fn permissions(&self, session: &Session, profile_id: i64, post: &Post) -> PostPermissions {
        PostPermissions::resolve(session.user_id, profile_id, post)
    }

    /// Лента постов профиля.
    pub async fn feed(
        &self,
        session: &Session,
        profile_id: i64,
    ) -> SpacebookResult<ApiResponse<Vec<Post>>> {
        self.api.get_posts(session, profile_id).await
    }

    /// Один пост.
    pub async fn get_post(
        &self,
        session: &Session,
        profile_id: i64,
        post_id: i64,
    ) -> SpacebookResult<ApiResponse<Post>> {
        self.api.get_post(session, profile_id, post_id).await
    }

    /// Публикует пост на странице `profile_id`.
    pub async fn create_post(
        &self,
        session: &Session,
        profile_id: i64,
        text: &str,
    ) -> SpacebookResult<Mutation<CreatedPost>> {
        let response = self.publish(session, profile_id, text).await?;
        self.settle(session, profile_id, response).await
    }

    /// Публикует пост без перезагрузки ленты.
    pub async fn publish(
        &self,
        session: &Session,
        profile_id: i64,
        text: &str,
    ) -> SpacebookResult<ApiResponse<CreatedPost>> {
        let response = self.api.create_post(session, profile_id, text).await?;
        if let Some(created) = response.body.as_ref() {
            tracing::info!(profile_id, post_id = created.post_id, "post created");
        }
        Ok(response)
    }

    /// Меняет текст поста. Чужой пост отклоняется без обращения к серверу,
    /// но и отказ сервера возвращается как есть.
    pub async fn update_post(
        &self,
        session: &Session,
        profile_id: i64,
        post: &Post,
        text: &str,
    ) -> SpacebookResult<Mutation<()>> {
        if !self.permissions(session, profile_id, post).can_edit {
            return Ok(denied("you can only update your own posts."));
        }

        let _guard = self.lock_post(post.post_id).await;
        let response = self
            .api
            .update_post(session, profile_id, post.post_id, text)
            .await?;
        self.settle(session, profile_id, response).await
    }

    /// Удаляет пост. Права проверяются так же, как в [`Self::update_post`].
    pub async fn delete_post(
        &self,
        session: &Session,
        profile_id: i64,
        post: &Post,
    ) -> SpacebookResult<Mutation<()>> {
        if !self.permissions(session, profile_id, post).can_delete {
            return Ok(denied("you can only delete your own posts."));
        }

        let _guard = self.lock_post(post.post_id).await;
        let response = self
            .api
            .delete_post(session, profile_id, post.post_id)
            .await?;
        self.settle(session, profile_id, response).await
    }

    /// Переключает лайк.
    ///
    /// Сервер не сообщает, лайкнут ли пост, поэтому сначала ставится лайк.
    /// Если сервер отвечает, что лайк уже стоит, лайк снимается. Любой другой
    /// отказ (а также ошибка транспорта, включая таймаут) возвращается без
    /// второго вызова. Отказ снятия лайка обратно в лайк не превращается.
    pub async fn toggle_like(
        &self,
        session: &Session,
        profile_id: i64,
        post_id: i64,
    ) -> SpacebookResult<Mutation<LikeAction>> {
        let _guard = self.lock_post(post_id).await;

        let like = self.api.like_post(session, profile_id, post_id).await?;
        if like.ok {
            let response = ApiResponse::success(like.message, LikeAction::Liked);
            return self.settle(session, profile_id, response).await;
        }

        let already_liked = like.failure == Some(FailureKind::Conflict)
            && like.body.is_some_and(|conflict| conflict.is_already_liked);
        if !already_liked {
            return Ok(Mutation {
                response: like.discard_body(),
                feed: None,
            });
        }

        tracing::debug!(post_id, "post already liked, unliking");
        let unlike = self.api.unlike_post(session, profile_id, post_id).await?;
        if !unlike.ok {
            return Ok(Mutation {
                response: unlike.discard_body(),
                feed: None,
            });
        }

        let response = ApiResponse::success(unlike.message, LikeAction::Unliked);
        self.settle(session, profile_id, response).await
    }

    /// После успешного изменения перезагружает ленту.
    async fn settle<T>(
        &self,
        session: &Session,
        profile_id: i64,
        response: ApiResponse<T>,
    ) -> SpacebookResult<Mutation<T>> {
        if !response.ok {
            return Ok(Mutation {
                response,
                feed: None,
            });
        }

        let feed = self.feed(session, profile_id).await?;
        Ok(Mutation {
            response,
            feed: Some(feed),
        })
    }

    async fn lock_post(&self, post_id: i64) -> PostGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            Arc::clone(locks.entry(post_id).or_default())
        };

        let mut held = PostGuard {
            locks: &self.locks,
            post_id,
            guard: None,
        };
        held.guard = Some(lock.lock_owned().await);
        held
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

fn denied<T>(message: &str) -> Mutation<T> {
    Mutation {
        response: ApiResponse::failure(FailureKind::Forbidden, message),
        feed: None,
    }
}
