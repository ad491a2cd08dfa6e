use async_trait::async_trait;

use crate::account::Registration;
use crate::error::SpacebookResult;
use crate::models::{
    CreatedPost, LikeConflict, LoginResponse, Photo, Post, SearchQuery, Session, SignupResponse,
    User, UserPatch, UserSummary,
};
use crate::response::ApiResponse;

/// Операции REST API Spacebook.
///
/// Каждый вызов даёт ровно один [`ApiResponse`]; `Err` возвращается только
/// при сбое транспорта или нечитаемом теле успешного ответа. Повторов
/// реализация не делает: политика повторов остаётся на вызывающей стороне.
#[async_trait]
pub trait SpacebookApi: Send + Sync {
    /// `POST /login`.
    async fn login(&self, email: &str, password: &str)
    -> SpacebookResult<ApiResponse<LoginResponse>>;

    /// `POST /user`.
    async fn signup(&self, registration: &Registration)
    -> SpacebookResult<ApiResponse<SignupResponse>>;

    /// `POST /logout`.
    async fn logout(&self, session: &Session) -> SpacebookResult<ApiResponse<()>>;

    /// `GET /user/{id}`.
    async fn get_user(&self, session: &Session, user_id: i64)
    -> SpacebookResult<ApiResponse<User>>;

    /// `PATCH /user/{id}`.
    async fn update_user(
        &self,
        session: &Session,
        user_id: i64,
        patch: &UserPatch,
    ) -> SpacebookResult<ApiResponse<()>>;

    /// `GET /user/{id}/photo`.
    async fn get_profile_photo(
        &self,
        session: &Session,
        user_id: i64,
    ) -> SpacebookResult<ApiResponse<Photo>>;

    /// `POST /user/{id}/photo`.
    async fn upload_profile_photo(
        &self,
        session: &Session,
        user_id: i64,
        photo: &Photo,
    ) -> SpacebookResult<ApiResponse<()>>;

    /// `GET /user/{id}/post`.
    async fn get_posts(&self, session: &Session, user_id: i64)
    -> SpacebookResult<ApiResponse<Vec<Post>>>;

    /// `POST /user/{id}/post`.
    async fn create_post(
        &self,
        session: &Session,
        user_id: i64,
        text: &str,
    ) -> SpacebookResult<ApiResponse<CreatedPost>>;

    /// `GET /user/{id}/post/{post_id}`.
    async fn get_post(
        &self,
        session: &Session,
        user_id: i64,
        post_id: i64,
    ) -> SpacebookResult<ApiResponse<Post>>;

    /// `PATCH /user/{id}/post/{post_id}`.
    async fn update_post(
        &self,
        session: &Session,
        user_id: i64,
        post_id: i64,
        text: &str,
    ) -> SpacebookResult<ApiResponse<()>>;

    /// `DELETE /user/{id}/post/{post_id}`.
    async fn delete_post(
        &self,
        session: &Session,
        user_id: i64,
        post_id: i64,
    ) -> SpacebookResult<ApiResponse<()>>;

    /// `POST /user/{id}/post/{post_id}/like`.
    ///
    /// На 400 тело несёт `is_already_liked = true`.
    async fn like_post(
        &self,
        session: &Session,
        user_id: i64,
        post_id: i64,
    ) -> SpacebookResult<ApiResponse<LikeConflict>>;

    /// `DELETE /user/{id}/post/{post_id}/like`.
    ///
    /// На 400 тело несёт `is_already_unliked = true`.
    async fn unlike_post(
        &self,
        session: &Session,
        user_id: i64,
        post_id: i64,
    ) -> SpacebookResult<ApiResponse<LikeConflict>>;

    /// `GET /user/{id}/friends`.
    async fn get_friends(
        &self,
        session: &Session,
        user_id: i64,
    ) -> SpacebookResult<ApiResponse<Vec<UserSummary>>>;

    /// `POST /user/{id}/friends`: отправляет заявку в друзья.
    async fn add_friend(&self, session: &Session, user_id: i64)
    -> SpacebookResult<ApiResponse<()>>;

    /// `GET /friendrequests`.
    async fn get_friend_requests(
        &self,
        session: &Session,
    ) -> SpacebookResult<ApiResponse<Vec<UserSummary>>>;

    /// `POST /friendrequests/{id}`.
    async fn accept_friend_request(
        &self,
        session: &Session,
        user_id: i64,
    ) -> SpacebookResult<ApiResponse<()>>;

    /// `DELETE /friendrequests/{id}`.
    async fn decline_friend_request(
        &self,
        session: &Session,
        user_id: i64,
    ) -> SpacebookResult<ApiResponse<()>>;

    /// `GET /search`.
    async fn search_users(
        &self,
        session: &Session,
        query: &SearchQuery,
    ) -> SpacebookResult<ApiResponse<Vec<UserSummary>>>;
}
