use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

use crate::account::Registration;
use crate::api::SpacebookApi;
use crate::error::{SpacebookError, SpacebookResult};
use crate::models::{
    Author, CreatedPost, LikeConflict, LoginResponse, Photo, Post, SearchQuery, Session,
    SignupResponse, User, UserPatch, UserSummary,
};
use crate::response::{ApiResponse, Classified, EndpointRules, FailureKind, rules};

/// Заголовок, в котором сервер ждёт токен сессии.
pub const AUTH_HEADER: &str = "X-Authorization";

#[derive(Debug, Serialize)]
struct LoginRequestDto<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct SignupRequestDto<'a> {
    email: &'a str,
    password: &'a str,
    first_name: &'a str,
    last_name: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdateUserRequestDto<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    first_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct PostTextDto<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct SearchParams<'a> {
    q: &'a str,
    search_in: &'static str,
    limit: u32,
    offset: u32,
}

#[derive(Debug, Deserialize)]
struct LoginResponseDto {
    id: i64,
    token: String,
}

#[derive(Debug, Deserialize)]
struct SignupResponseDto {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct CreatedPostDto {
    post_id: i64,
}

#[derive(Debug, Deserialize)]
struct UserDto {
    user_id: i64,
    first_name: String,
    last_name: String,
    email: String,
    #[serde(default)]
    friend_count: i64,
}

#[derive(Debug, Deserialize)]
struct AuthorDto {
    user_id: i64,
    first_name: String,
    last_name: String,
    email: String,
}

#[derive(Debug, Deserialize)]
struct PostDto {
    post_id: i64,
    text: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    timestamp: i64,
    author: AuthorDto,
    #[serde(alias = "numLikes", default)]
    num_likes: i64,
}

/// Элемент списка друзей и результатов поиска.
#[derive(Debug, Deserialize)]
struct ListedUserDto {
    user_id: i64,
    user_givenname: String,
    user_familyname: String,
    user_email: String,
}

#[derive(Debug, Deserialize)]
struct FriendRequestDto {
    user_id: i64,
    first_name: String,
    last_name: String,
    email: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TimestampDto {
    Millis(i64),
    Text(String),
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match TimestampDto::deserialize(deserializer)? {
        TimestampDto::Millis(value) => Ok(value),
        TimestampDto::Text(raw) => chrono::DateTime::parse_from_rfc3339(raw.trim())
            .map(|dt| dt.timestamp_millis())
            .or_else(|_| raw.trim().parse::<i64>())
            .map_err(|_| de::Error::custom(format!("invalid post timestamp: {raw}"))),
    }
}

impl From<LoginResponseDto> for LoginResponse {
    fn from(value: LoginResponseDto) -> Self {
        Self {
            id: value.id,
            token: value.token,
        }
    }
}

impl From<SignupResponseDto> for SignupResponse {
    fn from(value: SignupResponseDto) -> Self {
        Self { id: value.id }
    }
}

impl From<CreatedPostDto> for CreatedPost {
    fn from(value: CreatedPostDto) -> Self {
        Self {
            post_id: value.post_id,
        }
    }
}

impl From<UserDto> for User {
    fn from(value: UserDto) -> Self {
        Self {
            user_id: value.user_id,
            first_name: value.first_name,
            last_name: value.last_name,
            email: value.email,
            friend_count: value.friend_count,
        }
    }
}

impl From<PostDto> for Post {
    fn from(value: PostDto) -> Self {
        Self {
            post_id: value.post_id,
            text: value.text,
            timestamp: value.timestamp,
            author: Author {
                user_id: value.author.user_id,
                first_name: value.author.first_name,
                last_name: value.author.last_name,
                email: value.author.email,
            },
            num_likes: value.num_likes,
        }
    }
}

impl From<ListedUserDto> for UserSummary {
    fn from(value: ListedUserDto) -> Self {
        Self {
            user_id: value.user_id,
            first_name: value.user_givenname,
            last_name: value.user_familyname,
            email: value.user_email,
        }
    }
}

impl From<FriendRequestDto> for UserSummary {
    fn from(value: FriendRequestDto) -> Self {
        Self {
            user_id: value.user_id,
            first_name: value.first_name,
            last_name: value.last_name,
            email: value.email,
        }
    }
}

/// Таймаут установки соединения по умолчанию.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Таймаут всего запроса по умолчанию.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
/// HTTP-клиент REST API Spacebook: нормализует статусы в [`ApiResponse`].
pub struct HttpClient {
    base_url: String,
    client: Client,
}

impl HttpClient {
    /// Создаёт новый HTTP-клиент с базовым URL сервера.
    pub fn new(base_url: impl Into<String>) -> SpacebookResult<Self> {
        Self::with_timeouts(base_url, CONNECT_TIMEOUT, REQUEST_TIMEOUT)
    }

    /// То же, что [`HttpClient::new`], с явными таймаутами соединения и
    /// всего запроса.
    pub fn with_timeouts(
        base_url: impl Into<String>,
        connect: Duration,
        total: Duration,
    ) -> SpacebookResult<Self> {
        let client = Client::builder()
            .connect_timeout(connect)
            .timeout(total)
            .build()
            .map_err(|err| {
                SpacebookError::InvalidRequest(format!("failed to build http client: {err}"))
            })?;

        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    /// Базовый URL сервера.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: Method, path: &str, session: Option<&Session>) -> RequestBuilder {
        let mut request = self.client.request(method, self.endpoint(path));
        if let Some(session) = session {
            request = request.header(AUTH_HEADER, session.session_token.as_str());
        }
        request
    }

    async fn dispatch(
        &self,
        rules: &EndpointRules,
        request: RequestBuilder,
    ) -> SpacebookResult<(Classified, reqwest::Response)> {
        let response = request.send().await.map_err(|err| {
            tracing::debug!(endpoint = rules.name, error = %err, "spacebook request failed");
            SpacebookError::from_reqwest(err)
        })?;

        let status = response.status();
        tracing::debug!(
            endpoint = rules.name,
            status = status.as_u16(),
            "spacebook response"
        );
        Ok((rules.classify(status), response))
    }

    /// универсальный helper для операций с json-телом в успешном ответе
    async fn expect_json<D>(
        &self,
        rules: &EndpointRules,
        request: RequestBuilder,
    ) -> SpacebookResult<ApiResponse<D>>
    where
        D: DeserializeOwned,
    {
        match self.dispatch(rules, request).await? {
            (Classified::Success(message), response) => {
                let bytes = response.bytes().await.map_err(SpacebookError::from_reqwest)?;
                let body = serde_json::from_slice::<D>(&bytes).map_err(|err| {
                    SpacebookError::Decode {
                        endpoint: rules.name,
                        message: err.to_string(),
                    }
                })?;
                Ok(ApiResponse::success(message, body))
            }
            (Classified::Failure(kind, message), _) => Ok(ApiResponse::failure(kind, message)),
        }
    }

    async fn expect_empty(
        &self,
        rules: &EndpointRules,
        request: RequestBuilder,
    ) -> SpacebookResult<ApiResponse<()>> {
        match self.dispatch(rules, request).await? {
            (Classified::Success(message), _) => Ok(ApiResponse::success_empty(message)),
            (Classified::Failure(kind, message), _) => Ok(ApiResponse::failure(kind, message)),
        }
    }

    async fn expect_like(
        &self,
        rules: &EndpointRules,
        request: RequestBuilder,
        conflict: LikeConflict,
    ) -> SpacebookResult<ApiResponse<LikeConflict>> {
        let response = self.expect_empty(rules, request).await?.discard_body();
        if response.failure == Some(FailureKind::Conflict) {
            return Ok(response.with_body(conflict));
        }
        Ok(response)
    }
}

#[async_trait]
impl SpacebookApi for HttpClient {
    async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> SpacebookResult<ApiResponse<LoginResponse>> {
        let payload = LoginRequestDto { email, password };
        let request = self.request(Method::POST, "/login", None).json(&payload);
        let response = self
            .expect_json::<LoginResponseDto>(&rules::LOGIN, request)
            .await?;
        Ok(response.map(LoginResponse::from))
    }

    async fn signup(
        &self,
        registration: &Registration,
    ) -> SpacebookResult<ApiResponse<SignupResponse>> {
        let payload = SignupRequestDto {
            email: registration.email(),
            password: registration.password(),
            first_name: registration.first_name(),
            last_name: registration.last_name(),
        };
        let request = self.request(Method::POST, "/user", None).json(&payload);
        let response = self
            .expect_json::<SignupResponseDto>(&rules::SIGNUP, request)
            .await?;
        Ok(response.map(SignupResponse::from))
    }

    async fn logout(&self, session: &Session) -> SpacebookResult<ApiResponse<()>> {
        let request = self.request(Method::POST, "/logout", Some(session));
        self.expect_empty(&rules::LOGOUT, request).await
    }

    async fn get_user(
        &self,
        session: &Session,
        user_id: i64,
    ) -> SpacebookResult<ApiResponse<User>> {
        let request = self.request(Method::GET, &format!("/user/{user_id}"), Some(session));
        let response = self.expect_json::<UserDto>(&rules::GET_USER, request).await?;
        Ok(response.map(User::from))
    }

    async fn update_user(
        &self,
        session: &Session,
        user_id: i64,
        patch: &UserPatch,
    ) -> SpacebookResult<ApiResponse<()>> {
        let payload = UpdateUserRequestDto {
            first_name: patch.first_name.as_deref(),
            last_name: patch.last_name.as_deref(),
        };
        let request = self
            .request(Method::PATCH, &format!("/user/{user_id}"), Some(session))
            .json(&payload);
        self.expect_empty(&rules::UPDATE_USER, request).await
    }

    async fn get_profile_photo(
        &self,
        session: &Session,
        user_id: i64,
    ) -> SpacebookResult<ApiResponse<Photo>> {
        let request = self.request(
            Method::GET,
            &format!("/user/{user_id}/photo"),
            Some(session),
        );

        match self.dispatch(&rules::GET_PHOTO, request).await? {
            (Classified::Success(message), response) => {
                let content_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("image/png")
                    .to_string();
                let bytes = response
                    .bytes()
                    .await
                    .map_err(SpacebookError::from_reqwest)?;
                Ok(ApiResponse::success(
                    message,
                    Photo {
                        content_type,
                        bytes: bytes.to_vec(),
                    },
                ))
            }
            (Classified::Failure(kind, message), _) => Ok(ApiResponse::failure(kind, message)),
        }
    }

    async fn upload_profile_photo(
        &self,
        session: &Session,
        user_id: i64,
        photo: &Photo,
    ) -> SpacebookResult<ApiResponse<()>> {
        let request = self
            .request(
                Method::POST,
                &format!("/user/{user_id}/photo"),
                Some(session),
            )
            .header(CONTENT_TYPE, photo.content_type.as_str())
            .body(photo.bytes.clone());
        self.expect_empty(&rules::UPLOAD_PHOTO, request).await
    }

    async fn get_posts(
        &self,
        session: &Session,
        user_id: i64,
    ) -> SpacebookResult<ApiResponse<Vec<Post>>> {
        let request = self.request(Method::GET, &format!("/user/{user_id}/post"), Some(session));
        let response = self
            .expect_json::<Vec<PostDto>>(&rules::GET_POSTS, request)
            .await?;
        Ok(response.map(|posts| posts.into_iter().map(Post::from).collect()))
    }

    async fn create_post(
        &self,
        session: &Session,
        user_id: i64,
        text: &str,
    ) -> SpacebookResult<ApiResponse<CreatedPost>> {
        let request = self
            .request(Method::POST, &format!("/user/{user_id}/post"), Some(session))
            .json(&PostTextDto { text });
        let response = self
            .expect_json::<CreatedPostDto>(&rules::CREATE_POST, request)
            .await?;
        Ok(response.map(CreatedPost::from))
    }

    async fn get_post(
        &self,
        session: &Session,
        user_id: i64,
        post_id: i64,
    ) -> SpacebookResult<ApiResponse<Post>> {
        let request = self.request(
            Method::GET,
            &format!("/user/{user_id}/post/{post_id}"),
            Some(session),
        );
        let response = self.expect_json::<PostDto>(&rules::GET_POST, request).await?;
        Ok(response.map(Post::from))
    }

    async fn update_post(
        &self,
        session: &Session,
        user_id: i64,
        post_id: i64,
        text: &str,
    ) -> SpacebookResult<ApiResponse<()>> {
        let request = self
            .request(
                Method::PATCH,
                &format!("/user/{user_id}/post/{post_id}"),
                Some(session),
            )
            .json(&PostTextDto { text });
        self.expect_empty(&rules::UPDATE_POST, request).await
    }

    async fn delete_post(
        &self,
        session: &Session,
        user_id: i64,
        post_id: i64,
    ) -> SpacebookResult<ApiResponse<()>> {
        let request = self.request(
            Method::DELETE,
            &format!("/user/{user_id}/post/{post_id}"),
            Some(session),
        );
        self.expect_empty(&rules::DELETE_POST, request).await
    }

    async fn like_post(
        &self,
        session: &Session,
        user_id: i64,
        post_id: i64,
    ) -> SpacebookResult<ApiResponse<LikeConflict>> {
        let request = self.request(
            Method::POST,
            &format!("/user/{user_id}/post/{post_id}/like"),
            Some(session),
        );
        let conflict = LikeConflict {
            is_already_liked: true,
            is_already_unliked: false,
        };
        self.expect_like(&rules::LIKE_POST, request, conflict).await
    }

    async fn unlike_post(
        &self,
        session: &Session,
        user_id: i64,
        post_id: i64,
    ) -> SpacebookResult<ApiResponse<LikeConflict>> {
        let request = self.request(
            Method::DELETE,
            &format!("/user/{user_id}/post/{post_id}/like"),
            Some(session),
        );
        let conflict = LikeConflict {
            is_already_liked: false,
            is_already_unliked: true,
        };
        self.expect_like(&rules::UNLIKE_POST, request, conflict).await
    }

    async fn get_friends(
        &self,
        session: &Session,
        user_id: i64,
    ) -> SpacebookResult<ApiResponse<Vec<UserSummary>>> {
        let request = self.request(
            Method::GET,
            &format!("/user/{user_id}/friends"),
            Some(session),
        );
        let response = self
            .expect_json::<Vec<ListedUserDto>>(&rules::GET_FRIENDS, request)
            .await?;
        Ok(response.map(|friends| friends.into_iter().map(UserSummary::from).collect()))
    }

    async fn add_friend(
        &self,
        session: &Session,
        user_id: i64,
    ) -> SpacebookResult<ApiResponse<()>> {
        let request = self.request(
            Method::POST,
            &format!("/user/{user_id}/friends"),
            Some(session),
        );
        self.expect_empty(&rules::ADD_FRIEND, request).await
    }

    async fn get_friend_requests(
        &self,
        session: &Session,
    ) -> SpacebookResult<ApiResponse<Vec<UserSummary>>> {
        let request = self.request(Method::GET, "/friendrequests", Some(session));
        let response = self
            .expect_json::<Vec<FriendRequestDto>>(&rules::GET_FRIEND_REQUESTS, request)
            .await?;
        Ok(response.map(|requests| requests.into_iter().map(UserSummary::from).collect()))
    }

    async fn accept_friend_request(
        &self,
        session: &Session,
        user_id: i64,
    ) -> SpacebookResult<ApiResponse<()>> {
        let request = self.request(
            Method::POST,
            &format!("/friendrequests/{user_id}"),
            Some(session),
        );
        self.expect_empty(&rules::ACCEPT_FRIEND_REQUEST, request)
            .await
    }

    async fn decline_friend_request(
        &self,
        session: &Session,
        user_id: i64,
    ) -> SpacebookResult<ApiResponse<()>> {
        let request = self.request(
            Method::DELETE,
            &format!("/friendrequests/{user_id}"),
            Some(session),
        );
        self.expect_empty(&rules::DECLINE_FRIEND_REQUEST, request)
            .await
    }

    async fn search_users(
        &self,
        session: &Session,
        query: &SearchQuery,
    ) -> SpacebookResult<ApiResponse<Vec<UserSummary>>> {
        let params = SearchParams {
            q: &query.query,
            search_in: query.scope.as_query_value(),
            limit: query.limit,
            offset: query.offset,
        };
        let request = self
            .request(Method::GET, "/search", Some(session))
            .query(&params);
        let response = self
            .expect_json::<Vec<ListedUserDto>>(&rules::SEARCH_USERS, request)
            .await?;
        Ok(response.map(|users| users.into_iter().map(UserSummary::from).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_normalizes_slashes() {
        let client = HttpClient::new("http://localhost:3333/api/1.0.0/").expect("client");
        let full = client.endpoint("/user/7/post");
        assert_eq!(full, "http://localhost:3333/api/1.0.0/user/7/post");
    }

    #[test]
    fn post_dto_accepts_rfc3339_timestamp_and_camel_case_likes() {
        let raw = r#"{
            "post_id": 3,
            "text": "hello",
            "timestamp": "2022-02-07T14:29:35.000Z",
            "author": {"user_id": 1, "first_name": "Ash", "last_name": "Ketchum", "email": "ash@mmu.ac.uk"},
            "numLikes": 4
        }"#;

        let post = Post::from(serde_json::from_str::<PostDto>(raw).expect("post should parse"));
        assert_eq!(post.post_id, 3);
        assert_eq!(post.timestamp, 1_644_244_175_000);
        assert_eq!(post.num_likes, 4);
        assert_eq!(post.author.first_name, "Ash");
    }

    #[test]
    fn post_dto_accepts_millisecond_timestamp() {
        let raw = r#"{
            "post_id": 3,
            "text": "hello",
            "timestamp": 1700000000000,
            "author": {"user_id": 1, "first_name": "A", "last_name": "B", "email": "a@b.c"},
            "num_likes": 0
        }"#;

        let post = serde_json::from_str::<PostDto>(raw).expect("post should parse");
        assert_eq!(post.timestamp, 1_700_000_000_000);
    }

    #[test]
    fn post_dto_rejects_garbage_timestamp() {
        let raw = r#"{
            "post_id": 3,
            "text": "hello",
            "timestamp": "yesterday",
            "author": {"user_id": 1, "first_name": "A", "last_name": "B", "email": "a@b.c"},
            "num_likes": 0
        }"#;

        assert!(serde_json::from_str::<PostDto>(raw).is_err());
    }

    #[test]
    fn listed_user_maps_given_and_family_names() {
        let raw = r#"[{"user_id": 5, "user_givenname": "Misty", "user_familyname": "W", "user_email": "m@w.io"}]"#;
        let users: Vec<UserSummary> = serde_json::from_str::<Vec<ListedUserDto>>(raw)
            .expect("friends should parse")
            .into_iter()
            .map(UserSummary::from)
            .collect();

        assert_eq!(users[0].user_id, 5);
        assert_eq!(users[0].first_name, "Misty");
        assert_eq!(users[0].last_name, "W");
    }

    #[test]
    fn update_user_payload_skips_missing_fields() {
        let payload = UpdateUserRequestDto {
            first_name: Some("Brock"),
            last_name: None,
        };
        let json = serde_json::to_string(&payload).expect("serialize");
        assert_eq!(json, r#"{"first_name":"Brock"}"#);
    }
}
