//! In-memory Spacebook backend for engine tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::account::Registration;
use crate::api::SpacebookApi;
use crate::error::{SpacebookError, SpacebookResult, UnreachableKind};
use crate::models::{
    Author, CreatedPost, LikeConflict, LoginResponse, Photo, Post, SearchQuery, Session,
    SignupResponse, User, UserPatch, UserSummary,
};
use crate::response::{ApiResponse, Classified, EndpointRules, FailureKind, rules};

#[derive(Debug, Clone)]
pub(crate) enum Injected {
    Status(StatusCode),
    /// 400 на лайке без флага уточнения в теле.
    ConflictWithoutFlag,
    Unreachable(UnreachableKind),
}

#[derive(Debug, Clone)]
struct FakeUser {
    first_name: String,
    last_name: String,
    email: String,
    password: String,
}

#[derive(Debug, Clone)]
struct FakePost {
    profile_id: i64,
    author_id: i64,
    text: String,
    timestamp: i64,
    likes: HashSet<i64>,
}

#[derive(Debug, Default)]
struct State {
    users: HashMap<i64, FakeUser>,
    tokens: HashMap<String, i64>,
    posts: HashMap<i64, FakePost>,
    friendships: HashSet<(i64, i64)>,
    requests: HashSet<(i64, i64)>,
    photos: HashMap<i64, Photo>,
    next_post_id: i64,
    calls: HashMap<&'static str, usize>,
    created_texts: Vec<String>,
    injections: HashMap<&'static str, VecDeque<Injected>>,
}

type Hook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
pub(crate) struct FakeApi {
    state: Mutex<State>,
    hooks: Mutex<HashMap<&'static str, Hook>>,
}

fn respond<T>(rules: &EndpointRules, status: StatusCode, body: Option<T>) -> ApiResponse<T> {
    match rules.classify(status) {
        Classified::Success(message) => match body {
            Some(body) => ApiResponse::success(message, body),
            None => ApiResponse::success_empty(message),
        },
        Classified::Failure(kind, message) => ApiResponse::failure(kind, message),
    }
}

fn reply<T>(rules: &EndpointRules, status: StatusCode) -> SpacebookResult<ApiResponse<T>> {
    Ok(respond(rules, status, None))
}

impl FakeApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("fake api mutex poisoned")
    }

    pub(crate) fn add_user(&self, id: i64, first: &str, last: &str, email: &str, password: &str) {
        self.state().users.insert(
            id,
            FakeUser {
                first_name: first.to_string(),
                last_name: last.to_string(),
                email: email.to_string(),
                password: password.to_string(),
            },
        );
    }

    /// Создаёт пользователя и сразу выдаёт ему токен `token-{id}`.
    pub(crate) fn signed_in(&self, id: i64) -> Session {
        let email = format!("user{id}@spacebook.test");
        self.add_user(id, &format!("First{id}"), &format!("Last{id}"), &email, "pw");
        let token = format!("token-{id}");
        self.state().tokens.insert(token.clone(), id);
        Session::new(id, token)
    }

    pub(crate) fn befriend(&self, a: i64, b: i64) {
        let mut state = self.state();
        state.friendships.insert((a, b));
        state.friendships.insert((b, a));
    }

    pub(crate) fn request_friendship(&self, from: i64, to: i64) {
        self.state().requests.insert((from, to));
    }

    pub(crate) fn seed_post(&self, profile_id: i64, author_id: i64, text: &str) -> i64 {
        let mut state = self.state();
        state.next_post_id += 1;
        let post_id = state.next_post_id;
        state.posts.insert(
            post_id,
            FakePost {
                profile_id,
                author_id,
                text: text.to_string(),
                timestamp: 1_700_000_000_000 + post_id,
                likes: HashSet::new(),
            },
        );
        post_id
    }

    pub(crate) fn like_directly(&self, post_id: i64, user_id: i64) {
        if let Some(post) = self.state().posts.get_mut(&post_id) {
            post.likes.insert(user_id);
        }
    }

    pub(crate) fn num_likes(&self, post_id: i64) -> usize {
        self.state()
            .posts
            .get(&post_id)
            .map(|post| post.likes.len())
            .unwrap_or(0)
    }

    pub(crate) fn calls(&self, op: &'static str) -> usize {
        self.state().calls.get(op).copied().unwrap_or(0)
    }

    pub(crate) fn created_texts(&self) -> Vec<String> {
        self.state().created_texts.clone()
    }

    pub(crate) fn inject(&self, op: &'static str, injected: Injected) {
        self.state()
            .injections
            .entry(op)
            .or_default()
            .push_back(injected);
    }

    /// Выполняет `hook` при следующем вызове `op`, до ответа сервера.
    pub(crate) fn before(&self, op: &'static str, hook: impl FnOnce() + Send + 'static) {
        self.hooks
            .lock()
            .expect("fake api hooks poisoned")
            .insert(op, Box::new(hook));
    }

    /// Считает вызов, возвращает подменённый результат, если он задан,
    /// иначе идентификатор пользователя по токену.
    fn enter<T>(
        &self,
        op: &'static str,
        rules: &EndpointRules,
        session: Option<&Session>,
    ) -> Result<Option<i64>, SpacebookResult<ApiResponse<T>>> {
        let hook = self
            .hooks
            .lock()
            .expect("fake api hooks poisoned")
            .remove(op);
        if let Some(hook) = hook {
            hook();
        }

        let mut state = self.state();
        *state.calls.entry(op).or_default() += 1;

        if let Some(injected) = state.injections.get_mut(op).and_then(VecDeque::pop_front) {
            return Err(match injected {
                Injected::Status(status) => Ok(respond(rules, status, None)),
                Injected::ConflictWithoutFlag => {
                    Ok(ApiResponse::failure(FailureKind::Conflict, "conflict"))
                }
                Injected::Unreachable(kind) => Err(SpacebookError::Unreachable {
                    kind,
                    message: "injected transport failure".to_string(),
                }),
            });
        }

        match session {
            None => Ok(None),
            Some(session) => match state.tokens.get(&session.session_token) {
                Some(user_id) => Ok(Some(*user_id)),
                None => Err(Ok(respond(rules, StatusCode::UNAUTHORIZED, None))),
            },
        }
    }

    fn are_friends(state: &State, a: i64, b: i64) -> bool {
        a == b || state.friendships.contains(&(a, b))
    }

    fn to_post(state: &State, post_id: i64, post: &FakePost) -> Post {
        let author = state.users.get(&post.author_id);
        Post {
            post_id,
            text: post.text.clone(),
            timestamp: post.timestamp,
            author: Author {
                user_id: post.author_id,
                first_name: author.map(|u| u.first_name.clone()).unwrap_or_default(),
                last_name: author.map(|u| u.last_name.clone()).unwrap_or_default(),
                email: author.map(|u| u.email.clone()).unwrap_or_default(),
            },
            num_likes: post.likes.len() as i64,
        }
    }

    fn summary(state: &State, user_id: i64) -> Option<UserSummary> {
        state.users.get(&user_id).map(|user| UserSummary {
            user_id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
        })
    }
}

macro_rules! enter {
    ($self:ident, $op:literal, $rules:expr, $session:expr) => {
        match $self.enter($op, &$rules, $session) {
            Ok(viewer) => viewer,
            Err(early) => return early,
        }
    };
}

#[async_trait]
impl SpacebookApi for FakeApi {
    async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> SpacebookResult<ApiResponse<LoginResponse>> {
        enter!(self, "login", rules::LOGIN, None);
        let mut state = self.state();
        let found = state
            .users
            .iter()
            .find(|(_, user)| user.email == email && user.password == password)
            .map(|(id, _)| *id);

        let Some(id) = found else {
            return reply(&rules::LOGIN, StatusCode::BAD_REQUEST);
        };
        let token = format!("token-{id}");
        state.tokens.insert(token.clone(), id);
        Ok(respond(
            &rules::LOGIN,
            StatusCode::OK,
            Some(LoginResponse { id, token }),
        ))
    }

    async fn signup(
        &self,
        registration: &Registration,
    ) -> SpacebookResult<ApiResponse<SignupResponse>> {
        enter!(self, "signup", rules::SIGNUP, None);
        let id = {
            let state = self.state();
            if state.users.values().any(|u| u.email == registration.email()) {
                return reply(&rules::SIGNUP, StatusCode::BAD_REQUEST);
            }
            state.users.keys().max().copied().unwrap_or(0) + 1
        };
        self.add_user(
            id,
            registration.first_name(),
            registration.last_name(),
            registration.email(),
            registration.password(),
        );
        Ok(respond(
            &rules::SIGNUP,
            StatusCode::CREATED,
            Some(SignupResponse { id }),
        ))
    }

    async fn logout(&self, session: &Session) -> SpacebookResult<ApiResponse<()>> {
        enter!(self, "logout", rules::LOGOUT, Some(session));
        self.state().tokens.remove(&session.session_token);
        reply(&rules::LOGOUT, StatusCode::OK)
    }

    async fn get_user(
        &self,
        session: &Session,
        user_id: i64,
    ) -> SpacebookResult<ApiResponse<User>> {
        enter!(self, "get_user", rules::GET_USER, Some(session));
        let state = self.state();
        let Some(user) = state.users.get(&user_id) else {
            return reply(&rules::GET_USER, StatusCode::NOT_FOUND);
        };
        let friend_count = state
            .friendships
            .iter()
            .filter(|(a, _)| *a == user_id)
            .count() as i64;
        Ok(respond(
            &rules::GET_USER,
            StatusCode::OK,
            Some(User {
                user_id,
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
                email: user.email.clone(),
                friend_count,
            }),
        ))
    }

    async fn update_user(
        &self,
        session: &Session,
        user_id: i64,
        patch: &UserPatch,
    ) -> SpacebookResult<ApiResponse<()>> {
        let viewer = enter!(self, "update_user", rules::UPDATE_USER, Some(session));
        if viewer != Some(user_id) {
            return reply(&rules::UPDATE_USER, StatusCode::FORBIDDEN);
        }
        let mut state = self.state();
        let Some(user) = state.users.get_mut(&user_id) else {
            return reply(&rules::UPDATE_USER, StatusCode::NOT_FOUND);
        };
        if let Some(first_name) = &patch.first_name {
            user.first_name = first_name.clone();
        }
        if let Some(last_name) = &patch.last_name {
            user.last_name = last_name.clone();
        }
        reply(&rules::UPDATE_USER, StatusCode::OK)
    }

    async fn get_profile_photo(
        &self,
        session: &Session,
        user_id: i64,
    ) -> SpacebookResult<ApiResponse<Photo>> {
        enter!(self, "get_profile_photo", rules::GET_PHOTO, Some(session));
        let photo = self.state().photos.get(&user_id).cloned();
        match photo {
            Some(photo) => Ok(respond(&rules::GET_PHOTO, StatusCode::OK, Some(photo))),
            None => reply(&rules::GET_PHOTO, StatusCode::NOT_FOUND),
        }
    }

    async fn upload_profile_photo(
        &self,
        session: &Session,
        user_id: i64,
        photo: &Photo,
    ) -> SpacebookResult<ApiResponse<()>> {
        enter!(self, "upload_profile_photo", rules::UPLOAD_PHOTO, Some(session));
        self.state().photos.insert(user_id, photo.clone());
        reply(&rules::UPLOAD_PHOTO, StatusCode::OK)
    }

    async fn get_posts(
        &self,
        session: &Session,
        user_id: i64,
    ) -> SpacebookResult<ApiResponse<Vec<Post>>> {
        let viewer = enter!(self, "get_posts", rules::GET_POSTS, Some(session)).unwrap_or(0);
        let state = self.state();
        if !Self::are_friends(&state, viewer, user_id) {
            return reply(&rules::GET_POSTS, StatusCode::FORBIDDEN);
        }

        let mut posts: Vec<Post> = state
            .posts
            .iter()
            .filter(|(_, post)| post.profile_id == user_id)
            .map(|(id, post)| Self::to_post(&state, *id, post))
            .collect();
        posts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(respond(&rules::GET_POSTS, StatusCode::OK, Some(posts)))
    }

    async fn create_post(
        &self,
        session: &Session,
        user_id: i64,
        text: &str,
    ) -> SpacebookResult<ApiResponse<CreatedPost>> {
        let viewer = enter!(self, "create_post", rules::CREATE_POST, Some(session)).unwrap_or(0);
        if !self.state().users.contains_key(&user_id) {
            return reply(&rules::CREATE_POST, StatusCode::NOT_FOUND);
        }
        let post_id = self.seed_post(user_id, viewer, text);
        self.state().created_texts.push(text.to_string());
        Ok(respond(
            &rules::CREATE_POST,
            StatusCode::CREATED,
            Some(CreatedPost { post_id }),
        ))
    }

    async fn get_post(
        &self,
        session: &Session,
        user_id: i64,
        post_id: i64,
    ) -> SpacebookResult<ApiResponse<Post>> {
        let viewer = enter!(self, "get_post", rules::GET_POST, Some(session)).unwrap_or(0);
        let state = self.state();
        if !Self::are_friends(&state, viewer, user_id) {
            return reply(&rules::GET_POST, StatusCode::FORBIDDEN);
        }
        match state.posts.get(&post_id) {
            Some(post) if post.profile_id == user_id => Ok(respond(
                &rules::GET_POST,
                StatusCode::OK,
                Some(Self::to_post(&state, post_id, post)),
            )),
            _ => reply(&rules::GET_POST, StatusCode::NOT_FOUND),
        }
    }

    async fn update_post(
        &self,
        session: &Session,
        user_id: i64,
        post_id: i64,
        text: &str,
    ) -> SpacebookResult<ApiResponse<()>> {
        let viewer = enter!(self, "update_post", rules::UPDATE_POST, Some(session)).unwrap_or(0);
        let mut state = self.state();
        let Some(post) = state.posts.get_mut(&post_id).filter(|p| p.profile_id == user_id) else {
            return reply(&rules::UPDATE_POST, StatusCode::NOT_FOUND);
        };
        if post.author_id != viewer {
            return reply(&rules::UPDATE_POST, StatusCode::FORBIDDEN);
        }
        post.text = text.to_string();
        reply(&rules::UPDATE_POST, StatusCode::OK)
    }

    async fn delete_post(
        &self,
        session: &Session,
        user_id: i64,
        post_id: i64,
    ) -> SpacebookResult<ApiResponse<()>> {
        let viewer = enter!(self, "delete_post", rules::DELETE_POST, Some(session)).unwrap_or(0);
        let mut state = self.state();
        let author = match state.posts.get(&post_id) {
            Some(post) if post.profile_id == user_id => post.author_id,
            _ => return reply(&rules::DELETE_POST, StatusCode::NOT_FOUND),
        };
        if author != viewer {
            return reply(&rules::DELETE_POST, StatusCode::FORBIDDEN);
        }
        state.posts.remove(&post_id);
        reply(&rules::DELETE_POST, StatusCode::OK)
    }

    async fn like_post(
        &self,
        session: &Session,
        user_id: i64,
        post_id: i64,
    ) -> SpacebookResult<ApiResponse<LikeConflict>> {
        let viewer = enter!(self, "like_post", rules::LIKE_POST, Some(session)).unwrap_or(0);
        let mut state = self.state();
        let allowed = Self::are_friends(&state, viewer, user_id);
        let Some(post) = state.posts.get_mut(&post_id).filter(|p| p.profile_id == user_id) else {
            return reply(&rules::LIKE_POST, StatusCode::NOT_FOUND);
        };
        if post.author_id == viewer || !allowed {
            return reply(&rules::LIKE_POST, StatusCode::FORBIDDEN);
        }
        if !post.likes.insert(viewer) {
            let response: ApiResponse<LikeConflict> =
                respond(&rules::LIKE_POST, StatusCode::BAD_REQUEST, None);
            return Ok(response.with_body(LikeConflict {
                is_already_liked: true,
                is_already_unliked: false,
            }));
        }
        reply(&rules::LIKE_POST, StatusCode::OK)
    }

    async fn unlike_post(
        &self,
        session: &Session,
        user_id: i64,
        post_id: i64,
    ) -> SpacebookResult<ApiResponse<LikeConflict>> {
        let viewer = enter!(self, "unlike_post", rules::UNLIKE_POST, Some(session)).unwrap_or(0);
        let mut state = self.state();
        let Some(post) = state.posts.get_mut(&post_id).filter(|p| p.profile_id == user_id) else {
            return reply(&rules::UNLIKE_POST, StatusCode::NOT_FOUND);
        };
        if !post.likes.remove(&viewer) {
            let response: ApiResponse<LikeConflict> =
                respond(&rules::UNLIKE_POST, StatusCode::BAD_REQUEST, None);
            return Ok(response.with_body(LikeConflict {
                is_already_liked: false,
                is_already_unliked: true,
            }));
        }
        reply(&rules::UNLIKE_POST, StatusCode::OK)
    }

    async fn get_friends(
        &self,
        session: &Session,
        user_id: i64,
    ) -> SpacebookResult<ApiResponse<Vec<UserSummary>>> {
        enter!(self, "get_friends", rules::GET_FRIENDS, Some(session));
        let state = self.state();
        let mut friends: Vec<UserSummary> = state
            .friendships
            .iter()
            .filter(|(a, _)| *a == user_id)
            .filter_map(|(_, b)| Self::summary(&state, *b))
            .collect();
        friends.sort_by_key(|user| user.user_id);
        Ok(respond(&rules::GET_FRIENDS, StatusCode::OK, Some(friends)))
    }

    async fn add_friend(
        &self,
        session: &Session,
        user_id: i64,
    ) -> SpacebookResult<ApiResponse<()>> {
        let viewer = enter!(self, "add_friend", rules::ADD_FRIEND, Some(session)).unwrap_or(0);
        let mut state = self.state();
        if !state.users.contains_key(&user_id) {
            return reply(&rules::ADD_FRIEND, StatusCode::NOT_FOUND);
        }
        if Self::are_friends(&state, viewer, user_id) {
            return reply(&rules::ADD_FRIEND, StatusCode::FORBIDDEN);
        }
        state.requests.insert((viewer, user_id));
        reply(&rules::ADD_FRIEND, StatusCode::CREATED)
    }

    async fn get_friend_requests(
        &self,
        session: &Session,
    ) -> SpacebookResult<ApiResponse<Vec<UserSummary>>> {
        let viewer = enter!(
            self,
            "get_friend_requests",
            rules::GET_FRIEND_REQUESTS,
            Some(session)
        )
        .unwrap_or(0);
        let state = self.state();
        let mut requests: Vec<UserSummary> = state
            .requests
            .iter()
            .filter(|(_, to)| *to == viewer)
            .filter_map(|(from, _)| Self::summary(&state, *from))
            .collect();
        requests.sort_by_key(|user| user.user_id);
        Ok(respond(
            &rules::GET_FRIEND_REQUESTS,
            StatusCode::OK,
            Some(requests),
        ))
    }

    async fn accept_friend_request(
        &self,
        session: &Session,
        user_id: i64,
    ) -> SpacebookResult<ApiResponse<()>> {
        let viewer = enter!(
            self,
            "accept_friend_request",
            rules::ACCEPT_FRIEND_REQUEST,
            Some(session)
        )
        .unwrap_or(0);
        let mut state = self.state();
        if !state.requests.remove(&(user_id, viewer)) {
            return reply(&rules::ACCEPT_FRIEND_REQUEST, StatusCode::NOT_FOUND);
        }
        state.friendships.insert((user_id, viewer));
        state.friendships.insert((viewer, user_id));
        reply(&rules::ACCEPT_FRIEND_REQUEST, StatusCode::OK)
    }

    async fn decline_friend_request(
        &self,
        session: &Session,
        user_id: i64,
    ) -> SpacebookResult<ApiResponse<()>> {
        let viewer = enter!(
            self,
            "decline_friend_request",
            rules::DECLINE_FRIEND_REQUEST,
            Some(session)
        )
        .unwrap_or(0);
        if !self.state().requests.remove(&(user_id, viewer)) {
            return reply(&rules::DECLINE_FRIEND_REQUEST, StatusCode::NOT_FOUND);
        }
        reply(&rules::DECLINE_FRIEND_REQUEST, StatusCode::OK)
    }

    async fn search_users(
        &self,
        session: &Session,
        query: &SearchQuery,
    ) -> SpacebookResult<ApiResponse<Vec<UserSummary>>> {
        enter!(self, "search_users", rules::SEARCH_USERS, Some(session));
        let state = self.state();
        let needle = query.query.to_lowercase();
        let mut users: Vec<UserSummary> = state
            .users
            .keys()
            .filter_map(|id| Self::summary(&state, *id))
            .filter(|user| {
                user.first_name.to_lowercase().contains(&needle)
                    || user.last_name.to_lowercase().contains(&needle)
            })
            .collect();
        users.sort_by_key(|user| user.user_id);
        let users = users
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect();
        Ok(respond(&rules::SEARCH_USERS, StatusCode::OK, Some(users)))
    }
}
