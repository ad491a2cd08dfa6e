use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Класс неуспешного ответа сервера.
pub enum FailureKind {
    /// 401: токен сессии отсутствует или истёк.
    Unauthorized,
    /// 403: запрос корректен, но запрещён бизнес-правилами.
    Forbidden,
    /// 404: сущность не найдена.
    NotFound,
    /// 400 без флага уточнения.
    BadRequest,
    /// 400 с флагом уточнения (например, пост уже лайкнут).
    Conflict,
    /// 500.
    Server,
    /// Любой код, не описанный для операции.
    Unexpected,
}

impl FailureKind {
    /// Требуется повторная аутентификация.
    pub fn requires_reauth(self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Единый результат одного сетевого вызова.
///
/// `ok == true` означает, что `body` имеет документированную для операции
/// форму (или отсутствует, если операция тела не возвращает).
/// `ok == false` означает, что `body` пуст или несёт узкий флаг уточнения.
pub struct ApiResponse<T> {
    /// Признак успеха.
    pub ok: bool,
    /// Сообщение для пользователя.
    pub message: String,
    /// Тело ответа.
    pub body: Option<T>,
    /// Класс ошибки, если `ok == false`.
    pub failure: Option<FailureKind>,
}

impl<T> ApiResponse<T> {
    /// Успешный ответ с телом.
    pub fn success(message: impl Into<String>, body: T) -> Self {
        Self {
            ok: true,
            message: message.into(),
            body: Some(body),
            failure: None,
        }
    }

    /// Успешный ответ без тела.
    pub fn success_empty(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
            body: None,
            failure: None,
        }
    }

    /// Неуспешный ответ без тела.
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            body: None,
            failure: Some(kind),
        }
    }

    /// Подменяет тело ответа, сохраняя признак успеха и сообщение.
    pub fn with_body(mut self, body: T) -> Self {
        self.body = Some(body);
        self
    }

    /// Преобразует тело ответа.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            ok: self.ok,
            message: self.message,
            body: self.body.map(f),
            failure: self.failure,
        }
    }

    /// Отбрасывает тело, оставляя признак успеха и сообщение.
    pub fn discard_body<U>(self) -> ApiResponse<U> {
        ApiResponse {
            ok: self.ok,
            message: self.message,
            body: None,
            failure: self.failure,
        }
    }

    /// Ответ требует повторной аутентификации.
    pub fn is_unauthorized(&self) -> bool {
        self.failure.is_some_and(FailureKind::requires_reauth)
    }
}

/// Таблица статусов одной операции REST API.
///
/// Один и тот же код означает разное на разных эндпоинтах (403 на ленте
/// постов - "не друг", 403 на лайке - "нельзя лайкать"), поэтому разбор
/// статуса всегда идёт по таблице конкретной операции.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EndpointRules {
    pub(crate) name: &'static str,
    pub(crate) success: StatusCode,
    pub(crate) success_message: &'static str,
    pub(crate) failures: &'static [(StatusCode, FailureKind, &'static str)],
}

const UNEXPECTED_MESSAGE: &str = "something went wrong.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Classified {
    Success(&'static str),
    Failure(FailureKind, &'static str),
}

impl EndpointRules {
    pub(crate) fn classify(&self, status: StatusCode) -> Classified {
        if status == self.success {
            return Classified::Success(self.success_message);
        }

        self.failures
            .iter()
            .find(|(code, _, _)| *code == status)
            .map(|(_, kind, message)| Classified::Failure(*kind, message))
            .unwrap_or(Classified::Failure(
                FailureKind::Unexpected,
                UNEXPECTED_MESSAGE,
            ))
    }
}

pub(crate) mod rules {
    use reqwest::StatusCode;

    use super::EndpointRules;
    use super::FailureKind::{BadRequest, Conflict, Forbidden, NotFound, Server, Unauthorized};

    const NOT_AUTHORISED: &str = "not authorised to perform this action.";
    const SERVER_ERROR: &str = "the server failed to handle this request.";

    pub(crate) const LOGIN: EndpointRules = EndpointRules {
        name: "login",
        success: StatusCode::OK,
        success_message: "successful login.",
        failures: &[
            (StatusCode::BAD_REQUEST, BadRequest, "invalid email or password."),
            (StatusCode::INTERNAL_SERVER_ERROR, Server, SERVER_ERROR),
        ],
    };

    pub(crate) const SIGNUP: EndpointRules = EndpointRules {
        name: "signup",
        success: StatusCode::CREATED,
        success_message: "successful signup.",
        failures: &[
            (StatusCode::BAD_REQUEST, BadRequest, "invalid registration details."),
            (StatusCode::INTERNAL_SERVER_ERROR, Server, SERVER_ERROR),
        ],
    };

    pub(crate) const LOGOUT: EndpointRules = EndpointRules {
        name: "logout",
        success: StatusCode::OK,
        success_message: "successful logout.",
        failures: &[
            (StatusCode::UNAUTHORIZED, Unauthorized, NOT_AUTHORISED),
            (StatusCode::INTERNAL_SERVER_ERROR, Server, SERVER_ERROR),
        ],
    };

    pub(crate) const GET_USER: EndpointRules = EndpointRules {
        name: "get_user",
        success: StatusCode::OK,
        success_message: "got user data.",
        failures: &[
            (StatusCode::UNAUTHORIZED, Unauthorized, NOT_AUTHORISED),
            (StatusCode::NOT_FOUND, NotFound, "no user data found."),
            (StatusCode::INTERNAL_SERVER_ERROR, Server, SERVER_ERROR),
        ],
    };

    pub(crate) const UPDATE_USER: EndpointRules = EndpointRules {
        name: "update_user",
        success: StatusCode::OK,
        success_message: "updated user.",
        failures: &[
            (StatusCode::BAD_REQUEST, BadRequest, "invalid data to update user."),
            (StatusCode::UNAUTHORIZED, Unauthorized, NOT_AUTHORISED),
            (StatusCode::FORBIDDEN, Forbidden, "only able to update your own profile."),
            (StatusCode::NOT_FOUND, NotFound, "no user data found."),
            (StatusCode::INTERNAL_SERVER_ERROR, Server, SERVER_ERROR),
        ],
    };

    pub(crate) const GET_PHOTO: EndpointRules = EndpointRules {
        name: "get_profile_photo",
        success: StatusCode::OK,
        success_message: "got user profile picture.",
        failures: &[
            (StatusCode::UNAUTHORIZED, Unauthorized, NOT_AUTHORISED),
            (StatusCode::NOT_FOUND, NotFound, "no user / profile picture found."),
            (StatusCode::INTERNAL_SERVER_ERROR, Server, SERVER_ERROR),
        ],
    };

    pub(crate) const UPLOAD_PHOTO: EndpointRules = EndpointRules {
        name: "upload_profile_photo",
        success: StatusCode::OK,
        success_message: "uploaded profile picture.",
        failures: &[
            (StatusCode::BAD_REQUEST, BadRequest, "invalid data to upload profile picture."),
            (StatusCode::UNAUTHORIZED, Unauthorized, NOT_AUTHORISED),
            (StatusCode::NOT_FOUND, NotFound, "no user / profile picture found."),
            (StatusCode::INTERNAL_SERVER_ERROR, Server, SERVER_ERROR),
        ],
    };

    pub(crate) const GET_POSTS: EndpointRules = EndpointRules {
        name: "get_posts",
        success: StatusCode::OK,
        success_message: "got posts.",
        failures: &[
            (StatusCode::UNAUTHORIZED, Unauthorized, NOT_AUTHORISED),
            (
                StatusCode::FORBIDDEN,
                Forbidden,
                "can only view the posts of yourself or your friends.",
            ),
            (StatusCode::NOT_FOUND, NotFound, "no posts found."),
            (StatusCode::INTERNAL_SERVER_ERROR, Server, SERVER_ERROR),
        ],
    };

    pub(crate) const CREATE_POST: EndpointRules = EndpointRules {
        name: "create_post",
        success: StatusCode::CREATED,
        success_message: "created a post.",
        failures: &[
            (StatusCode::UNAUTHORIZED, Unauthorized, NOT_AUTHORISED),
            (StatusCode::NOT_FOUND, NotFound, "no user data found."),
            (StatusCode::INTERNAL_SERVER_ERROR, Server, SERVER_ERROR),
        ],
    };

    pub(crate) const GET_POST: EndpointRules = EndpointRules {
        name: "get_post",
        success: StatusCode::OK,
        success_message: "got post.",
        failures: &[
            (StatusCode::UNAUTHORIZED, Unauthorized, NOT_AUTHORISED),
            (
                StatusCode::FORBIDDEN,
                Forbidden,
                "can only view the posts of yourself or your friends.",
            ),
            (StatusCode::NOT_FOUND, NotFound, "no post found."),
            (StatusCode::INTERNAL_SERVER_ERROR, Server, SERVER_ERROR),
        ],
    };

    pub(crate) const UPDATE_POST: EndpointRules = EndpointRules {
        name: "update_post",
        success: StatusCode::OK,
        success_message: "updated post.",
        failures: &[
            (StatusCode::BAD_REQUEST, BadRequest, "invalid data to update post."),
            (StatusCode::UNAUTHORIZED, Unauthorized, NOT_AUTHORISED),
            (StatusCode::FORBIDDEN, Forbidden, "you can only update your own posts."),
            (StatusCode::NOT_FOUND, NotFound, "no post found."),
            (StatusCode::INTERNAL_SERVER_ERROR, Server, SERVER_ERROR),
        ],
    };

    pub(crate) const DELETE_POST: EndpointRules = EndpointRules {
        name: "delete_post",
        success: StatusCode::OK,
        success_message: "deleted post.",
        failures: &[
            (StatusCode::UNAUTHORIZED, Unauthorized, NOT_AUTHORISED),
            (StatusCode::FORBIDDEN, Forbidden, "you can only delete your own posts."),
            (StatusCode::NOT_FOUND, NotFound, "no post found."),
            (StatusCode::INTERNAL_SERVER_ERROR, Server, SERVER_ERROR),
        ],
    };

    pub(crate) const LIKE_POST: EndpointRules = EndpointRules {
        name: "like_post",
        success: StatusCode::OK,
        success_message: "liked post.",
        failures: &[
            (StatusCode::BAD_REQUEST, Conflict, "this post has already been liked."),
            (StatusCode::UNAUTHORIZED, Unauthorized, NOT_AUTHORISED),
            (StatusCode::FORBIDDEN, Forbidden, "can only like friends posts."),
            (StatusCode::NOT_FOUND, NotFound, "no post found."),
            (StatusCode::INTERNAL_SERVER_ERROR, Server, SERVER_ERROR),
        ],
    };

    pub(crate) const UNLIKE_POST: EndpointRules = EndpointRules {
        name: "unlike_post",
        success: StatusCode::OK,
        success_message: "unliked post.",
        failures: &[
            (StatusCode::BAD_REQUEST, Conflict, "this post has already been unliked."),
            (StatusCode::UNAUTHORIZED, Unauthorized, NOT_AUTHORISED),
            (StatusCode::FORBIDDEN, Forbidden, "can only unlike friends posts."),
            (StatusCode::NOT_FOUND, NotFound, "no post found."),
            (StatusCode::INTERNAL_SERVER_ERROR, Server, SERVER_ERROR),
        ],
    };

    pub(crate) const GET_FRIENDS: EndpointRules = EndpointRules {
        name: "get_friends",
        success: StatusCode::OK,
        success_message: "got friends.",
        failures: &[
            (StatusCode::UNAUTHORIZED, Unauthorized, NOT_AUTHORISED),
            (
                StatusCode::FORBIDDEN,
                Forbidden,
                "can only view friends of yourself or friends.",
            ),
            (StatusCode::NOT_FOUND, NotFound, "no user / friends found."),
            (StatusCode::INTERNAL_SERVER_ERROR, Server, SERVER_ERROR),
        ],
    };

    pub(crate) const ADD_FRIEND: EndpointRules = EndpointRules {
        name: "add_friend",
        success: StatusCode::CREATED,
        success_message: "sent friend request.",
        failures: &[
            (StatusCode::UNAUTHORIZED, Unauthorized, NOT_AUTHORISED),
            (StatusCode::FORBIDDEN, Forbidden, "user is already added as a friend."),
            (StatusCode::NOT_FOUND, NotFound, "no user found."),
            (StatusCode::INTERNAL_SERVER_ERROR, Server, SERVER_ERROR),
        ],
    };

    pub(crate) const GET_FRIEND_REQUESTS: EndpointRules = EndpointRules {
        name: "get_friend_requests",
        success: StatusCode::OK,
        success_message: "got friend requests.",
        failures: &[
            (StatusCode::UNAUTHORIZED, Unauthorized, NOT_AUTHORISED),
            (StatusCode::INTERNAL_SERVER_ERROR, Server, SERVER_ERROR),
        ],
    };

    pub(crate) const ACCEPT_FRIEND_REQUEST: EndpointRules = EndpointRules {
        name: "accept_friend_request",
        success: StatusCode::OK,
        success_message: "accepted friend request.",
        failures: &[
            (StatusCode::UNAUTHORIZED, Unauthorized, NOT_AUTHORISED),
            (StatusCode::NOT_FOUND, NotFound, "user not found."),
            (StatusCode::INTERNAL_SERVER_ERROR, Server, SERVER_ERROR),
        ],
    };

    pub(crate) const DECLINE_FRIEND_REQUEST: EndpointRules = EndpointRules {
        name: "decline_friend_request",
        success: StatusCode::OK,
        success_message: "declined friend request.",
        failures: &[
            (StatusCode::UNAUTHORIZED, Unauthorized, NOT_AUTHORISED),
            (StatusCode::NOT_FOUND, NotFound, "user not found."),
            (StatusCode::INTERNAL_SERVER_ERROR, Server, SERVER_ERROR),
        ],
    };

    pub(crate) const SEARCH_USERS: EndpointRules = EndpointRules {
        name: "search_users",
        success: StatusCode::OK,
        success_message: "got results.",
        failures: &[
            (StatusCode::BAD_REQUEST, BadRequest, "invalid data to perform search."),
            (StatusCode::UNAUTHORIZED, Unauthorized, NOT_AUTHORISED),
            (StatusCode::INTERNAL_SERVER_ERROR, Server, SERVER_ERROR),
        ],
    };
}
