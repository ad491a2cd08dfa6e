use thiserror::Error;

use crate::storage::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Причина недоступности сервера.
pub enum UnreachableKind {
    /// Соединение не установлено (DNS, отказ в соединении): запрос точно
    /// не дошёл до сервера.
    Connect,
    /// Таймаут: сервер мог успеть обработать запрос.
    Timeout,
    /// Прочие сбои транспорта.
    Other,
}

#[derive(Debug, Error)]
/// Ошибки клиентской библиотеки `spacebook-client`.
///
/// Ожидаемые HTTP-ответы (400/401/403/404/500) сюда не попадают: они
/// нормализуются в [`crate::ApiResponse`].
pub enum SpacebookError {
    /// Сервер недоступен. Это не отрицательный ответ сервера.
    #[error("server unreachable ({kind:?}): {message}")]
    Unreachable {
        /// Причина.
        kind: UnreachableKind,
        /// Текст исходной ошибки транспорта.
        message: String,
    },

    /// Успешный статус, но тело ответа не совпадает с ожидаемой схемой.
    #[error("failed to decode response of {endpoint}: {message}")]
    Decode {
        /// Имя операции, для которой декодировался ответ.
        endpoint: &'static str,
        /// Текст ошибки декодирования.
        message: String,
    },

    /// Некорректный запрос, отклонённый ещё на стороне клиента.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Ошибка локального хранилища.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Результат операций `spacebook-client`.
pub type SpacebookResult<T> = Result<T, SpacebookError>;

impl SpacebookError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_builder() {
            return Self::InvalidRequest(err.to_string());
        }
        if err.is_decode() {
            return Self::Decode {
                endpoint: "unknown",
                message: err.to_string(),
            };
        }

        let kind = if err.is_timeout() {
            UnreachableKind::Timeout
        } else if err.is_connect() {
            UnreachableKind::Connect
        } else {
            UnreachableKind::Other
        };
        Self::Unreachable {
            kind,
            message: err.to_string(),
        }
    }

    /// Запрос оборвался по таймауту, и сервер мог успеть его обработать.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Unreachable {
                kind: UnreachableKind::Timeout,
                ..
            }
        )
    }

    /// Сервер недоступен (в отличие от отрицательного ответа сервера).
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_unreachable_and_ambiguous() {
        let err = SpacebookError::Unreachable {
            kind: UnreachableKind::Timeout,
            message: "operation timed out".to_string(),
        };
        assert!(err.is_unreachable());
        assert!(err.is_timeout());
    }

    #[test]
    fn connect_failure_is_not_timeout() {
        let err = SpacebookError::Unreachable {
            kind: UnreachableKind::Connect,
            message: "connection refused".to_string(),
        };
        assert!(err.is_unreachable());
        assert!(!err.is_timeout());
    }

    #[test]
    fn storage_error_is_not_unreachable() {
        let err = SpacebookError::from(StoreError::Locked("drafts".to_string()));
        assert!(!err.is_unreachable());
    }
}
