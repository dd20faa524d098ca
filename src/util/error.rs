use rocket::http::{ContentType, Status};
use rocket::response::Responder;
use rocket::{Request, Response};
use std::io::Cursor;
use thiserror::Error;

/// Stable-over-the-wire error taxonomy. Internal causes are richer (see the
/// `Internal` variant's payload) but every variant the API can return maps
/// to exactly one of these.
#[derive(Debug, Error, Clone)]
pub enum AppError {
    #[error("player not found in leaderboard")]
    PlayerNotFound,
    #[error("leaderboard not found")]
    LeaderboardNotFound,
    #[error("leaderboard already exists")]
    LeaderboardAlreadyExists,
    #[error("invalid score")]
    InvalidScore,
    #[error("invalid leaderboard")]
    InvalidLeaderboard(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("rate limited")]
    RateLimited,
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> Status {
        match self {
            AppError::PlayerNotFound | AppError::LeaderboardNotFound => Status::NotFound,
            AppError::LeaderboardAlreadyExists => Status::Conflict,
            AppError::InvalidScore | AppError::InvalidLeaderboard(_) | AppError::InvalidRequest(_) => {
                Status::BadRequest
            }
            AppError::RateLimited => Status::TooManyRequests,
            AppError::Internal(_) => Status::InternalServerError,
        }
    }
}

/// Rocket responder translating an `AppError` into the `{success:false,
/// error}` envelope.
pub struct ApiErrorResponder {
    pub error: AppError,
}

impl From<AppError> for ApiErrorResponder {
    fn from(error: AppError) -> Self {
        ApiErrorResponder { error }
    }
}

impl ApiErrorResponder {
    pub fn leaderboard_not_found() -> Self {
        AppError::LeaderboardNotFound.into()
    }

    pub fn leaderboard_already_exists() -> Self {
        AppError::LeaderboardAlreadyExists.into()
    }

    pub fn player_not_found() -> Self {
        AppError::PlayerNotFound.into()
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        AppError::InvalidRequest(message.into()).into()
    }
}

impl<'r> Responder<'r, 'static> for ApiErrorResponder {
    fn respond_to(self, _request: &'r Request<'_>) -> rocket::response::Result<'static> {
        let body = serde_json::json!({
            "success": false,
            "error": self.error.to_string(),
        })
        .to_string();

        Response::build()
            .status(self.error.status())
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}
