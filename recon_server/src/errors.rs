use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use recon_engine::ReconciliationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("{0}")]
    Reconciliation(#[from] ReconciliationError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingActor => StatusCode::UNAUTHORIZED,
                AuthError::InvalidActor(_) => StatusCode::UNAUTHORIZED,
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            },
            Self::Reconciliation(e) => reconciliation_status(e),
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

fn reconciliation_status(e: &ReconciliationError) -> StatusCode {
    use ReconciliationError::*;
    match e {
        SignatureInvalid => StatusCode::UNAUTHORIZED,
        OrderNotFound(_) | ShipmentNotFound(_) | DiscrepancyNotFound(_) => StatusCode::NOT_FOUND,
        ConflictingStateTransition { .. } | ForbiddenTransition { .. } | ConcurrentModification(_) => {
            StatusCode::CONFLICT
        },
        PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
        ActorNotPermitted(_) => StatusCode::FORBIDDEN,
        DownstreamUnavailable(_) | InvalidDocument(_) => StatusCode::BAD_GATEWAY,
        PersistenceFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
        InvalidEvent(_) => StatusCode::BAD_REQUEST,
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No actor identity was supplied with the request.")]
    MissingActor,
    #[error("The actor identity is invalid. {0}")]
    InvalidActor(String),
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
}
