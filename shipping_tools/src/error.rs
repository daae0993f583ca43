use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShippingApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("The request could not be sent: {0}")]
    RestRequestError(String),
    #[error("The request timed out")]
    Timeout,
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("The provider did not return a {0}")]
    MissingDocument(String),
    #[error("Invalid currency amount: {0}")]
    InvalidCurrencyAmount(String),
}

impl ShippingApiError {
    /// Whether the failure might go away if the same request is sent again later.
    pub fn is_transient(&self) -> bool {
        match self {
            ShippingApiError::RestRequestError(_) | ShippingApiError::Timeout => true,
            ShippingApiError::QueryError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ShippingApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ShippingApiError::Timeout
        } else if e.is_decode() {
            ShippingApiError::JsonError(e.to_string())
        } else if e.is_connect() || e.is_request() {
            ShippingApiError::RestRequestError(e.to_string())
        } else {
            ShippingApiError::RestResponseError(e.to_string())
        }
    }
}
