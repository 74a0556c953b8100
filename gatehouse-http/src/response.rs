//! Mapping of HTTP responses and transport failures onto [`AuthError`].

use gatehouse_core::AuthError;
use reqwest::Response;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Error body returned by the service.
///
/// `detail` is either a message or a list of field errors.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<Detail>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Detail {
    Message(String),
    Fields(Vec<FieldError>),
}

#[derive(Debug, Deserialize)]
struct FieldError {
    msg: String,
}

/// Extract the server-provided detail message from an error body.
pub fn parse_detail(body: &[u8]) -> Option<String> {
    let body: ErrorBody = serde_json::from_slice(body).ok()?;
    let detail = match body.detail? {
        Detail::Message(message) => message,
        Detail::Fields(fields) => fields
            .into_iter()
            .map(|f| f.msg)
            .collect::<Vec<_>>()
            .join(", "),
    };
    (!detail.is_empty()).then_some(detail)
}

/// Classify a transport failure.
pub fn transport_error(err: reqwest::Error) -> AuthError {
    if err.is_timeout() {
        AuthError::network("request timed out")
    } else if err.is_connect() {
        AuthError::network(format!("connection failed: {}", err))
    } else {
        AuthError::network(err.to_string())
    }
}

/// Pass a successful response through, or turn it into an [`AuthError`].
pub async fn check(response: Response) -> Result<Response, AuthError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.bytes().await.map_err(transport_error)?;
    let detail = parse_detail(&body);
    debug!(status = status.as_u16(), detail = ?detail, "request rejected");
    Err(AuthError::from_status(status.as_u16(), detail))
}

/// Decode a JSON body. A malformed body counts as an unexpected response.
pub async fn json<T: DeserializeOwned>(response: Response) -> Result<T, AuthError> {
    let status = response.status().as_u16();
    let body = response.bytes().await.map_err(transport_error)?;
    serde_json::from_slice(&body).map_err(|e| AuthError::Unexpected {
        status,
        detail: Some(format!("malformed response body: {}", e)),
    })
}

/// Decode a JSON body if there is one, falling back to the default.
pub async fn json_or_default<T: DeserializeOwned + Default>(response: Response) -> Result<T, AuthError> {
    let body = response.bytes().await.map_err(transport_error)?;
    Ok(serde_json::from_slice(&body).unwrap_or_default())
}
