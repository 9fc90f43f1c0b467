// API error taxonomy: a missing resource, or anything else

use hyper::StatusCode;
use serde_json::json;

use crate::http::{json_response, HttpResponse};
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The named resource does not exist (or is not visible)
    #[error("{0} not found")]
    NotFound(&'static str),
    /// Any other failure; the message is returned to the caller as-is
    #[error("{0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl ApiError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn into_response(self) -> HttpResponse {
        json_response(self.status(), &json!({ "error": self.to_string() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(resp: HttpResponse) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_response() {
        let resp = ApiError::NotFound("Page").into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await, json!({"error": "Page not found"}));
    }

    #[tokio::test]
    async fn test_internal_error_echoes_message() {
        let err: ApiError = StoreError::Query("relation \"pages\" does not exist".to_string()).into();
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(resp).await,
            json!({"error": "relation \"pages\" does not exist"})
        );
    }
}
