//! Extractors that reject with [`ApiError`] bodies instead of plain text.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Json,
};
use slotswap_core::EntityIdType;
use uuid::Uuid;

use crate::error::ApiError;

/// Type-safe entity id from a single path parameter.
///
/// ```rust,ignore
/// async fn delete_event(PathId(event_id): PathId<EventId>) -> ApiResult<..> { .. }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PathId<T: EntityIdType>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for PathId<T>
where
    S: Send + Sync,
    T: EntityIdType + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(uuid): Path<Uuid> = Path::from_request_parts(parts, state)
            .await
            .map_err(|e| {
                ApiError::invalid_format("id", "valid UUID")
                    .with_details(serde_json::json!({
                        "entityType": T::ENTITY_TYPE,
                        "path": parts.uri.path(),
                        "reason": e.body_text(),
                    }))
            })?;

        Ok(PathId(T::new(uuid)))
    }
}

/// JSON body whose parse failures become `INVALID_INPUT` errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError::invalid_input(rejection.body_text())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use axum::{body::Body, http::StatusCode, routing::post, Router};
    use slotswap_core::EventId;
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new().route(
            "/events/:id",
            post(|PathId(id): PathId<EventId>, ApiJson(body): ApiJson<serde_json::Value>| async move {
                format!("{}:{}", id, body)
            }),
        )
    }

    async fn send(uri: &str, body: &'static str) -> Result<(StatusCode, Vec<u8>), String> {
        let request = axum::http::Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .map_err(|e| e.to_string())?;
        let response = app().oneshot(request).await.map_err(|e| e.to_string())?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| e.to_string())?;
        Ok((status, bytes.to_vec()))
    }

    #[tokio::test]
    async fn test_bad_path_id_is_invalid_format() -> Result<(), String> {
        let (status, body) = send("/events/not-a-uuid", "{}").await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ApiError = serde_json::from_slice(&body).map_err(|e| e.to_string())?;
        assert_eq!(err.code, ErrorCode::InvalidFormat);
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_input() -> Result<(), String> {
        let uri = format!("/events/{}", Uuid::now_v7());
        let (status, body) = send(&uri, "{not json").await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ApiError = serde_json::from_slice(&body).map_err(|e| e.to_string())?;
        assert_eq!(err.code, ErrorCode::InvalidInput);
        Ok(())
    }
}
