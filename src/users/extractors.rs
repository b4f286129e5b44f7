use axum::{
    async_trait,
    extract::{FromRequest, Query, Request},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// Deserializes the body as JSON when `Content-Type` says so, otherwise as an
/// urlencoded form. A request without `Content-Type` is read from the query
/// string, so `POST /users/delete?userID=...` works with an empty body.
/// Rejections become `400 Bad Request`.
pub struct FormOrJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for FormOrJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .map(|v| v.to_str().unwrap_or_default().to_owned());

        match content_type {
            None => {
                let Query(body) = Query::<T>::try_from_uri(req.uri())
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                Ok(Self(body))
            }
            Some(ct) if is_json_content_type(&ct) => {
                let Json(body) = Json::<T>::from_request(req, state)
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                Ok(Self(body))
            }
            Some(_) => {
                let Form(body) = Form::<T>::from_request(req, state)
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                Ok(Self(body))
            }
        }
    }
}

/// `application/json` and any `application/*+json` subtype, parameters ignored.
fn is_json_content_type(ct: &str) -> bool {
    let essence = ct.split(';').next().unwrap_or_default().trim();
    let Some((kind, subtype)) = essence.split_once('/') else {
        return false;
    };
    kind.eq_ignore_ascii_case("application")
        && (subtype.eq_ignore_ascii_case("json")
            || subtype.to_ascii_lowercase().ends_with("+json"))
}
