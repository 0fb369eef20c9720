//! Request body extraction for the batch endpoints.
//!
//! Accepts either a raw body, typed by the request `Content-Type`, or a
//! `multipart/form-data` form whose first file part is the upload.

use crate::routes::error_response;
use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request};
use axum::response::{IntoResponse, Response};
use http::{StatusCode, header};
use std::fmt::Display;

/// An uploaded file and its declared media type.
#[derive(Debug)]
pub struct Upload {
    pub content_type: String,
    pub data: Bytes,
}

#[axum::async_trait]
impl<S> FromRequest<S> for Upload
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(media_type)
            .unwrap_or_default();

        let upload = if content_type == "multipart/form-data" {
            let mut multipart = Multipart::from_request(req, state).await.map_err(rejection)?;
            first_file(&mut multipart).await?
        } else {
            let data = Bytes::from_request(req, state).await.map_err(rejection)?;
            Upload { content_type, data }
        };

        if upload.data.is_empty() {
            return Err(error_response(StatusCode::BAD_REQUEST, "no file uploaded"));
        }
        Ok(upload)
    }
}

async fn first_file(multipart: &mut Multipart) -> Result<Upload, Response> {
    while let Some(field) = multipart.next_field().await.map_err(rejection)? {
        if field.file_name().is_none() {
            continue;
        }
        let content_type = field
            .content_type()
            .map(media_type)
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let data = field.bytes().await.map_err(rejection)?;
        return Ok(Upload { content_type, data });
    }
    Err(error_response(StatusCode::BAD_REQUEST, "no file uploaded"))
}

/// Keep the status axum picked for a rejection, with our JSON error body.
fn rejection<E: IntoResponse + Display>(err: E) -> Response {
    let message = err.to_string();
    let status = err.into_response().status();
    error_response(status, &message)
}

/// `"image/JPEG; charset=..."` -> `"image/jpeg"`
pub fn media_type(value: &str) -> String {
    value.split(';').next().unwrap_or("").trim().to_ascii_lowercase()
}
