use core::fmt;
use core::panic::Location;
use std::error::Error as StdError;

use axum::extract::{FromRequest, Request};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::sep2::error::{ErrorResponse, ReasonCode};

pub const SEP2_CONTENT_TYPE: &str = "application/sep+xml";

/// Service-level failure taxonomy. Handlers return this; the HTTP boundary
/// translates it to a status code and (for sep2 routes) an `<Error>` body.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found")]
    NotFound,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for ServiceError {
    fn from(error: sqlx::Error) -> Self {
        ServiceError::Internal(anyhow::Error::new(error).context("database error"))
    }
}

impl ServiceError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ServiceError::BadRequest(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ServiceError::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ServiceError::Conflict(msg.into())
    }
}

pub struct HttpErrorBuilder {
    pub code: StatusCode,
    pub loc: &'static Location<'static>,
    pub msg: Option<&'static str>,
}

impl HttpErrorBuilder {
    #[inline]
    #[track_caller]
    pub fn new(code: StatusCode) -> Self {
        Self {
            code,
            loc: Location::caller(),
            msg: None,
        }
    }

    #[inline]
    pub fn err<T: Into<Box<dyn StdError + Sync + Send + 'static>>>(self) -> impl FnOnce(T) -> HttpError {
        move |source| HttpError {
            code: self.code,
            loc: self.loc,
            msg: self.msg,
            source: Some(source.into()),
        }
    }

    #[inline]
    pub fn msg(self, msg: &'static str) -> HttpError {
        HttpError {
            code: self.code,
            loc: self.loc,
            msg: Some(msg),
            source: None,
        }
    }
}

pub struct HttpError {
    pub code: StatusCode,
    pub loc: &'static Location<'static>,
    pub msg: Option<&'static str>,
    pub source: Option<Box<dyn StdError + Sync + Send + 'static>>,
}

impl HttpError {
    #[inline]
    #[track_caller]
    pub fn forbidden() -> HttpErrorBuilder {
        HttpErrorBuilder::new(StatusCode::FORBIDDEN)
    }

    #[inline]
    #[track_caller]
    pub fn not_found() -> HttpErrorBuilder {
        HttpErrorBuilder::new(StatusCode::NOT_FOUND)
    }

    #[inline]
    #[track_caller]
    pub fn unauthorized() -> HttpErrorBuilder {
        HttpErrorBuilder::new(StatusCode::UNAUTHORIZED)
    }

    #[inline]
    #[track_caller]
    pub fn internal() -> HttpErrorBuilder {
        HttpErrorBuilder::new(StatusCode::INTERNAL_SERVER_ERROR)
    }

    #[inline]
    #[track_caller]
    pub fn bad_request() -> HttpErrorBuilder {
        HttpErrorBuilder::new(StatusCode::BAD_REQUEST)
    }

    #[inline]
    #[track_caller]
    pub fn conflict() -> HttpErrorBuilder {
        HttpErrorBuilder::new(StatusCode::CONFLICT)
    }

    fn reason_code(&self) -> Option<ReasonCode> {
        match self.code {
            StatusCode::BAD_REQUEST => Some(ReasonCode::InvalidRequestFormat),
            StatusCode::CONFLICT => Some(ReasonCode::ResourceLimitReached),
            StatusCode::INTERNAL_SERVER_ERROR => Some(ReasonCode::InternalError),
            _ => None,
        }
    }
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        let builder = match &error {
            ServiceError::BadRequest(_) => HttpError::bad_request(),
            ServiceError::NotFound => HttpError::not_found(),
            ServiceError::Forbidden(_) => HttpError::forbidden(),
            ServiceError::Conflict(_) => HttpError::conflict(),
            ServiceError::Unauthorized => HttpError::unauthorized(),
            ServiceError::Internal(_) => HttpError::internal(),
        };
        builder.err()(error)
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.code, self.loc)?;

        if let Some(msg) = self.msg {
            write!(f, ": {msg}")?;
        }

        if let Some(source) = self.source.as_deref() {
            write!(f, " [source: {source}")?;
            for cause in anyhow::Chain::new(source).skip(1) {
                write!(f, ", because {cause}")?;
            }
            write!(f, "]")?;
        }

        Ok(())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        error!(error = %self);

        // Status 500 deliberately carries no detail beyond the reason code.
        match self.reason_code() {
            Some(reason_code) => {
                let body = ErrorResponse::new(reason_code);
                (self.code, Sep2Xml(body)).into_response()
            }
            None => self.code.into_response(),
        }
    }
}

/// Responder/extractor for sep2 XML bodies (`application/sep+xml`).
pub struct Sep2Xml<T>(pub T);

impl<T: Serialize> IntoResponse for Sep2Xml<T> {
    fn into_response(self) -> Response {
        match quick_xml::se::to_string(&self.0) {
            Ok(body) => (
                [(header::CONTENT_TYPE, HeaderValue::from_static(SEP2_CONTENT_TYPE))],
                body,
            )
                .into_response(),
            Err(error) => {
                error!(%error, "Failed to serialize sep2 response body");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

impl<S, T> FromRequest<S> for Sep2Xml<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = HttpError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = axum::body::Bytes::from_request(req, state)
            .await
            .map_err(HttpError::bad_request().err())?;

        let text = std::str::from_utf8(&body).map_err(HttpError::bad_request().err())?;

        let parsed = quick_xml::de::from_str(text).map_err(HttpError::bad_request().err())?;

        Ok(Sep2Xml(parsed))
    }
}

/// 201 Created with a Location header, the sep2 create-response shape.
pub struct CreatedAt(pub String);

impl IntoResponse for CreatedAt {
    fn into_response(self) -> Response {
        match HeaderValue::from_str(&self.0) {
            Ok(location) => (StatusCode::CREATED, [(header::LOCATION, location)]).into_response(),
            Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

/// Joins the configured href prefix with a resource URI.
pub fn generate_href(href_prefix: Option<&str>, uri: &str) -> String {
    match href_prefix {
        None => uri.to_owned(),
        Some(prefix) => {
            let joined: Vec<&str> = prefix
                .split('/')
                .chain(uri.split('/'))
                .filter(|part| !part.is_empty())
                .collect();
            format!("/{}", joined.join("/"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn href_prefix_joining() {
        assert_eq!(generate_href(None, "/edev/1"), "/edev/1");
        assert_eq!(generate_href(Some("/prefix"), "/edev/1"), "/prefix/edev/1");
        assert_eq!(generate_href(Some("/a/b/"), "/edev/1/der"), "/a/b/edev/1/der");
    }

    #[test]
    fn service_error_maps_to_status() {
        let cases = [
            (ServiceError::bad_request("x"), StatusCode::BAD_REQUEST),
            (ServiceError::NotFound, StatusCode::NOT_FOUND),
            (ServiceError::forbidden("x"), StatusCode::FORBIDDEN),
            (ServiceError::conflict("x"), StatusCode::CONFLICT),
            (ServiceError::Unauthorized, StatusCode::UNAUTHORIZED),
        ];
        for (error, status) in cases {
            assert_eq!(HttpError::from(error).code, status);
        }
    }
}
