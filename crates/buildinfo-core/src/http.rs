//! HTTP exposure of build information.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, FixedOffset, Utc};
use tracing::error;

use crate::BuildInfo;

/// Router answering `GET /` with the JSON encoding of `bld`.
pub fn router(bld: Arc<BuildInfo>) -> Router {
    Router::new().route("/", get(handler)).with_state(bld)
}

/// Handler for use in an existing router with `Arc<BuildInfo>` state.
pub async fn handler(State(bld): State<Arc<BuildInfo>>) -> Response {
    response(&bld)
}

/// JSON response for `bld`, with a `Last-Modified` header when the build time
/// is known.
pub fn response(bld: &BuildInfo) -> Response {
    let body = match bld.to_json() {
        Ok(body) => body,
        Err(err) => {
            error!(%err, "failed to encode build information");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut res = (
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        )],
        body,
    )
        .into_response();

    if let Some(time) = bld.time() {
        if let Ok(value) = HeaderValue::from_str(&http_date(time)) {
            res.headers_mut().insert(header::LAST_MODIFIED, value);
        }
    }
    res
}

impl IntoResponse for BuildInfo {
    fn into_response(self) -> Response {
        response(&self)
    }
}

/// IMF-fixdate, e.g. `Tue, 16 Jun 2020 19:53:00 GMT`.
fn http_date(t: &DateTime<FixedOffset>) -> String {
    t.with_timezone(&Utc)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}
