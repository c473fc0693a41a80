//! Placeholder routes of the scaffold.
//!
//! `GET /` answers with a `success` envelope and can be used as a liveness probe.

use crate::web::warp::into_response;
use serde_json::json;
use warp::Filter;
use warp::filters::BoxedFilter;

pub fn main_routes() -> BoxedFilter<(impl warp::Reply,)> {
    warp::path::end()
        .and(warp::get())
        .and_then(handle_index)
        .boxed()
}

#[tracing::instrument(level = "debug", name = "GET /", skip_all)]
async fn handle_index() -> Result<impl warp::Reply, warp::Rejection> {
    into_response(Ok(json!({ "message": "OK!" })))
}
