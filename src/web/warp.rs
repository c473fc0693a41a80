use crate::config::ResolvedConfig;
use crate::tools::system;
use crate::tools::watch::Watch;
use crate::web::disclosure::ErrorTranslator;
use crate::web::envelope::Envelope;
use crate::web::error::{ApiError, ResultExt};
use crate::web::{middleware, routes};
use crate::{client_bail, status_bail};
use anyhow::Context;
use bytes::{Buf, BufMut};
use futures_util::{Stream, TryStreamExt};
use hyper::server::conn::AddrStream;
use hyper::service::make_service_fn;
use hyper::{Body, Server};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Poll;
use tower::Service;
use tracing::{Instrument, Span, debug_span};
use warp::body::BodyDeserializeError;
use warp::cors::CorsForbidden;
use warp::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use warp::http::{HeaderValue, Request, StatusCode};
use warp::reject::{
    InvalidHeader, InvalidQuery, LengthRequired, MethodNotAllowed, MissingHeader, PayloadTooLarge,
    UnsupportedMediaType,
};
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Used if an envelope cannot be serialized, which only happens for broken `Serialize` impls.
const FALLBACK_ERROR_BODY: &str =
    r#"{"status":"error","message":"internal server error","code":500,"data":null}"#;

pub fn with_cloneable<C: Clone + Send>(
    value: C,
) -> impl Filter<Extract = (C,), Error = Infallible> + Clone {
    warp::any().map(move || value.clone())
}

/// Reads the request body (at most `max_body_size` bytes) and decodes it as JSON.
///
/// Bodies which are not valid JSON are rejected as malformed (400), oversized ones with 413.
pub fn with_json_body<T: DeserializeOwned + Send>(
    max_body_size: u64,
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::stream()
        .and(warp::header::optional::<u64>(CONTENT_LENGTH.as_str()))
        .and(with_cloneable(max_body_size))
        .and_then(
            async |stream, content_length: Option<u64>, max_body_size: u64| {
                decode_json(stream, content_length, max_body_size)
                    .await
                    .map_err(into_rejection)
            },
        )
}

async fn decode_json<T: DeserializeOwned>(
    stream: impl Stream<Item = Result<impl Buf, warp::Error>> + Unpin,
    content_length: Option<u64>,
    max_body_size: u64,
) -> anyhow::Result<T> {
    let data = read_limited(stream, content_length, max_body_size).await?;
    if data.is_empty() {
        client_bail!("Empty request body");
    }

    serde_json::from_slice(&data).map_err(|err| {
        tracing::debug!("Rejecting malformed JSON body: {}", err);
        ApiError::malformed().into()
    })
}

/// Collects the body into a buffer, aborting as soon as it exceeds `max_body_size`.
///
/// An announced `content_length` above the limit is rejected before anything is read,
/// bodies without one (chunked transfer) are checked chunk by chunk.
async fn read_limited<E: std::error::Error + Send + Sync + 'static>(
    mut stream: impl Stream<Item = Result<impl Buf, E>> + Unpin,
    content_length: Option<u64>,
    max_body_size: u64,
) -> anyhow::Result<Vec<u8>> {
    if content_length.unwrap_or(0) > max_body_size {
        status_bail!(
            StatusCode::PAYLOAD_TOO_LARGE,
            "The given request data is too large"
        );
    }

    let mut data = Vec::with_capacity(content_length.unwrap_or(0) as usize);
    while let Some(chunk) = stream
        .try_next()
        .await
        .context("Failed to read body")
        .mark_client_error()?
    {
        if (data.len() + chunk.remaining()) as u64 > max_body_size {
            status_bail!(
                StatusCode::PAYLOAD_TOO_LARGE,
                "The given request data is too large"
            );
        }
        data.put(chunk);
    }

    Ok(data)
}

/// Wraps the result of a handler into a `success` envelope (or a rejection).
pub fn into_response<S: Serialize>(result: anyhow::Result<S>) -> Result<Response, Rejection> {
    into_response_with_status(result.map(|data| (StatusCode::OK, data)))
}

pub fn into_response_with_status<S: Serialize>(
    response: anyhow::Result<(StatusCode, S)>,
) -> Result<Response, Rejection> {
    let response = response.and_then(|(status_code, data)| {
        serde_json::to_vec(&Envelope::success(data))
            .context("Failed to serialize data")
            .map(|body| (status_code, body))
    });

    match response {
        Ok((status, body)) => Ok(json_response(status, body)),
        Err(err) => Err(into_rejection(err)),
    }
}

pub fn into_rejection(err: anyhow::Error) -> Rejection {
    match err.downcast_ref::<ApiError>() {
        Some(api_error) => api_error.clone().into(),
        None => ApiError::internal(&err).into(),
    }
}

fn json_response(status: StatusCode, body: Vec<u8>) -> Response {
    let mut res = Response::new(body.into());
    *res.status_mut() = status;
    res.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    res
}

pub fn envelope_response<T: Serialize>(status: StatusCode, envelope: &Envelope<T>) -> Response {
    match serde_json::to_vec(envelope) {
        Ok(body) => json_response(status, body),
        Err(err) => {
            tracing::error!("Failed to serialize response envelope: {}", err);
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                FALLBACK_ERROR_BODY.as_bytes().to_vec(),
            )
        }
    }
}

fn fail_response(err: &ApiError) -> Response {
    tracing::debug!("Rejecting request ({}): {}", err.status, err.message);
    envelope_response(err.status, &Envelope::fail(err.fail_data()))
}

fn error_response(err: &ApiError, env: &str, translator: &ErrorTranslator) -> Response {
    match &err.detail {
        Some(detail) => tracing::error!("Request failed: {}", detail),
        None => tracing::error!("Request failed: {}", err.message),
    }

    let envelope = translator
        .translate(env, &err.report())
        .with_code(i64::from(err.status.as_u16()));
    envelope_response(err.status, &envelope)
}

/// Turns any rejection into an envelope response.
///
/// Unmatched routes become a 404 `fail`, client errors a `fail` with their status
/// and everything else a 500 `error` subject to the disclosure policy of `translator`.
fn handle_rejection(rejection: &Rejection, env: &str, translator: &ErrorTranslator) -> Response {
    if rejection.is_not_found() || rejection.find::<MethodNotAllowed>().is_some() {
        return fail_response(&ApiError::not_found());
    }

    if let Some(err) = rejection.find::<ApiError>() {
        return if err.is_client_error() {
            fail_response(err)
        } else {
            error_response(err, env, translator)
        };
    }

    if let Some(err) = rejection.find::<CorsForbidden>() {
        return fail_response(&ApiError {
            subject: "origin",
            ..ApiError::new(StatusCode::FORBIDDEN, err)
        });
    }

    if rejection.find::<BodyDeserializeError>().is_some() {
        return fail_response(&ApiError::malformed());
    }

    let client_error = if let Some(err) = rejection.find::<PayloadTooLarge>() {
        Some(ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, err))
    } else if let Some(err) = rejection.find::<UnsupportedMediaType>() {
        Some(ApiError::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, err))
    } else if let Some(err) = rejection.find::<LengthRequired>() {
        Some(ApiError::new(StatusCode::LENGTH_REQUIRED, err))
    } else if let Some(err) = rejection.find::<InvalidHeader>() {
        Some(ApiError::new(StatusCode::BAD_REQUEST, err))
    } else if let Some(err) = rejection.find::<MissingHeader>() {
        Some(ApiError::new(StatusCode::BAD_REQUEST, err))
    } else {
        rejection
            .find::<InvalidQuery>()
            .map(|err| ApiError::new(StatusCode::BAD_REQUEST, err))
    };

    match client_error {
        Some(err) => fail_response(&err),
        None => error_response(
            &ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Unhandled rejection: {:?}", rejection),
            ),
            env,
            translator,
        ),
    }
}

/// Recovers all rejections of `routes` into envelope responses.
pub fn with_envelope_handling<F>(
    routes: F,
    env: String,
    translator: ErrorTranslator,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone
where
    F: Filter<Error = Rejection> + Clone + Send + Sync + 'static,
    F::Extract: Reply,
{
    let policy = Arc::new((env, translator));

    routes.recover(move |rejection: Rejection| {
        let policy = policy.clone();
        async move {
            Ok::<_, Infallible>(handle_rejection(&rejection, &policy.0, &policy.1))
        }
    })
}

/// Wraps `routes` into the complete application filter: request logging, CORS,
/// error handling and security headers.
pub fn api<F>(
    config: &ResolvedConfig,
    routes: F,
) -> impl Filter<Extract = (impl Reply + use<F>,), Error = Infallible> + Clone + use<F>
where
    F: Filter<Error = Rejection> + Clone + Send + Sync + 'static,
    F::Extract: Reply,
{
    let routes = middleware::log_request_details(config.debug)
        .and(routes)
        .with(middleware::cors(&config.cors));

    with_envelope_handling(routes, config.env.clone(), ErrorTranslator::default())
        .with(warp::reply::with::headers(middleware::security_headers()))
}

/// Determines the socket address to listen on, enforcing the valid port range.
pub fn bind_address(config: &ResolvedConfig) -> anyhow::Result<SocketAddr> {
    let port = u16::try_from(config.port)
        .ok()
        .filter(|port| *port > 0)
        .with_context(|| {
            format!(
                "Invalid port {} configured, expected a value between 1 and 65535",
                config.port
            )
        })?;

    Ok(SocketAddr::from(([0, 0, 0, 0], port)))
}

pub async fn run_webserver(config: Arc<ResolvedConfig>) -> anyhow::Result<()> {
    let bind_address = bind_address(&config)?;

    tracing::info!(
        "Starting server '{}' ({}) at {}",
        config.app_id,
        config.env,
        bind_address
    );

    let svc = warp::service(api(&config, routes::main_routes()));
    let make_svc = make_service_fn(move |conn: &AddrStream| {
        let svc = TracingMiddleware {
            inner: svc.clone(),
            remote_addr: conn.remote_addr(),
        };
        async move { Ok::<_, Infallible>(svc) }
    });

    let server = Server::try_bind(&bind_address)
        .with_context(|| format!("Failed to bind HTTP server to {}", bind_address))?
        .serve(make_svc);

    tracing::info!(
        "Running HTTP server at effective address {}",
        server.local_addr()
    );
    server
        .with_graceful_shutdown(system::await_shutdown())
        .await
        .context("HTTP server terminated unexpectedly")?;

    tracing::info!("HTTP Server has been stopped...");

    Ok(())
}

/// Opens a span per request and writes one access log line once the response is known.
#[derive(Clone)]
struct TracingMiddleware<S> {
    inner: S,
    remote_addr: SocketAddr,
}

impl<S> Service<Request<Body>> for TracingMiddleware<S>
where
    S: Service<Request<Body>, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let remote_addr = self.remote_addr;

        let span = debug_span!(
            "http_request",
            http.method = %method,
            http.url = %path,
            http.status_code = tracing::field::Empty,
        );

        let mut inner = self.inner.clone();
        let watch = Watch::start();

        let fut = async move {
            let response = inner.call(req).await?;
            let status = response.status().as_u16();
            Span::current().record("http.status_code", status as i64);

            // Server errors are reported at ERROR so that the failing path shows up
            // next to the error itself, even if spans are filtered out.
            if response.status().is_server_error() {
                tracing::error!(
                    "{} {} - {} - {} - {:.3} ms",
                    status,
                    method,
                    path,
                    remote_addr,
                    watch.elapsed_ms()
                );
            } else {
                tracing::info!(
                    "{} {} - {} - {} - {:.3} ms",
                    status,
                    method,
                    path,
                    remote_addr,
                    watch.elapsed_ms()
                );
            }
            Ok(response)
        }
        .instrument(span);

        Box::pin(fut)
    }
}
