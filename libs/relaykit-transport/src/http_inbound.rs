//! YARPC-style HTTP inbound.
//!
//! Every call is a `POST` whose metadata travels in headers:
//!
//! | Header             | Meaning                                 |
//! |--------------------|-----------------------------------------|
//! | `Rpc-Caller`       | calling service (required)              |
//! | `Rpc-Service`      | destination service (required)          |
//! | `Rpc-Procedure`    | procedure name (required)               |
//! | `Rpc-Encoding`     | body encoding, `raw` when absent        |
//! | `Context-TTL-MS`   | time budget of the call in milliseconds |
//! | `Rpc-Header-<key>` | application header `<key>`              |
//!
//! Responses carry `Rpc-Status: success` or `Rpc-Status: error`. Application
//! errors keep HTTP 200 and add `Rpc-Application-Error-Name` and
//! `Rpc-Application-Error-Message`; status errors map their code to an HTTP
//! status and put the code in `Rpc-Error-Code`.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::{ALLOW, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response as HttpResponse};
use parking_lot::Mutex;
use relaykit::{
    CallContext, Code, Encoding, Headers, Inbound, Payload, Request, Response, Router, RpcError,
    TransportError,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

pub const CALLER_HEADER: &str = "rpc-caller";
pub const SERVICE_HEADER: &str = "rpc-service";
pub const PROCEDURE_HEADER: &str = "rpc-procedure";
pub const ENCODING_HEADER: &str = "rpc-encoding";
pub const TTL_HEADER: &str = "context-ttl-ms";
pub const APPLICATION_HEADER_PREFIX: &str = "rpc-header-";
pub const STATUS_HEADER: &str = "rpc-status";
pub const ERROR_CODE_HEADER: &str = "rpc-error-code";
pub const APPLICATION_ERROR_NAME_HEADER: &str = "rpc-application-error-name";
pub const APPLICATION_ERROR_MESSAGE_HEADER: &str = "rpc-application-error-message";

const STATUS_SUCCESS: &str = "success";
const STATUS_ERROR: &str = "error";

/// HTTP status for a status error, following the YARPC mapping.
#[must_use]
pub fn http_status(code: Code) -> StatusCode {
    match code {
        Code::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
        Code::InvalidArgument | Code::FailedPrecondition | Code::OutOfRange => {
            StatusCode::BAD_REQUEST
        }
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists | Code::Aborted => StatusCode::CONFLICT,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn content_type(encoding: Encoding) -> &'static str {
    match encoding {
        Encoding::Thrift => "application/vnd.apache.thrift.binary",
        Encoding::Json => "application/json",
        Encoding::Proto => "application/x-protobuf",
        Encoding::Raw => "application/octet-stream",
    }
}

/// Build the axum router that serves every path from `router`.
#[must_use]
pub fn http_router(router: Arc<Router>) -> axum::Router {
    axum::Router::new()
        .fallback(handle_call)
        .with_state(router)
        .layer(TraceLayer::new_for_http())
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, RpcError> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| RpcError::invalid_argument(format!("header {name} is not valid text")))
        })
        .transpose()
}

fn required_header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, RpcError> {
    match header(headers, name)? {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(RpcError::invalid_argument(format!("missing {name} header"))),
    }
}

fn parse_call(headers: &HeaderMap, body: Bytes) -> Result<(CallContext, Request), RpcError> {
    let caller = required_header(headers, CALLER_HEADER)?;
    let service = required_header(headers, SERVICE_HEADER)?;
    let procedure = required_header(headers, PROCEDURE_HEADER)?;
    let encoding = match header(headers, ENCODING_HEADER)? {
        Some(value) => value
            .parse::<Encoding>()
            .map_err(|e| RpcError::invalid_argument(e.to_string()))?,
        None => Encoding::Raw,
    };
    let ttl = header(headers, TTL_HEADER)?
        .map(|value| {
            value.parse::<u64>().map_err(|_| {
                RpcError::invalid_argument(format!("{TTL_HEADER} must be milliseconds, got {value:?}"))
            })
        })
        .transpose()?;

    let mut application_headers = Headers::new();
    for (name, value) in headers {
        if let Some(key) = name.as_str().strip_prefix(APPLICATION_HEADER_PREFIX) {
            let value = value.to_str().map_err(|_| {
                RpcError::invalid_argument(format!("header {name} is not valid text"))
            })?;
            application_headers.insert(key.to_owned(), value.to_owned());
        }
    }

    let mut ctx = CallContext::new(procedure)
        .with_caller(caller)
        .with_service(service)
        .with_headers(application_headers.clone());
    if let Some(ttl) = ttl.filter(|ttl| *ttl > 0) {
        ctx = ctx.with_timeout(Duration::from_millis(ttl));
    }

    let request = Request::new(procedure, Payload::new(encoding, body))
        .with_caller(caller)
        .with_service(service)
        .with_headers(application_headers);
    Ok((ctx, request))
}

fn insert_header(map: &mut HeaderMap, name: &str, value: &str) {
    match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
        (Ok(name), Ok(value)) => {
            map.insert(name, value);
        }
        _ => tracing::warn!(header = name, "dropping response header that is not valid HTTP"),
    }
}

fn success_response(response: Response) -> HttpResponse {
    let encoding = response.payload.encoding();
    let mut headers = HeaderMap::new();
    insert_header(&mut headers, STATUS_HEADER, STATUS_SUCCESS);
    insert_header(&mut headers, ENCODING_HEADER, encoding.as_str());
    insert_header(&mut headers, CONTENT_TYPE.as_str(), content_type(encoding));
    for (key, value) in &response.headers {
        insert_header(&mut headers, &format!("{APPLICATION_HEADER_PREFIX}{key}"), value);
    }
    (StatusCode::OK, headers, Body::from(response.payload.into_body())).into_response()
}

fn error_response(error: RpcError) -> HttpResponse {
    let mut headers = HeaderMap::new();
    insert_header(&mut headers, STATUS_HEADER, STATUS_ERROR);

    match error {
        RpcError::Application {
            name,
            message,
            details,
        } => {
            let encoding = details.encoding();
            insert_header(&mut headers, ENCODING_HEADER, encoding.as_str());
            insert_header(&mut headers, CONTENT_TYPE.as_str(), content_type(encoding));
            insert_header(&mut headers, APPLICATION_ERROR_NAME_HEADER, &name);
            insert_header(&mut headers, APPLICATION_ERROR_MESSAGE_HEADER, &message);
            (StatusCode::OK, headers, Body::from(details.into_body())).into_response()
        }
        RpcError::Status { code, message } => {
            insert_header(&mut headers, ERROR_CODE_HEADER, code.as_str());
            insert_header(&mut headers, CONTENT_TYPE.as_str(), "text/plain; charset=utf-8");
            (http_status(code), headers, message).into_response()
        }
    }
}

async fn handle_call(
    State(router): State<Arc<Router>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResponse {
    if method != Method::POST {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(ALLOW, "POST")],
            "only POST is supported",
        )
            .into_response();
    }

    let (ctx, request) = match parse_call(&headers, body) {
        Ok(call) => call,
        Err(error) => return error_response(error),
    };

    // Dropping this future (client went away) cancels the call downstream.
    let _cancel_on_drop = ctx.cancellation_token().clone().drop_guard();

    match ctx.run(router.dispatch(ctx.clone(), request)).await {
        Ok(response) => success_response(response),
        Err(error) => {
            tracing::debug!(
                procedure = ctx.procedure(),
                code = %error.code(),
                error = %error,
                "call failed"
            );
            error_response(error)
        }
    }
}

struct Running {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// HTTP inbound serving a [`Router`] with graceful shutdown.
pub struct HttpInbound {
    name: String,
    address: String,
    running: Mutex<Option<Running>>,
}

impl HttpInbound {
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            name: "http".to_owned(),
            address: address.into(),
            running: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Bound address while serving. Useful when binding port 0.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().as_ref().map(|running| running.local_addr)
    }
}

impl fmt::Debug for HttpInbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpInbound")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

#[async_trait]
impl Inbound for HttpInbound {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, router: Arc<Router>) -> Result<(), TransportError> {
        if self.running.lock().is_some() {
            return Err(TransportError::AlreadyStarted(self.name.clone()));
        }

        let listener =
            TcpListener::bind(&self.address)
                .await
                .map_err(|source| TransportError::Bind {
                    address: self.address.clone(),
                    source,
                })?;
        let local_addr = listener.local_addr()?;
        tracing::info!(inbound = %self.name, "HTTP inbound bound on {}", local_addr);

        let cancel = CancellationToken::new();
        let shutdown = {
            let cancel = cancel.clone();
            let name = self.name.clone();
            async move {
                cancel.cancelled().await;
                tracing::info!(inbound = %name, "HTTP inbound shutting down gracefully (cancellation)");
            }
        };

        let app = http_router(router);
        let name = self.name.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::error!(inbound = %name, error = %e, "HTTP inbound failed");
            }
        });

        *self.running.lock() = Some(Running {
            local_addr,
            cancel,
            task,
        });
        Ok(())
    }

    async fn stop(&self) {
        let running = self.running.lock().take();
        let Some(running) = running else {
            return;
        };

        running.cancel.cancel();
        if let Err(e) = running.task.await {
            tracing::warn!(inbound = %self.name, error = %e, "HTTP inbound task failed");
        }
        tracing::info!(inbound = %self.name, "HTTP inbound stopped");
    }
}
