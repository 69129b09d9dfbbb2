//! HTTP surface of the broker.
//!
//! | route              | body                     | success                           |
//! |--------------------|--------------------------|-----------------------------------|
//! | `GET /api/health`  |                          | `200 OK`                          |
//! | `POST /api/tokens` | [`IssueTokenRequest`]    | `200` [`IssueTokenResponse`]      |
//! | `POST /api/redeem` | [`RedeemTokenRequest`]   | `200` [`RedeemTokenResponse`]     |
//!
//! Every absence cause of a redemption, including a lookup id that does not
//! even parse, is the same `404 {"error":"token not found"}`. Both POST routes
//! are rate limited per client IP.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{ConnectInfo, Request, State, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
};
use zkshare_core::Environment;
use zkshare_proto::{
    LookupId,
    wire::{
        ErrorResponse, IssueTokenRequest, IssueTokenResponse, RedeemTokenRequest,
        RedeemTokenResponse,
    },
};

use crate::{
    broker::{AUDIT_TARGET, BrokerError, TokenBroker},
    rate_limit::{RateDecision, RateLimiter},
    storage::TokenStore,
};

/// Message for every absent token.
pub const NOT_FOUND_MESSAGE: &str = "token not found";

/// HTTP layer configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Largest accepted request body
    pub max_body_bytes: usize,
    /// Requests running longer are answered with `408`
    pub request_timeout: Duration,
    /// Take the client IP from the first `X-Forwarded-For` hop when present
    pub trust_forwarded_for: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 16 * 1024,
            request_timeout: Duration::from_secs(30),
            trust_forwarded_for: true,
        }
    }
}

/// State shared by all handlers.
pub struct AppState<E: Environment, S: TokenStore> {
    /// The broker behind the routes
    pub broker: Arc<TokenBroker<E, S>>,
    /// Per-client limiter for the POST routes
    pub limiter: Arc<RateLimiter>,
    /// See [`HttpConfig::trust_forwarded_for`]
    pub trust_forwarded_for: bool,
}

impl<E: Environment, S: TokenStore> Clone for AppState<E, S> {
    fn clone(&self) -> Self {
        Self {
            broker: Arc::clone(&self.broker),
            limiter: Arc::clone(&self.limiter),
            trust_forwarded_for: self.trust_forwarded_for,
        }
    }
}

/// Build the broker router.
pub fn router<E: Environment, S: TokenStore>(
    broker: Arc<TokenBroker<E, S>>,
    limiter: Arc<RateLimiter>,
    config: &HttpConfig,
) -> Router {
    let state = AppState { broker, limiter, trust_forwarded_for: config.trust_forwarded_for };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let limited = Router::new()
        .route("/api/tokens", post(issue_token::<E, S>))
        .route("/api/redeem", post(redeem_token::<E, S>))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit::<E, S>));

    Router::new()
        .route("/api/health", get(health))
        .merge(limited)
        .with_state(state)
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, config.request_timeout))
}

/// Resolve the client address used for rate limiting.
///
/// The first `X-Forwarded-For` hop wins when trusted and parseable, then the
/// peer address. Requests with neither share the unspecified address.
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trust_forwarded_for: bool) -> IpAddr {
    let forwarded = trust_forwarded_for
        .then(|| headers.get("x-forwarded-for"))
        .flatten()
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok());

    forwarded.or(peer).unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

async fn health() -> &'static str {
    "OK"
}

async fn issue_token<E: Environment, S: TokenStore>(
    State(state): State<AppState<E, S>>,
    body: Result<Json<IssueTokenRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => return rejected(&rejection),
    };

    let ttl = request
        .ttl_secs
        .map(Duration::from_secs)
        .or_else(|| request.ttl_hours.map(|hours| Duration::from_secs(u64::from(hours) * 3600)));

    let broker = Arc::clone(&state.broker);
    match run_blocking(move || broker.create_token(ttl)).await {
        Ok(issued) => Json(IssueTokenResponse {
            lookup_id: issued.lookup_id,
            secret_share: issued.secret_share,
            expires_at: issued.expires_at_secs,
        })
        .into_response(),
        Err(err) => err.into_response(),
    }
}

async fn redeem_token<E: Environment, S: TokenStore>(
    State(state): State<AppState<E, S>>,
    body: Result<Json<RedeemTokenRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => return rejected(&rejection),
    };

    let Ok(lookup_id) = LookupId::parse(&request.lookup_id) else {
        tracing::info!(target: AUDIT_TARGET, outcome = "malformed", "redemption");
        return BrokerError::NotFound.into_response();
    };

    let broker = Arc::clone(&state.broker);
    match run_blocking(move || broker.consume(&lookup_id)).await {
        Ok(secret_share) => Json(RedeemTokenResponse { secret_share }).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn rate_limit<E: Environment, S: TokenStore>(
    State(state): State<AppState<E, S>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0.ip());
    let client = client_ip(request.headers(), peer, state.trust_forwarded_for);

    match state.limiter.check(client, state.broker.env().wall_clock_secs()) {
        RateDecision::Allowed { .. } => next.run(request).await,
        RateDecision::Limited { retry_after_secs } => {
            tracing::warn!(%client, retry_after_secs, "rate limited");

            let body = ErrorResponse {
                error: "too many requests".to_string(),
                retry_after: Some(retry_after_secs),
            };
            let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            response.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
            response
        },
    }
}

/// Run a broker operation on the blocking pool.
async fn run_blocking<T: Send + 'static>(
    op: impl FnOnce() -> Result<T, BrokerError> + Send + 'static,
) -> Result<T, BrokerError> {
    tokio::task::spawn_blocking(op).await.unwrap_or_else(|join_err| {
        Err(BrokerError::Storage(crate::storage::StorageError::Io(join_err.to_string())))
    })
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))).into_response()
}

fn rejected(rejection: &JsonRejection) -> Response {
    (rejection.status(), Json(ErrorResponse::new(rejection.body_text()))).into_response()
}

impl IntoResponse for BrokerError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse::new(NOT_FOUND_MESSAGE))).into_response()
            },
            Self::InvalidTtl { .. } => bad_request(self.to_string()),
            Self::IdExhausted | Self::Storage(_) => {
                tracing::error!(error = %self, "broker failure");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse::new("internal error")))
                    .into_response()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use zkshare_core::SystemEnv;
    use zkshare_proto::{ID_BYTES, SecretShare};

    use super::*;
    use crate::{
        broker::BrokerConfig,
        rate_limit::RateLimitConfig,
        storage::{ChaoticStore, MemoryStore},
    };

    fn app_with<S: TokenStore>(store: S, max_requests: u32) -> Router {
        let broker =
            Arc::new(TokenBroker::new(SystemEnv::new(), store, BrokerConfig::default()));
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            max_requests,
            window: Duration::from_secs(3600),
        }));
        router(broker, limiter, &HttpConfig::default())
    }

    fn app() -> Router {
        app_with(MemoryStore::new(), 0)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn health_is_ok() {
        let request = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn issue_then_redeem_once() {
        let app = app();

        let (status, issued) = send(&app, post_json("/api/tokens", "{}")).await;
        assert_eq!(status, StatusCode::OK);
        let lookup_id = issued["lookup_id"].as_str().unwrap().to_string();
        let share = issued["secret_share"].as_str().unwrap().to_string();

        let body = format!(r#"{{"lookup_id":"{lookup_id}"}}"#);
        let (status, redeemed) = send(&app, post_json("/api/redeem", &body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(redeemed["secret_share"], share.as_str());

        let (status, again) = send(&app, post_json("/api/redeem", &body)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(again["error"], NOT_FOUND_MESSAGE);
    }

    #[tokio::test]
    async fn absence_causes_are_indistinguishable() {
        let app = app();
        let unknown = LookupId::from_bytes(&[3; ID_BYTES]);

        let bodies = [
            format!(r#"{{"lookup_id":"{unknown}"}}"#),
            r#"{"lookup_id":"not-an-id"}"#.to_string(),
            r#"{"lookup_id":""}"#.to_string(),
        ];

        let mut responses = Vec::new();
        for body in &bodies {
            responses.push(send(&app, post_json("/api/redeem", body)).await);
        }

        for response in &responses {
            assert_eq!(response, &responses[0]);
        }
        assert_eq!(responses[0].0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ttl_out_of_range_is_bad_request() {
        let app = app();

        let (status, body) = send(&app, post_json("/api/tokens", r#"{"ttl_hours":0}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("ttl"));

        let (status, _) = send(&app, post_json("/api/tokens", r#"{"ttl_hours":721}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ttl_secs_takes_precedence() {
        let app = app();
        let now = SystemEnv::new().wall_clock_secs();

        let (status, body) =
            send(&app, post_json("/api/tokens", r#"{"ttl_hours":48,"ttl_secs":60}"#)).await;
        assert_eq!(status, StatusCode::OK);

        let expires_at = body["expires_at"].as_u64().unwrap();
        assert!((now + 60..=now + 62).contains(&expires_at));
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let (status, body) = send(&app(), post_json("/api/redeem", "{")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn rate_limit_applies_per_forwarded_client() {
        let app = app_with(MemoryStore::new(), 2);
        let from = |ip: &str| {
            let mut request = post_json("/api/tokens", "{}");
            request.headers_mut().insert("x-forwarded-for", HeaderValue::from_str(ip).unwrap());
            request
        };

        assert_eq!(send(&app, from("198.51.100.7")).await.0, StatusCode::OK);
        assert_eq!(send(&app, from("198.51.100.7, 10.0.0.1")).await.0, StatusCode::OK);

        let (status, body) = send(&app, from("198.51.100.7")).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(body["retry_after"].as_u64().unwrap() > 0);

        assert_eq!(send(&app, from("198.51.100.8")).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn health_is_not_rate_limited() {
        let app = app_with(MemoryStore::new(), 1);

        for _ in 0..5 {
            let request = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
            assert_eq!(app.clone().oneshot(request).await.unwrap().status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn storage_failure_is_internal_error() {
        let app = app_with(ChaoticStore::with_seed(MemoryStore::new(), 1.0, 9), 0);

        let (status, body) = send(&app, post_json("/api/tokens", "{}")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal error");
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let padding = "a".repeat(HttpConfig::default().max_body_bytes + 1);
        let body = format!(r#"{{"lookup_id":"{padding}"}}"#);

        let (status, _) = send(&app(), post_json("/api/redeem", &body)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn client_ip_resolution() {
        let peer = Some(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)));
        let mut headers = HeaderMap::new();

        assert_eq!(client_ip(&headers, peer, true), peer.unwrap());
        assert_eq!(client_ip(&headers, None, true), IpAddr::V4(Ipv4Addr::UNSPECIFIED));

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        assert_eq!(client_ip(&headers, peer, true), "203.0.113.9".parse::<IpAddr>().unwrap());
        assert_eq!(client_ip(&headers, peer, false), peer.unwrap());

        headers.insert("x-forwarded-for", HeaderValue::from_static("garbage"));
        assert_eq!(client_ip(&headers, peer, true), peer.unwrap());
    }

    #[test]
    fn redeemed_share_serializes_as_plain_string() {
        let share = SecretShare::from_bytes(&[5; ID_BYTES]);
        let json = serde_json::to_value(RedeemTokenResponse { secret_share: share.clone() }).unwrap();
        assert_eq!(json["secret_share"], share.as_str());
    }
}
