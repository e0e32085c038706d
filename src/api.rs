use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::authenticator::Authenticator;
use crate::config::Config;
use crate::error::DnsPodError;
use crate::provider;

pub struct AppState {
    pub key: Option<String>,
    pub authenticator: Authenticator,
}

#[derive(Serialize)]
struct ApiResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    record_id: Option<u64>,
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

#[derive(Deserialize)]
struct KeyQuery {
    key: Option<String>,
}

/// Body sent by httpreq-style ACME clients.
#[derive(Deserialize)]
struct ChallengeRequest {
    fqdn: String,
    value: String,
}

pub fn create_router(config: Config) -> Router {
    let state = Arc::new(AppState {
        key: config.server.key,
        authenticator: Authenticator::new(config.dnspod),
    });

    Router::new()
        .route("/present", post(present))
        .route("/cleanup", post(cleanup))
        .route("/health", get(health_check))
        .layer(middleware::from_fn(access_log))
        .with_state(state)
}

async fn access_log(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let ip = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or("-").trim().to_string())
        .or_else(|| {
            request
                .headers()
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| "-".to_string());

    let response = next.run(request).await;

    // The query string may carry the access key, so only the path is logged
    info!(
        target: "access",
        "{} {} \"{}\" {} {} {:.3}ms",
        method,
        path,
        user_agent,
        ip,
        response.status().as_u16(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    response
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok"
    }))
}

async fn present(
    State(state): State<Arc<AppState>>,
    Query(query): Query<KeyQuery>,
    Json(body): Json<ChallengeRequest>,
) -> Response {
    let (domain, validation_name) = match authorize(&state, &query, &body) {
        Ok(target) => target,
        Err(response) => return response,
    };

    match state
        .authenticator
        .perform(&domain, &validation_name, &body.value)
        .await
    {
        Ok(record_id) => (
            StatusCode::OK,
            Json(ApiResponse {
                success: true,
                message: format!("Created TXT record {}", validation_name),
                record_id: Some(record_id),
            }),
        )
            .into_response(),
        Err(e) => error_response("present", e),
    }
}

async fn cleanup(
    State(state): State<Arc<AppState>>,
    Query(query): Query<KeyQuery>,
    Json(body): Json<ChallengeRequest>,
) -> Response {
    let (domain, validation_name) = match authorize(&state, &query, &body) {
        Ok(target) => target,
        Err(response) => return response,
    };

    match state
        .authenticator
        .cleanup(&domain, &validation_name, &body.value)
        .await
    {
        Ok(deleted) => (
            StatusCode::OK,
            Json(ApiResponse {
                success: true,
                message: format!("Deleted {} TXT record(s) for {}", deleted, validation_name),
                record_id: None,
            }),
        )
            .into_response(),
        Err(e) => error_response("cleanup", e),
    }
}

/// Check the access key and split the fqdn into (domain, validation name).
fn authorize(
    state: &AppState,
    query: &KeyQuery,
    body: &ChallengeRequest,
) -> Result<(String, String), Response> {
    if let Some(ref config_key) = state.key {
        let request_key = query.key.as_deref().unwrap_or("");
        if request_key != config_key {
            warn!("Invalid key for challenge request on {}", body.fqdn);
            return Err(failure(StatusCode::UNAUTHORIZED, "Invalid key".to_string()));
        }
    }

    match provider::domain_from_validation_name(&body.fqdn) {
        Some(domain) => {
            let validation_name = provider::validation_name(&domain);
            Ok((domain, validation_name))
        }
        None => Err(failure(
            StatusCode::BAD_REQUEST,
            format!("Not an ACME challenge record name: {}", body.fqdn),
        )),
    }
}

fn error_response(operation: &str, e: DnsPodError) -> Response {
    error!("Challenge {} failed: {}", operation, e);

    let status = match e {
        DnsPodError::ZoneNotFound { .. } => StatusCode::NOT_FOUND,
        DnsPodError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_GATEWAY,
    };
    failure(status, format!("Challenge {} failed: {}", operation, e))
}

fn failure(status: StatusCode, error: String) -> Response {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error,
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DnsPodConfig, ServerConfig};
    use crate::provider::dnspod::tests::{credentials, mount_zones, ok, options};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer};

    fn config(server: &MockServer, key: Option<&str>) -> Config {
        Config {
            server: ServerConfig {
                key: key.map(str::to_string),
                ..ServerConfig::default()
            },
            dnspod: DnsPodConfig {
                credentials: credentials(),
                api: options(server),
                propagation_seconds: 0,
            },
        }
    }

    fn challenge(uri: &str, fqdn: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(
                json!({ "fqdn": fqdn, "value": "TOKEN123" }).to_string(),
            ))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        let app = create_router(config(&server, None));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_present_rejects_invalid_key() {
        let server = MockServer::start().await;
        let app = create_router(config(&server, Some("hook-key")));

        let response = app
            .oneshot(challenge("/present?key=wrong", "_acme-challenge.example.com."))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_present_rejects_non_challenge_fqdn() {
        let server = MockServer::start().await;
        let app = create_router(config(&server, None));

        let response = app
            .oneshot(challenge("/present", "www.example.com."))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_present_creates_record() {
        let server = MockServer::start().await;
        mount_zones(&server, json!([{ "DomainId": 1, "Name": "example.com" }])).await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "CreateTXTRecord"))
            .respond_with(ok(json!({ "RecordId": 42 })))
            .expect(1)
            .mount(&server)
            .await;

        let app = create_router(config(&server, Some("hook-key")));
        let response = app
            .oneshot(challenge("/present?key=hook-key", "_acme-challenge.example.com."))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["record_id"], 42);
    }

    #[tokio::test]
    async fn test_cleanup_unknown_zone_is_not_found() {
        let server = MockServer::start().await;
        mount_zones(&server, json!([{ "DomainId": 1, "Name": "example.com" }])).await;

        let app = create_router(config(&server, None));
        let response = app
            .oneshot(challenge("/cleanup", "_acme-challenge.example.org."))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("example.org"));
    }
}
