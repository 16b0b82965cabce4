use std::net::SocketAddr;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::response::ApiResponse;
use crate::state::AppState;
use crate::{auth, slips, users};

pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.client_url);

    Router::new()
        .route("/", get(root))
        .nest(
            "/api",
            Router::new()
                .merge(auth::router())
                .merge(users::router())
                .merge(slips::router())
                .route("/health", get(health)),
        )
        .fallback(not_found)
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);
    match origin.parse::<HeaderValue>() {
        Ok(value) => layer.allow_origin(value),
        Err(_) => {
            tracing::warn!(%origin, "invalid CLIENT_URL; cross-origin requests disabled");
            layer
        }
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Welcome to Check Slip API",
        "status": "Server is running",
        "timestamp": now_rfc3339(),
    }))
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let (status, database) = match state.users.ping().await {
        Ok(()) => (StatusCode::OK, "Connected"),
        Err(e) => {
            tracing::error!(error = %e, "health check: database unreachable");
            (StatusCode::SERVICE_UNAVAILABLE, "Disconnected")
        }
    };
    let label = if status == StatusCode::OK { "OK" } else { "DEGRADED" };
    (
        status,
        Json(json!({
            "status": label,
            "database": database,
            "timestamp": now_rfc3339(),
        })),
    )
}

async fn not_found() -> (StatusCode, Json<ApiResponse<()>>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::error("Route not found")),
    )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "3000".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::config::SeedAdmin;
    use crate::testing::fake_state;

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);
        let res = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn login(app: &Router, email: &str, password: &str) -> String {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": email, "password": password})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"]["token"].as_str().unwrap().to_string()
    }

    async fn app_with_admin() -> (Router, String) {
        let state = fake_state();
        crate::db::seed_admin(
            state.users.as_ref(),
            &SeedAdmin {
                username: "admin".into(),
                email: "admin@x.com".into(),
                password: "admin123".into(),
            },
        )
        .await
        .unwrap();
        let app = build_app(state);
        let token = login(&app, "admin@x.com", "admin123").await;
        (app, token)
    }

    async fn register_user(app: &Router, username: &str) -> (String, String) {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "username": username,
                "email": format!("{username}@x.com"),
                "password": "secret123"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (
            body["data"]["user"]["id"].as_str().unwrap().to_string(),
            body["data"]["token"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn admin_login_and_me() {
        let (app, token) = app_with_admin().await;
        let (status, body) = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["user"]["role"], "admin");
        assert_eq!(body["data"]["user"]["email"], "admin@x.com");
        assert!(body["data"]["user"].get("passwordHash").is_none());
    }

    #[tokio::test]
    async fn slip_submit_and_reject_flow() {
        let (app, admin_token) = app_with_admin().await;
        let (user_id, user_token) = register_user(&app, "payer").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/slips",
            Some(&user_token),
            Some(json!({
                "slipNumber": "S-1",
                "amount": 100,
                "imageRef": {"url": "https://cdn.example.com/s1.jpg", "providerId": "ext/s1"},
                "createdBy": "00000000-0000-0000-0000-000000000000"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["data"]["status"], "pending");
        assert_eq!(body["data"]["createdBy"], user_id.as_str());
        let slip_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/api/slips/{slip_id}/resolve"),
            Some(&admin_token),
            Some(json!({"decision": "rejected", "notes": "illegible"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let (status, body) = send(
            &app,
            Method::GET,
            &format!("/api/slips/{slip_id}"),
            Some(&admin_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, me) = send(&app, Method::GET, "/api/auth/me", Some(&admin_token), None).await;
        assert_eq!(body["data"]["status"], "rejected");
        assert_eq!(body["data"]["verifiedBy"], me["data"]["user"]["id"]);
        assert_eq!(body["data"]["notes"], "illegible");
        assert_eq!(body["data"]["creator"]["username"], "payer");

        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/api/slips/{slip_id}/resolve"),
            Some(&admin_token),
            Some(json!({"decision": "verified"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);

        let (status, body) =
            send(&app, Method::GET, "/api/slips/stats", Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!({"total": 1, "pending": 0, "verified": 0, "rejected": 1}));
    }

    #[tokio::test]
    async fn non_admin_is_forbidden_from_admin_routes() {
        let (app, _) = app_with_admin().await;
        let (_, user_token) = register_user(&app, "plain").await;

        for (method, uri) in [
            (Method::GET, "/api/auth/users"),
            (Method::GET, "/api/slips"),
            (Method::GET, "/api/slips/stats"),
            (Method::GET, "/api/slips/pending"),
        ] {
            let (status, body) = send(&app, method, uri, Some(&user_token), None).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
            assert_eq!(body["success"], false);
        }
    }

    #[tokio::test]
    async fn missing_or_bad_token_is_unauthenticated() {
        let (app, _) = app_with_admin().await;
        let (status, body) = send(&app, Method::GET, "/api/auth/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let (status, _) = send(&app, Method::GET, "/api/auth/me", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_failures_share_one_shape() {
        let (app, _) = app_with_admin().await;
        let (s1, b1) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "admin@x.com", "password": "wrong-password"})),
        )
        .await;
        let (s2, b2) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "nobody@x.com", "password": "admin123"})),
        )
        .await;
        assert_eq!(s1, StatusCode::UNAUTHORIZED);
        assert_eq!(s1, s2);
        assert_eq!(b1, b2);
    }

    #[tokio::test]
    async fn admin_role_registration_requires_admin_caller() {
        let (app, admin_token) = app_with_admin().await;
        let body = json!({
            "username": "sneaky",
            "email": "sneaky@x.com",
            "password": "secret123",
            "role": "admin"
        });

        let (status, _) =
            send(&app, Method::POST, "/api/auth/register", None, Some(body.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, user_token) = register_user(&app, "plain").await;
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/auth/register",
            Some(&user_token),
            Some(body.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, out) =
            send(&app, Method::POST, "/api/auth/register", Some(&admin_token), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(out["data"]["user"]["role"], "admin");
    }

    #[tokio::test]
    async fn admin_self_protection_over_http() {
        let (app, admin_token) = app_with_admin().await;
        let (_, me) = send(&app, Method::GET, "/api/auth/me", Some(&admin_token), None).await;
        let my_id = me["data"]["user"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/api/auth/users/{my_id}/role"),
            Some(&admin_token),
            Some(json!({"role": "user"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "You cannot change your own role");

        let (status, _) = send(
            &app,
            Method::DELETE,
            &format!("/api/auth/users/{my_id}"),
            Some(&admin_token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) =
            send(&app, Method::GET, "/api/auth/users", Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let (app, _) = app_with_admin().await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"username": "other", "email": "ADMIN@X.COM", "password": "secret123"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "email already exists");
    }

    #[tokio::test]
    async fn unknown_route_and_health() {
        let app = build_app(fake_state());
        let (status, body) = send(&app, Method::GET, "/api/nope", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"success": false, "message": "Route not found"}));

        let (status, body) = send(&app, Method::GET, "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "OK");
    }

    async fn assert_bad_request(
        app: &Router,
        method: Method,
        uri: &str,
        token: &str,
        body: Option<Value>,
    ) -> Value {
        let (status, out) = send(app, method, uri, Some(token), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}: {out}");
        assert_eq!(out["success"], false, "{uri}");
        assert!(out["message"].as_str().is_some_and(|m| !m.is_empty()), "{uri}");
        out
    }

    #[tokio::test]
    async fn malformed_input_gets_the_error_envelope() {
        let (app, admin_token) = app_with_admin().await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "a@x.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().contains("password"));

        let id = uuid::Uuid::new_v4();
        assert_bad_request(
            &app,
            Method::PUT,
            &format!("/api/slips/{id}/resolve"),
            &admin_token,
            Some(json!({"decision": "pending"})),
        )
        .await;
        assert_bad_request(&app, Method::GET, "/api/slips/not-a-uuid", &admin_token, None).await;
        assert_bad_request(
            &app,
            Method::DELETE,
            "/api/auth/users/not-a-uuid",
            &admin_token,
            None,
        )
        .await;
        assert_bad_request(&app, Method::GET, "/api/slips?status=bogus", &admin_token, None).await;
        assert_bad_request(&app, Method::GET, "/api/slips/mine?limit=many", &admin_token, None)
            .await;
        assert_bad_request(
            &app,
            Method::POST,
            "/api/slips",
            &admin_token,
            Some(json!({"slipNumber": "S-1", "amount": "lots"})),
        )
        .await;
    }

    #[tokio::test]
    async fn upload_without_multipart_body_gets_the_error_envelope() {
        let (app, admin_token) = app_with_admin().await;
        assert_bad_request(
            &app,
            Method::POST,
            "/api/slips/upload",
            &admin_token,
            Some(json!({"slipNumber": "S-1"})),
        )
        .await;
    }

    #[tokio::test]
    async fn submitted_image_ref_cannot_claim_an_upload_key() {
        let (app, _) = app_with_admin().await;
        let (user_id, user_token) = register_user(&app, "payer").await;
        let body = assert_bad_request(
            &app,
            Method::POST,
            "/api/slips",
            &user_token,
            Some(json!({
                "slipNumber": "S-1",
                "amount": 10,
                "imageRef": {
                    "url": "https://fake.local/x.jpg",
                    "providerId": format!("slips/{user_id}/x.jpg")
                }
            })),
        )
        .await;
        assert_eq!(body["message"], "Image provider id is reserved for uploaded files");
    }

    #[tokio::test]
    async fn stale_token_does_not_block_plain_registration() {
        let (app, _) = app_with_admin().await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/register",
            Some("expired-or-garbage"),
            Some(json!({"username": "fresh", "email": "fresh@x.com", "password": "secret123"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["data"]["user"]["role"], "user");

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/auth/register",
            Some("expired-or-garbage"),
            Some(json!({
                "username": "grab",
                "email": "grab@x.com",
                "password": "secret123",
                "role": "admin"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_slip_is_forbidden_for_plain_users() {
        let (app, admin_token) = app_with_admin().await;
        let (_, user_token) = register_user(&app, "plain").await;
        let uri = format!("/api/slips/{}", uuid::Uuid::new_v4());

        let (status, _) = send(&app, Method::GET, &uri, Some(&user_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, body) = send(&app, Method::GET, &uri, Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Slip not found");
    }
}
