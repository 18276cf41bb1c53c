//! ---
//! rda_section: "05-networking-external-interfaces"
//! rda_subsection: "module"
//! rda_type: "source"
//! rda_scope: "code"
//! rda_description: "HTTP surface for settings management and the lockout check."
//! rda_version: "v0.1.0"
//! rda_owner: "tbd"
//! ---
//! REST API for dashboard access settings and the lockout check.

pub mod runtime;

use std::fmt;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use prometheus::{Encoder, Registry, TextEncoder};
use rda_common::version_string;
use rda_security::{
    LockoutError, LockoutGuard, LockoutOutcome, LockoutRequest, Operator, OperatorDirectory,
    RoleAlias, RoleRegistry, ADMIN_CAPABILITY, CUSTOM_CAPABILITY_SWITCH, LOCKOUT_NONCE_ACTION,
};
use rda_settings::sanitize::is_truthy;
use rda_settings::{AccessPolicyResolver, AccessSwitch, Settings};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use url::form_urlencoded;

pub use runtime::{open_store, Runtime};

/// Header carrying the calling operator's id.
pub const OPERATOR_HEADER: &str = "x-rda-operator";

/// Shared API state exposed to handlers.
pub struct ApiState {
    resolver: Arc<AccessPolicyResolver>,
    guard: LockoutGuard,
    operators: OperatorDirectory,
    roles: RoleRegistry,
    metrics: Option<Arc<Registry>>,
    start: Instant,
}

impl ApiState {
    pub fn new(
        resolver: Arc<AccessPolicyResolver>,
        guard: LockoutGuard,
        operators: OperatorDirectory,
        roles: RoleRegistry,
    ) -> Self {
        Self {
            resolver,
            guard,
            operators,
            roles,
            metrics: None,
            start: Instant::now(),
        }
    }

    /// Serve the registry's metrics at `/metrics`.
    #[must_use]
    pub fn with_metrics_registry(mut self, registry: Arc<Registry>) -> Self {
        self.metrics = Some(registry);
        self
    }

    fn operator(&self, headers: &HeaderMap) -> Result<&Operator, ApiError> {
        let id = headers
            .get(OPERATOR_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ApiError::new(StatusCode::FORBIDDEN, "operator not identified"))?;
        self.operators.get(id).ok_or_else(|| {
            warn!(operator = %id, "request from unknown operator");
            ApiError::new(StatusCode::FORBIDDEN, "unknown operator")
        })
    }

    /// Settings screens are limited to operators holding the admin capability.
    fn settings_manager(&self, headers: &HeaderMap) -> Result<&Operator, ApiError> {
        let operator = self.operator(headers)?;
        if operator.can(ADMIN_CAPABILITY) {
            Ok(operator)
        } else {
            warn!(operator = %operator.id, "operator may not manage dashboard access settings");
            Err(ApiError::new(
                StatusCode::FORBIDDEN,
                "insufficient permissions to manage settings",
            ))
        }
    }

    fn settings_view(&self, settings: &Settings) -> SettingsResponse {
        SettingsResponse {
            switch: settings.switch(self.resolver.aliases()),
            capability: self.resolver.capability_for(settings),
            settings: settings.clone(),
        }
    }
}

impl fmt::Debug for ApiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiState")
            .field("operators", &self.operators.len())
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

/// Handle to the running API server.
#[derive(Debug)]
pub struct ApiServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl ApiServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(err.into()),
        }
    }
}

/// Build the API router over the shared state.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/settings", get(get_settings).put(put_settings))
        .route("/api/settings/debug", get(get_settings_debug))
        .route("/api/capabilities", get(get_capabilities))
        .route("/api/lockout/nonce", get(get_lockout_nonce))
        .route("/api/lockout/check", post(post_lockout_check))
        .route("/api/login-message", get(get_login_message))
        .route("/metrics", get(get_metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind `addr` and serve the API until shut down.
pub fn spawn_api_server(state: Arc<ApiState>, addr: SocketAddr) -> Result<ApiServer> {
    let router = router(state);

    let listener = StdTcpListener::bind(addr)
        .with_context(|| format!("failed to bind API listener {addr}"))?;
    listener
        .set_nonblocking(true)
        .context("failed to configure API listener as non-blocking")?;
    let addr = listener
        .local_addr()
        .context("failed to read bound API address")?;
    let tcp_listener =
        TcpListener::from_std(listener).context("failed to create tokio listener")?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle: JoinHandle<Result<()>> = tokio::spawn(async move {
        info!(address = %addr, "api server listening");
        if let Err(err) = axum::serve(tcp_listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
        {
            error!(address = %addr, error = %err, "api server exited with error");
            return Err(err.into());
        }
        Ok(())
    });

    Ok(ApiServer {
        addr,
        shutdown: Some(shutdown_tx),
        task: handle,
    })
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    version: String,
    uptime_seconds: u64,
    operator_count: usize,
    capability: String,
}

#[derive(Debug, Serialize)]
struct SettingsResponse {
    settings: Settings,
    switch: AccessSwitch,
    capability: String,
}

#[derive(Debug, Serialize)]
struct DebugRow {
    key: &'static str,
    value: String,
}

#[derive(Debug, Serialize)]
struct AliasEntry {
    alias: RoleAlias,
    capability: String,
}

#[derive(Debug, Serialize)]
struct CapabilitiesResponse {
    aliases: Vec<AliasEntry>,
    custom_switch: &'static str,
    capabilities: Vec<String>,
}

#[derive(Debug, Serialize)]
struct NonceResponse {
    action: &'static str,
    nonce: String,
}

#[derive(Debug, Serialize)]
struct LockoutResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<LockoutData>,
}

#[derive(Debug, Serialize)]
struct LockoutData {
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    message: String,
}

impl LockoutResponse {
    fn allowed() -> Self {
        Self {
            success: true,
            data: None,
        }
    }

    fn failure(code: Option<&'static str>, message: String) -> Self {
        Self {
            success: false,
            data: Some(LockoutData { code, message }),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct DebugQuery {
    #[serde(default)]
    rda_debug: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

async fn get_status(State(state): State<Arc<ApiState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: version_string(),
        uptime_seconds: state.start.elapsed().as_secs(),
        operator_count: state.operators.len(),
        capability: state.resolver.capability(),
    })
}

async fn get_settings(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<Json<SettingsResponse>, ApiError> {
    state.settings_manager(&headers)?;
    Ok(Json(state.settings_view(&state.resolver.snapshot())))
}

async fn put_settings(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(submitted): Json<Map<String, Value>>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let operator = state.settings_manager(&headers)?;
    let saved = state.resolver.save(&submitted).map_err(|err| {
        error!(operator = %operator.id, error = %err, "failed to save settings");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    })?;
    Ok(Json(state.settings_view(&saved)))
}

async fn get_settings_debug(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Query(query): Query<DebugQuery>,
) -> Result<Json<Vec<DebugRow>>, ApiError> {
    state.settings_manager(&headers)?;
    let enabled = query
        .rda_debug
        .is_some_and(|flag| is_truthy(&Value::String(flag)));
    if !enabled {
        return Err(ApiError::new(StatusCode::NOT_FOUND, "debug output disabled"));
    }
    let rows = state
        .resolver
        .debug_rows()
        .into_iter()
        .map(|(key, value)| DebugRow { key, value })
        .collect();
    Ok(Json(rows))
}

async fn get_capabilities(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<Json<CapabilitiesResponse>, ApiError> {
    state.settings_manager(&headers)?;
    let aliases = state
        .resolver
        .aliases()
        .entries()
        .into_iter()
        .map(|(alias, capability)| AliasEntry { alias, capability })
        .collect();
    Ok(Json(CapabilitiesResponse {
        aliases,
        custom_switch: CUSTOM_CAPABILITY_SWITCH,
        capabilities: state.roles.available_capabilities(),
    }))
}

async fn get_lockout_nonce(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<Json<NonceResponse>, ApiError> {
    let operator = state.operator(&headers)?;
    Ok(Json(NonceResponse {
        action: LOCKOUT_NONCE_ACTION,
        nonce: state.guard.issue_token(operator),
    }))
}

async fn post_lockout_check(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<LockoutResponse>), ApiError> {
    let operator = state.operator(&headers)?;
    let request = decode_lockout_request(&headers, &body);
    let response = match state.guard.check(&request, operator) {
        Ok(LockoutOutcome::Allowed) => (StatusCode::OK, LockoutResponse::allowed()),
        Ok(LockoutOutcome::Warning(warning)) => (
            StatusCode::OK,
            LockoutResponse::failure(None, warning.html_message()),
        ),
        Err(err @ LockoutError::ForbiddenRequest) => (
            StatusCode::FORBIDDEN,
            LockoutResponse::failure(Some(err.code()), err.to_string()),
        ),
        Err(err) => (
            StatusCode::OK,
            LockoutResponse::failure(Some(err.code()), err.to_string()),
        ),
    };
    Ok((response.0, Json(response.1)))
}

/// Read `cap`, `switch` and `nonce` from a JSON or form-encoded body.
///
/// Undecodable bodies yield an empty request so the token check still runs first.
fn decode_lockout_request(headers: &HeaderMap, body: &[u8]) -> LockoutRequest {
    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));
    if !is_form {
        if let Ok(Value::Object(fields)) = serde_json::from_slice::<Value>(body) {
            let text = |key: &str| match fields.get(key) {
                Some(Value::String(value)) => Some(value.clone()),
                Some(Value::Number(value)) => Some(value.to_string()),
                Some(Value::Bool(value)) => Some(value.to_string()),
                _ => None,
            };
            return LockoutRequest {
                cap: text("cap"),
                switch: text("switch"),
                nonce: text("nonce"),
            };
        }
    }
    let mut request = LockoutRequest::default();
    for (key, value) in form_urlencoded::parse(body) {
        match key.as_ref() {
            "cap" => request.cap = Some(value.into_owned()),
            "switch" => request.switch = Some(value.into_owned()),
            "nonce" => request.nonce = Some(value.into_owned()),
            _ => {}
        }
    }
    request
}

async fn get_login_message(State(state): State<Arc<ApiState>>) -> Html<String> {
    Html(state.resolver.login_message(""))
}

async fn get_metrics(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    let registry = state
        .metrics
        .as_ref()
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "metrics disabled"))?;
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&registry.gather(), &mut buffer)
        .map_err(|err| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, encoder.format_type().to_owned())],
        buffer,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use rda_security::{CapabilityAliases, CapabilitySet, LockoutMetrics, NonceIssuer};
    use rda_settings::MemoryStore;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;

    fn state() -> Arc<ApiState> {
        let resolver = AccessPolicyResolver::initialize(
            Arc::new(MemoryStore::new()),
            "https://example.org/",
            CapabilityAliases::default(),
        )
        .unwrap();
        let nonces = NonceIssuer::new(b"api-test-secret", Duration::from_secs(3600)).unwrap();
        let registry = Arc::new(Registry::new());
        let metrics = LockoutMetrics::new(Arc::clone(&registry)).unwrap();
        let guard = LockoutGuard::new(CapabilityAliases::default(), Arc::new(nonces))
            .with_metrics(metrics);
        let roles = RoleRegistry::default();
        let mut operators = OperatorDirectory::new();
        operators.insert(Operator::new(
            "admin",
            roles.capabilities_for(&["administrator".to_owned()]).unwrap(),
        ));
        operators.insert(Operator::new(
            "editor",
            roles.capabilities_for(&["editor".to_owned()]).unwrap(),
        ));
        operators.insert(Operator::new("nobody", CapabilitySet::new()));
        Arc::new(
            ApiState::new(Arc::new(resolver), guard, operators, roles)
                .with_metrics_registry(registry),
        )
    }

    async fn call(
        state: &Arc<ApiState>,
        method: &str,
        uri: &str,
        operator: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(operator) = operator {
            builder = builder.header(OPERATOR_HEADER, operator);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router(Arc::clone(state)).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn nonce_for(state: &Arc<ApiState>, operator: &str) -> String {
        let (status, body) = call(state, "GET", "/api/lockout/nonce", Some(operator), None).await;
        assert_eq!(status, StatusCode::OK);
        body["nonce"].as_str().unwrap().to_owned()
    }

    #[tokio::test]
    async fn unknown_operator_is_forbidden() {
        let state = state();
        let (status, _) = call(&state, "GET", "/api/settings", Some("mallory"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = call(&state, "GET", "/api/lockout/nonce", None, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn settings_require_admin_capability() {
        let state = state();
        let (status, _) = call(&state, "GET", "/api/settings", Some("editor"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, body) = call(&state, "GET", "/api/settings", Some("admin"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["capability"], "manage_options");
        assert_eq!(body["switch"], json!({"kind": "alias", "value": "admin"}));
    }

    #[tokio::test]
    async fn put_settings_runs_save_pipeline() {
        let state = state();
        let (status, body) = call(
            &state,
            "PUT",
            "/api/settings",
            Some("admin"),
            Some(json!({
                "rda_access_switch": "publish_posts",
                "rda_access_cap": "",
                "rda_redirect_url": "javascript:alert(1)",
                "rda_enable_profile": "1",
                "rda_login_message": "<em>Closed</em>"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["capability"], "publish_posts");
        assert_eq!(body["settings"]["redirect_url"], "https://example.org/");
        assert_eq!(body["settings"]["login_message"], "Closed");
    }

    #[tokio::test]
    async fn debug_rows_need_truthy_flag() {
        let state = state();
        let (status, _) = call(&state, "GET", "/api/settings/debug", Some("admin"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) =
            call(&state, "GET", "/api/settings/debug?rda_debug=0", Some("admin"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, body) =
            call(&state, "GET", "/api/settings/debug?rda_debug=1", Some("admin"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0], json!({"key": "access_switch", "value": "manage_options"}));
    }

    #[tokio::test]
    async fn capabilities_exclude_user_levels() {
        let state = state();
        let (status, body) = call(&state, "GET", "/api/capabilities", Some("admin"), None).await;
        assert_eq!(status, StatusCode::OK);
        let caps: Vec<&str> = body["capabilities"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert!(caps.contains(&"manage_options"));
        assert!(!caps.iter().any(|cap| cap.starts_with("level_")));
        assert_eq!(body["aliases"][1], json!({"alias": "editor", "capability": "edit_others_posts"}));
        assert_eq!(body["custom_switch"], "capability");
    }

    #[tokio::test]
    async fn lockout_check_responses() {
        let state = state();

        let nonce = nonce_for(&state, "admin").await;
        let (status, body) = call(
            &state,
            "POST",
            "/api/lockout/check",
            Some("admin"),
            Some(json!({"cap": "manage_options", "switch": "manage_options", "nonce": nonce})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true}));

        let nonce = nonce_for(&state, "editor").await;
        let (status, body) = call(
            &state,
            "POST",
            "/api/lockout/check",
            Some("editor"),
            Some(json!({"cap": "manage_options", "switch": "manage_options", "nonce": nonce})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert!(body["data"]["message"]
            .as_str()
            .unwrap()
            .contains("<code>manage_options</code>"));

        let (_, body) = call(
            &state,
            "POST",
            "/api/lockout/check",
            Some("editor"),
            Some(json!({"switch": "manage_options", "nonce": nonce})),
        )
        .await;
        assert_eq!(body["data"]["code"], "missing_cap");

        let (_, body) = call(
            &state,
            "POST",
            "/api/lockout/check",
            Some("editor"),
            Some(json!({"cap": "manage_options", "nonce": nonce})),
        )
        .await;
        assert_eq!(body["data"]["code"], "missing_switch");
    }

    #[tokio::test]
    async fn lockout_check_rejects_foreign_nonce() {
        let state = state();
        let nonce = nonce_for(&state, "admin").await;
        let (status, body) = call(
            &state,
            "POST",
            "/api/lockout/check",
            Some("nobody"),
            Some(json!({"cap": "read", "switch": "capability", "nonce": nonce})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["success"], false);
        assert_eq!(body["data"]["code"], "forbidden");
    }

    async fn post_raw(
        state: &Arc<ApiState>,
        operator: &str,
        content_type: Option<&str>,
        body: &str,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/lockout/check")
            .header(OPERATOR_HEADER, operator);
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        let request = builder.body(Body::from(body.to_owned())).unwrap();
        let response = router(Arc::clone(state)).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn lockout_check_verifies_token_before_body_shape() {
        let state = state();
        for (content_type, body) in [
            (None, ""),
            (Some("application/json"), r#"{"cap": 5}"#),
            (Some("application/json"), "{not json"),
            (
                Some("application/x-www-form-urlencoded"),
                "cap=manage_options&switch=manage_options",
            ),
        ] {
            let (status, response) = post_raw(&state, "editor", content_type, body).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "body {body:?}");
            assert_eq!(response["success"], false);
            assert_eq!(response["data"]["code"], "forbidden");
        }
    }

    #[tokio::test]
    async fn lockout_check_accepts_form_encoded_body() {
        let state = state();
        let nonce = nonce_for(&state, "editor").await;
        let (status, body) = post_raw(
            &state,
            "editor",
            Some("application/x-www-form-urlencoded"),
            &format!("cap=manage_options&switch=manage_options&nonce={nonce}"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["message"]
            .as_str()
            .unwrap()
            .contains("<code>manage_options</code>"));

        let (status, body) = post_raw(
            &state,
            "editor",
            None,
            &format!("cap=edit_others_posts&switch=edit_others_posts&nonce={nonce}"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true}));
    }

    #[tokio::test]
    async fn login_message_ignores_query_markup() {
        let state = state();
        let request = Request::builder()
            .uri("/api/login-message?existing=%3Cscript%3Ealert(1)%3C%2Fscript%3E")
            .body(Body::empty())
            .unwrap();
        let response = router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let markup = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!markup.contains("<script>"));
        assert_eq!(
            markup,
            "<p class=\"message\">This site is in maintenance mode.</p>"
        );
    }

    #[tokio::test]
    async fn login_message_is_public_markup() {
        let state = state();
        let request = Request::builder()
            .uri("/api/login-message")
            .body(Body::empty())
            .unwrap();
        let response = router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(
            String::from_utf8(bytes.to_vec()).unwrap(),
            "<p class=\"message\">This site is in maintenance mode.</p>"
        );
    }

    #[tokio::test]
    async fn metrics_reflect_lockout_checks() {
        let state = state();
        call(
            &state,
            "POST",
            "/api/lockout/check",
            Some("admin"),
            Some(json!({"cap": "read", "switch": "capability"})),
        )
        .await;
        let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let response = router(state).oneshot(request).await.unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("lockout_checks_total 1"));
        assert!(text.contains("lockout_forbidden_total 1"));
    }
}
