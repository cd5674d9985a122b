// HTTP Server Module - Web UI and API endpoints
use anyhow::Result;
use async_stream::stream;
use axum::{
    extract::{Json, Request, State},
    http::{
        header::{AUTHORIZATION, WWW_AUTHENTICATE},
        StatusCode,
    },
    middleware::{self, Next},
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        Html, IntoResponse, Response,
    },
    routing::{get, post},
    Router,
};
use base64::{engine::general_purpose, Engine as _};
use futures::stream::Stream;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::config::LatticeConfig;
use crate::demo;
use crate::engine::{LatticeEngine, PhaseEvent};
use crate::estimator;
use crate::llm::FilterClient;

const WEB_UI_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>hexlattice</title>
    <style>
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: #0a0a0a;
            color: #e0e0e0;
            display: flex;
            flex-direction: column;
            align-items: center;
            padding-top: 40px;
            gap: 16px;
        }
        h1 { font-size: 1.2em; font-weight: 500; color: #9a9a9a; }
        #mode { color: #00aaff; }
        svg { cursor: pointer; }
        #hint { color: #555; font-size: 0.85em; }
    </style>
</head>
<body>
    <h1>hexagon lattice &mdash; <span id="mode">filter</span></h1>
    <svg id="lattice" xmlns="http://www.w3.org/2000/svg"></svg>
    <div id="hint">click the lattice to run the sequence</div>
    <script>
        const svg = document.getElementById('lattice');
        const modeEl = document.getElementById('mode');
        let dotCount = -1;

        function rgba(c) {
            return `rgba(${c.r}, ${c.g}, ${c.b}, ${c.a})`;
        }

        function rebuild(state) {
            svg.setAttribute('width', state.width);
            svg.setAttribute('height', state.height);
            svg.setAttribute('viewBox', `0 0 ${state.width} ${state.height}`);
            svg.innerHTML = '';

            const line = document.createElementNS(svg.namespaceURI, 'line');
            line.setAttribute('id', 'progress');
            line.setAttribute('y1', 30);
            line.setAttribute('y2', 30);
            line.setAttribute('stroke', 'white');
            line.setAttribute('stroke-width', 2);
            svg.appendChild(line);

            for (const dot of state.dots) {
                svg.appendChild(document.createElementNS(svg.namespaceURI, 'circle'));
            }
            dotCount = state.dots.length;
        }

        function render(state) {
            if (state.dots.length !== dotCount) rebuild(state);
            modeEl.textContent = state.mode;

            const line = svg.querySelector('#progress');
            const x0 = state.width / 6;
            const x1 = x0 + (state.width - 2 * x0) * state.progress;
            line.setAttribute('x1', x0);
            line.setAttribute('x2', state.show_progress ? x1 : x0);
            line.setAttribute('opacity', state.show_progress ? 1 : 0);

            const circles = svg.querySelectorAll('circle');
            state.dots.forEach((dot, i) => {
                const c = circles[i];
                c.setAttribute('cx', dot.x);
                c.setAttribute('cy', dot.y);
                c.setAttribute('r', dot.radius);
                c.setAttribute('fill', rgba(dot.fill));
                c.setAttribute('stroke', rgba(dot.stroke));
                c.setAttribute('stroke-width', dot.stroke_width);
                c.setAttribute('opacity', dot.opacity);
                c.style.transition = dot.transition_css;
            });
        }

        async function refresh() {
            try {
                const state = await (await fetch('/api/state')).json();
                render(state);
            } catch (e) { /* server restarting; keep polling */ }
        }

        svg.addEventListener('click', () => fetch('/api/activate', { method: 'POST' }));
        setInterval(refresh, 100);
        refresh();
    </script>
</body>
</html>"#;

/// Everything the handlers need. The engine is the same instance the
/// terminal loop drives; handlers only take the lock briefly.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Mutex<LatticeEngine>>,
    pub config_change_tx: broadcast::Sender<()>,
    pub phase_tx: broadcast::Sender<PhaseEvent>,
    pub client: FilterClient,
    pub demo_item_delay: Duration,
}

async fn serve_index() -> impl IntoResponse {
    Html(WEB_UI_HTML)
}

async fn get_state(State(state): State<AppState>) -> impl IntoResponse {
    let mut engine = state.engine.lock().unwrap();
    for event in engine.tick() {
        let _ = state.phase_tx.send(event);
    }
    Json(engine.snapshot()).into_response()
}

async fn post_activate(State(state): State<AppState>) -> impl IntoResponse {
    let started = state.engine.lock().unwrap().activate();
    Json(serde_json::json!({ "started": started }))
}

async fn get_config() -> impl IntoResponse {
    match LatticeConfig::load() {
        Ok(config) => (StatusCode::OK, Json(config)).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn update_config(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    let current = match LatticeConfig::load() {
        Ok(config) => config,
        Err(_) => LatticeConfig::default(),
    };

    // Overlay the provided fields onto the current config, then reparse so
    // unknown keys and type mismatches are rejected in one place.
    let mut merged = match serde_json::to_value(&current) {
        Ok(value) => value,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };
    let Some(updates) = payload.as_object() else {
        return (StatusCode::BAD_REQUEST, "Expected a JSON object").into_response();
    };
    if let Some(map) = merged.as_object_mut() {
        for (key, value) in updates {
            if !map.contains_key(key) {
                return (StatusCode::BAD_REQUEST, format!("Unknown field: {}", key))
                    .into_response();
            }
            map.insert(key.clone(), value.clone());
        }
    }

    let mut updated: LatticeConfig = match serde_json::from_value(merged) {
        Ok(config) => config,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    updated.config_path = current.config_path.clone();
    updated.sanitize();

    match updated.save() {
        Ok(()) => {
            // The file watcher also fires, but notify everyone directly in
            // case the watch is unavailable on this platform.
            let _ = state.config_change_tx.send(());
            (StatusCode::OK, "Configuration updated").into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let mut phase_rx = state.phase_tx.subscribe();
    let mut config_rx = state.config_change_tx.subscribe();

    let event_stream = stream! {
        loop {
            let event = tokio::select! {
                phase = phase_rx.recv() => match phase {
                    Ok(event) => {
                        let data = serde_json::to_string(&event).unwrap_or_default();
                        Some(SseEvent::default().event("phase").data(data))
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => None,
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                changed = config_rx.recv() => match changed {
                    Ok(()) => Some(SseEvent::default().event("config-changed").data("reload")),
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        Some(SseEvent::default().event("config-changed").data("reload"))
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };
            if let Some(event) = event {
                yield Ok(event);
            }
        }
    };

    Sse::new(event_stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[derive(Deserialize)]
struct FilterRequest {
    prompt: Option<String>,
    content: Option<String>,
}

/// The filter proxy: relay one prompt/content pair to the hosted model and
/// hand back its short verdict. Empty fields count as missing.
async fn post_filter(
    State(state): State<AppState>,
    Json(payload): Json<FilterRequest>,
) -> impl IntoResponse {
    let prompt = payload.prompt.unwrap_or_default();
    let content = payload.content.unwrap_or_default();
    if prompt.is_empty() || content.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Missing prompt or content" })),
        )
            .into_response();
    }

    match state.client.classify(&prompt, &content).await {
        Ok(result) => (StatusCode::OK, Json(serde_json::json!({ "result": result }))).into_response(),
        Err(e) => {
            eprintln!("Filter upstream error: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Failed to process filter request" })),
            )
                .into_response()
        }
    }
}

async fn get_usecases() -> impl IntoResponse {
    Json(demo::USE_CASES)
}

#[derive(Deserialize)]
struct DemoFilterRequest {
    use_case: String,
    prompt: Option<String>,
    /// A suggestion chip; expanded to "Is this <suggestion>?" when no
    /// explicit prompt is given.
    suggestion: Option<String>,
}

async fn post_demo_filter(
    State(state): State<AppState>,
    Json(payload): Json<DemoFilterRequest>,
) -> impl IntoResponse {
    let Some(use_case) = demo::find_use_case(&payload.use_case) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Unknown use case" })),
        )
            .into_response();
    };

    let prompt = match (&payload.prompt, &payload.suggestion) {
        (Some(prompt), _) if !prompt.trim().is_empty() => prompt.clone(),
        (_, Some(suggestion)) if !suggestion.trim().is_empty() => {
            demo::suggestion_prompt(suggestion.trim())
        }
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "Missing prompt" })),
            )
                .into_response();
        }
    };

    let mut rng = StdRng::from_entropy();
    let results = demo::run_filter(
        &state.client,
        use_case,
        &prompt,
        state.demo_item_delay,
        &mut rng,
    )
    .await;
    (StatusCode::OK, Json(serde_json::json!({ "results": results }))).into_response()
}

#[derive(Deserialize)]
struct EstimateRequest {
    use_case: String,
    model: String,
    custom_prompt: Option<String>,
}

async fn post_estimate(Json(payload): Json<EstimateRequest>) -> impl IntoResponse {
    let Some(use_case) = estimator::find_use_case(&payload.use_case) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Unknown use case" })),
        )
            .into_response();
    };
    let Some(model) = estimator::find_model(&payload.model) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Unknown model" })),
        )
            .into_response();
    };

    let breakdown = estimator::estimate(use_case, model, payload.custom_prompt.as_deref());
    (StatusCode::OK, Json(breakdown)).into_response()
}

async fn basic_auth_middleware(req: Request, next: Next) -> Result<Response, StatusCode> {
    // Load config to check if auth is enabled
    let config = match LatticeConfig::load() {
        Ok(config) => config,
        Err(_) => LatticeConfig::default(),
    };

    // If auth is disabled, pass through
    if !config.httpd_auth_enabled
        || config.httpd_auth_user.is_empty()
        || config.httpd_auth_pass.is_empty()
    {
        return Ok(next.run(req).await);
    }

    // Check Authorization header
    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if let Some(auth) = auth_header {
        // Parse "Basic base64(user:pass)"
        if let Some(encoded) = auth.strip_prefix("Basic ") {
            if let Ok(decoded) = general_purpose::STANDARD.decode(encoded) {
                if let Ok(credentials) = String::from_utf8(decoded) {
                    let parts: Vec<&str> = credentials.splitn(2, ':').collect();
                    if parts.len() == 2
                        && parts[0] == config.httpd_auth_user
                        && parts[1] == config.httpd_auth_pass
                    {
                        return Ok(next.run(req).await);
                    }
                }
            }
        }
    }

    // Auth failed - return 401 with WWW-Authenticate header
    let mut response = Response::new(String::from("Unauthorized").into());
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    response.headers_mut().insert(
        WWW_AUTHENTICATE,
        "Basic realm=\"hexlattice\"".parse().unwrap(),
    );
    Ok(response)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/api/state", get(get_state))
        .route("/api/activate", post(post_activate))
        .route("/api/config", get(get_config))
        .route("/api/config", post(update_config))
        .route("/api/events", get(events))
        .route("/api/filter", post(post_filter))
        .route("/api/usecases", get(get_usecases))
        .route("/api/demo/filter", post(post_demo_filter))
        .route("/api/estimate", post(post_estimate))
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(basic_auth_middleware)),
        )
        .with_state(state)
}

pub async fn run_http_server(ip: String, port: u16, state: AppState) -> Result<()> {
    let app = router(state);
    let addr = format!("{}:{}", ip, port);

    println!("HTTP server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineParams;
    use crate::types::LatticeMode;
    use serde_json::json;

    async fn spawn_upstream(reply: &'static str) -> String {
        let app = Router::new().route(
            "/chat/completions",
            post(move |Json(_body): Json<serde_json::Value>| async move {
                Json(json!({
                    "choices": [{ "message": { "role": "assistant", "content": reply } }]
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn spawn_app(upstream: String) -> (String, AppState) {
        let engine = Arc::new(Mutex::new(LatticeEngine::with_seed(
            LatticeMode::Filter,
            EngineParams::default(),
            1,
        )));
        let (config_tx, _) = broadcast::channel(16);
        let (phase_tx, _) = broadcast::channel(64);
        let state = AppState {
            engine,
            config_change_tx: config_tx,
            phase_tx,
            client: FilterClient::new(
                upstream,
                "test-key".to_string(),
                "openai/gpt-4.1-mini".to_string(),
                10,
                0.0,
            ),
            demo_item_delay: Duration::ZERO,
        };

        let app = router(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), state)
    }

    #[tokio::test]
    async fn test_filter_proxy_rejects_missing_fields() {
        let upstream = spawn_upstream("NO").await;
        let (base, _state) = spawn_app(upstream).await;

        let http = reqwest::Client::new();
        let response = http
            .post(format!("{}/api/filter", base))
            .json(&json!({ "prompt": "", "content": "x" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error"], "Missing prompt or content");
    }

    #[tokio::test]
    async fn test_filter_proxy_relays_upstream_verdict() {
        let upstream = spawn_upstream("NO").await;
        let (base, _state) = spawn_app(upstream).await;

        let http = reqwest::Client::new();
        let response = http
            .post(format!("{}/api/filter", base))
            .json(&json!({ "prompt": "Is this spam?", "content": "hello there" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["result"], "NO");
    }

    #[tokio::test]
    async fn test_filter_proxy_maps_upstream_failure_to_500() {
        // Discard port: upstream unreachable.
        let (base, _state) = spawn_app("http://127.0.0.1:9".to_string()).await;

        let http = reqwest::Client::new();
        let response = http
            .post(format!("{}/api/filter", base))
            .json(&json!({ "prompt": "Is this spam?", "content": "hello" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error"], "Failed to process filter request");
    }

    #[tokio::test]
    async fn test_state_and_activate_endpoints() {
        let upstream = spawn_upstream("NO").await;
        let (base, state) = spawn_app(upstream).await;

        let http = reqwest::Client::new();
        let snapshot: serde_json::Value = http
            .get(format!("{}/api/state", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(snapshot["mode"], "filter");
        assert_eq!(snapshot["dots"].as_array().unwrap().len(), 37);
        assert_eq!(snapshot["is_animating"], false);

        let body: serde_json::Value = http
            .post(format!("{}/api/activate", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["started"], true);
        assert!(state.engine.lock().unwrap().is_animating());

        // Second trigger mid-run is a no-op.
        let body: serde_json::Value = http
            .post(format!("{}/api/activate", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["started"], false);
    }

    #[tokio::test]
    async fn test_demo_filter_runs_all_items() {
        let upstream = spawn_upstream("YES").await;
        let (base, _state) = spawn_app(upstream).await;

        let http = reqwest::Client::new();
        let body: serde_json::Value = http
            .post(format!("{}/api/demo/filter", base))
            .json(&json!({ "use_case": "recipe list", "prompt": "Is this vegan?" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|v| v.as_bool() == Some(true)));

        // A suggestion chip works in place of an explicit prompt.
        let body: serde_json::Value = http
            .post(format!("{}/api/demo/filter", base))
            .json(&json!({ "use_case": "recipe list", "suggestion": "vegan" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["results"].as_array().unwrap().len(), 5);

        // Neither prompt nor suggestion is a client error.
        let response = http
            .post(format!("{}/api/demo/filter", base))
            .json(&json!({ "use_case": "recipe list" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_estimate_endpoint() {
        let upstream = spawn_upstream("NO").await;
        let (base, _state) = spawn_app(upstream).await;

        let http = reqwest::Client::new();
        let body: serde_json::Value = http
            .post(format!("{}/api/estimate", base))
            .json(&json!({ "use_case": "email inbox", "model": "gpt-4.1" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["prompt_tokens"], 20);
        assert_eq!(body["total_output_tokens"], 10);

        let response = http
            .post(format!("{}/api/estimate", base))
            .json(&json!({ "use_case": "email inbox", "model": "gpt-2" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    }
}
