//! Read-only HTTP dashboard.
//!
//! `GET /` renders the engine status as a small HTML page; `GET /status`
//! returns the same snapshot as JSON. Neither route mutates the engine.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::response::{Html, Json};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::engine::{EngineState, StatusSnapshot};
use crate::error::DashboardError;

/// Builds the dashboard router over the shared engine state.
pub fn build_router(state: Arc<EngineState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/status", get(status))
        .with_state(state)
}

async fn index(State(state): State<Arc<EngineState>>) -> Html<String> {
    Html(render(&state.status()))
}

async fn status(State(state): State<Arc<EngineState>>) -> Json<StatusSnapshot> {
    Json(state.status())
}

/// Renders a status snapshot as an HTML fragment. Every value is escaped.
#[must_use]
pub fn render(snapshot: &StatusSnapshot) -> String {
    let targets = snapshot
        .targets
        .iter()
        .map(|t| escape(t))
        .collect::<Vec<_>>()
        .join(", ");
    let failures = snapshot
        .failures
        .iter()
        .map(|(t, n)| format!("{}: {n}", escape(t)))
        .collect::<Vec<_>>()
        .join(", ");
    let mode = if snapshot.dry_run { "dry run" } else { "live" };

    format!(
        "<h2>PhantomFog Dashboard</h2>\n\
         <p>Mode: {mode}</p>\n\
         <p>Rate per minute: {:.2}</p>\n\
         <p>Attack Score: {:.2}</p>\n\
         <p>Targets: {targets}</p>\n\
         <p>Failures: {failures}</p>\n",
        snapshot.rate_per_min, snapshot.attack_score,
    )
}

fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

/// Normalizes a bind address: `:5000` and `5000` bind all interfaces.
///
/// # Errors
///
/// Returns [`DashboardError::InvalidAddress`] if the result is not a
/// socket address.
pub fn parse_bind_addr(input: &str) -> Result<SocketAddr, DashboardError> {
    let addr = if input.starts_with(':') {
        format!("0.0.0.0{input}")
    } else if input.parse::<u16>().is_ok() {
        format!("0.0.0.0:{input}")
    } else {
        input.to_string()
    };
    addr.parse::<SocketAddr>()
        .map_err(|e| DashboardError::InvalidAddress {
            input: input.to_string(),
            reason: e.to_string(),
        })
}

/// Binds the dashboard and serves it until `cancel` fires.
///
/// Returns the bound address (useful when binding port 0) and the server
/// task handle.
///
/// # Errors
///
/// Returns [`DashboardError::Bind`] if the listener cannot be bound.
pub async fn serve(
    addr: SocketAddr,
    state: Arc<EngineState>,
    cancel: CancellationToken,
) -> Result<(SocketAddr, JoinHandle<()>), DashboardError> {
    let listener = TcpListener::bind(addr).await.map_err(DashboardError::Bind)?;
    let bound = listener.local_addr().map_err(DashboardError::Bind)?;
    let router = build_router(state);

    let handle = tokio::spawn(async move {
        info!(%bound, "dashboard listening");
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
            })
            .await
            .ok();
        debug!("dashboard shut down");
    });

    Ok((bound, handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineLimits;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    fn state(targets: &[&str]) -> Arc<EngineState> {
        Arc::new(EngineState::new(
            targets.iter().copied(),
            false,
            &EngineLimits::default(),
        ))
    }

    async fn body_string(resp: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn parse_bind_addr_forms() {
        assert_eq!(
            parse_bind_addr(":5000").unwrap(),
            "0.0.0.0:5000".parse().unwrap()
        );
        assert_eq!(
            parse_bind_addr("5000").unwrap(),
            "0.0.0.0:5000".parse().unwrap()
        );
        assert_eq!(
            parse_bind_addr("127.0.0.1:8081").unwrap(),
            "127.0.0.1:8081".parse().unwrap()
        );
        assert!(matches!(
            parse_bind_addr("dashboard"),
            Err(DashboardError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn render_escapes_everything() {
        let state = state(&["<script>alert(1)</script>", "a&b"]);
        state.record_failure("a&b");
        let html = render(&state.status());

        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains("a&amp;b: 1"));
        assert!(html.contains("Rate per minute: 6.00"));
    }

    #[tokio::test]
    async fn index_serves_html() {
        let app = build_router(state(&["10.1.1.1"]));
        let resp = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let ct = resp.headers()["content-type"].to_str().unwrap().to_string();
        assert!(ct.starts_with("text/html"));
        let body = body_string(resp).await;
        assert!(body.contains("PhantomFog Dashboard"));
        assert!(body.contains("10.1.1.1"));
    }

    #[tokio::test]
    async fn status_serves_json_snapshot() {
        let state = state(&["10.1.1.2", "10.1.1.3"]);
        state.raise_attack_score(10.0);
        let app = build_router(Arc::clone(&state));
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let value: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(value["targets"][1], "10.1.1.3");
        assert_eq!(value["attack_score"], 10.0);
        assert_eq!(value["running"], true);
        assert_eq!(value["failures"]["10.1.1.2"], 0);
    }

    #[tokio::test]
    async fn routes_are_read_only() {
        let app = build_router(state(&[]));
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn serve_binds_and_stops_on_cancel() {
        let cancel = CancellationToken::new();
        let (addr, handle) = serve(
            "127.0.0.1:0".parse().unwrap(),
            state(&[]),
            cancel.clone(),
        )
        .await
        .unwrap();
        assert_ne!(addr.port(), 0);

        cancel.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
