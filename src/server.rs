use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Map, Value};

use crate::config::Config;
use crate::method::{self, method_handler, TransportRequest};
use crate::store::{MemoryBackend, Store};

#[derive(Clone)]
struct AppState {
    store: Arc<Store>,
}

/// Build the store façade from config. The in-process backend serves a fresh
/// checkout; remote backends plug in through the same `KvBackend` seam.
pub fn build_store(config: &Config) -> Store {
    Store::new(
        Box::new(MemoryBackend::new()),
        config.store.retry_counts,
        Duration::from_millis(config.store.retry_backoff_ms),
    )
}

pub fn router(store: Arc<Store>) -> Router {
    Router::new()
        .route("/method", post(handle_method))
        .fallback(unknown_path)
        .with_state(AppState { store })
}

/// Bind the listener and serve until ctrl-c.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let store = Arc::new(build_store(&config));
    let app = router(store);

    let listener = tokio::net::TcpListener::bind(&config.listen).await?;
    log::info!("listening on http://{}", config.listen);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to install ctrl-c handler: {e}");
    } else {
        log::info!("shutdown requested");
    }
}

/// Request id from the caller's header, or a fresh one.
fn request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string())
}

/// Wrap a pipeline result in the wire envelope: `{response, code}` on
/// success, `{error, code}` on failure. A null failure payload falls back to
/// the canonical reason text.
pub fn shape_response(payload: Value, code: u16) -> Value {
    match method::error_text(code) {
        Some(reason) => {
            let error = if payload.is_null() {
                json!(reason)
            } else {
                payload
            };
            json!({ "error": error, "code": code })
        }
        None => json!({ "response": payload, "code": code }),
    }
}

async fn handle_method(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let request_id = request_id(&headers);

    let parsed = serde_json::from_slice::<Value>(&body)
        .ok()
        .and_then(|value| value.as_object().cloned());

    let (payload, code) = match parsed {
        None => {
            log::info!("{request_id}: unparsable body");
            (Value::Null, method::BAD_REQUEST)
        }
        Some(body_map) => {
            log::info!("{request_id}: /method {}", Value::Object(body_map.clone()));
            let header_map: HashMap<String, String> = headers
                .iter()
                .filter_map(|(name, value)| {
                    value.to_str().ok().map(|v| (name.to_string(), v.to_string()))
                })
                .collect();
            let request = TransportRequest {
                body: body_map,
                headers: header_map,
            };

            let store = state.store.clone();
            let mut ctx = Map::new();
            ctx.insert("request_id".to_string(), json!(request_id.clone()));

            // The pipeline is synchronous and its store reads may sleep
            // between retries; keep that off the async executor.
            let joined = tokio::task::spawn_blocking(move || {
                let outcome = method_handler(&request, &mut ctx, &store);
                (outcome, ctx)
            })
            .await;

            match joined {
                Ok((Ok((payload, code)), ctx)) => {
                    log::info!("{request_id}: code {code}, context {}", Value::Object(ctx));
                    (payload, code)
                }
                Ok((Err(e), _)) => {
                    log::error!("{request_id}: unexpected error: {e:#}");
                    (Value::Null, method::INTERNAL_ERROR)
                }
                Err(e) => {
                    log::error!("{request_id}: request task panicked: {e}");
                    (Value::Null, method::INTERNAL_ERROR)
                }
            }
        }
    };

    respond(payload, code)
}

async fn unknown_path() -> (StatusCode, Json<Value>) {
    respond(Value::Null, method::NOT_FOUND)
}

fn respond(payload: Value, code: u16) -> (StatusCode, Json<Value>) {
    let status =
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(shape_response(payload, code)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_success_response() {
        let shaped = shape_response(json!({"score": 3.0}), method::OK);
        assert_eq!(shaped, json!({"response": {"score": 3.0}, "code": 200}));
    }

    #[test]
    fn test_shape_error_with_payload() {
        let shaped = shape_response(json!({"login": "required value not found"}), 422);
        assert_eq!(
            shaped,
            json!({"error": {"login": "required value not found"}, "code": 422})
        );
    }

    #[test]
    fn test_shape_error_falls_back_to_reason_text() {
        assert_eq!(
            shape_response(Value::Null, 404),
            json!({"error": "Not Found", "code": 404})
        );
        assert_eq!(
            shape_response(Value::Null, 400),
            json!({"error": "Bad Request", "code": 400})
        );
    }

    #[test]
    fn test_request_id_prefers_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", "abc123".parse().unwrap());
        assert_eq!(request_id(&headers), "abc123");
    }

    #[test]
    fn test_request_id_generated_when_absent() {
        let generated = request_id(&HeaderMap::new());
        assert_eq!(generated.len(), 32);
        assert!(generated.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
