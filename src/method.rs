use std::collections::HashMap;

use serde_json::{json, Map, Value};

use crate::auth::check_auth;
use crate::request::{ClientsInterestsRequest, MethodRequest, OnlineScoreRequest};
use crate::scoring;
use crate::store::Store;

pub const OK: u16 = 200;
pub const BAD_REQUEST: u16 = 400;
pub const FORBIDDEN: u16 = 403;
pub const NOT_FOUND: u16 = 404;
pub const INVALID_REQUEST: u16 = 422;
pub const INTERNAL_ERROR: u16 = 500;

/// Privileged callers get a fixed score without consulting the oracle.
pub const ADMIN_SCORE: f64 = 42.0;

/// Canonical reason text for the failure codes the service answers with.
pub fn error_text(code: u16) -> Option<&'static str> {
    match code {
        BAD_REQUEST => Some("Bad Request"),
        FORBIDDEN => Some("Forbidden"),
        NOT_FOUND => Some("Not Found"),
        INVALID_REQUEST => Some("Invalid Request"),
        INTERNAL_ERROR => Some("Internal Server Error"),
        _ => None,
    }
}

/// What the transport hands over: a parsed body and a header map. Sockets and
/// response framing stay on the transport's side of the seam.
#[derive(Debug, Clone, Default)]
pub struct TransportRequest {
    pub body: Map<String, Value>,
    pub headers: HashMap<String, String>,
}

/// One method's payload validation and execution.
pub trait MethodHandler {
    fn handle(
        &self,
        args: &Map<String, Value>,
        envelope: &MethodRequest,
        ctx: &mut Map<String, Value>,
        store: &Store,
    ) -> anyhow::Result<(Value, u16)>;
}

pub struct OnlineScoreHandler;

impl MethodHandler for OnlineScoreHandler {
    fn handle(
        &self,
        args: &Map<String, Value>,
        envelope: &MethodRequest,
        ctx: &mut Map<String, Value>,
        store: &Store,
    ) -> anyhow::Result<(Value, u16)> {
        let payload = OnlineScoreRequest::parse(args);
        if !payload.is_valid() {
            return Ok((payload.errors_value(), INVALID_REQUEST));
        }

        let score = if envelope.is_admin() {
            ADMIN_SCORE
        } else {
            scoring::get_score(
                store,
                payload.phone().as_deref(),
                payload.email(),
                payload.birthday(),
                payload.gender(),
                payload.first_name(),
                payload.last_name(),
            )
        };

        ctx.insert("has".to_string(), json!(payload.present_names()));
        Ok((json!({ "score": score }), OK))
    }
}

pub struct ClientsInterestsHandler;

impl MethodHandler for ClientsInterestsHandler {
    fn handle(
        &self,
        args: &Map<String, Value>,
        _envelope: &MethodRequest,
        ctx: &mut Map<String, Value>,
        store: &Store,
    ) -> anyhow::Result<(Value, u16)> {
        let payload = ClientsInterestsRequest::parse(args);
        if !payload.is_valid() {
            return Ok((payload.errors_value(), INVALID_REQUEST));
        }

        let client_ids = payload.client_ids();
        let mut result = Map::new();
        for client_id in &client_ids {
            let interests = scoring::get_interests(store, *client_id)?;
            result.insert(client_id.to_string(), json!(interests));
        }

        ctx.insert("nclients".to_string(), json!(client_ids.len()));
        Ok((Value::Object(result), OK))
    }
}

/// Run one validation-and-dispatch cycle.
///
/// Check order is fixed: empty transport input, envelope validation,
/// authentication, method lookup, payload validation, handler execution.
/// Validation and authentication failures come back as `(payload, code)`
/// values; only store exhaustion and unexpected faults propagate as errors,
/// for the transport boundary to downgrade to a generic 500.
pub fn method_handler(
    request: &TransportRequest,
    ctx: &mut Map<String, Value>,
    store: &Store,
) -> anyhow::Result<(Value, u16)> {
    if request.body.is_empty() && request.headers.is_empty() {
        return Ok((Value::Null, INVALID_REQUEST));
    }

    let envelope = MethodRequest::parse(&request.body);
    if !envelope.is_valid() {
        return Ok((envelope.errors_value(), INVALID_REQUEST));
    }
    if !check_auth(&envelope) {
        return Ok((json!(error_text(FORBIDDEN)), FORBIDDEN));
    }

    let args = envelope.arguments();
    match envelope.method() {
        "online_score" => OnlineScoreHandler.handle(&args, &envelope, ctx, store),
        "clients_interests" => ClientsInterestsHandler.handle(&args, &envelope, ctx, store),
        other => {
            log::debug!("unknown method requested: {other}");
            Ok((
                json!({ "method": format!("unknown method: {other}") }),
                INVALID_REQUEST,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Caller;
    use crate::scoring::SCORE_CACHE_TTL;

    fn regular_token(account: &str, login: &str) -> String {
        Caller::Regular {
            account: account.to_string(),
            login: login.to_string(),
        }
        .expected_digest()
    }

    fn transport(body: Value) -> TransportRequest {
        TransportRequest {
            body: body.as_object().unwrap().clone(),
            headers: HashMap::new(),
        }
    }

    fn run(body: Value) -> (Value, u16, Map<String, Value>) {
        let store = Store::in_memory();
        run_with_store(body, &store)
    }

    fn run_with_store(body: Value, store: &Store) -> (Value, u16, Map<String, Value>) {
        let mut ctx = Map::new();
        let (payload, code) = method_handler(&transport(body), &mut ctx, store).unwrap();
        (payload, code, ctx)
    }

    #[test]
    fn test_empty_request() {
        let store = Store::in_memory();
        let mut ctx = Map::new();
        let request = TransportRequest::default();
        let (_, code) = method_handler(&request, &mut ctx, &store).unwrap();
        assert_eq!(code, INVALID_REQUEST);
    }

    #[test]
    fn test_invalid_envelope() {
        let (payload, code, _) = run(json!({
            "account": "horns&hoofs",
            "login": "h&f",
            "method": "online_score",
        }));
        assert_eq!(code, INVALID_REQUEST);
        assert!(!payload.as_object().unwrap().is_empty());
    }

    #[test]
    fn test_bad_auth() {
        for token in ["", "sdd"] {
            let (payload, code, _) = run(json!({
                "account": "horns&hoofs",
                "login": "h&f",
                "method": "online_score",
                "token": token,
                "arguments": {},
            }));
            assert_eq!(code, FORBIDDEN);
            assert_eq!(payload, json!("Forbidden"));
        }
    }

    #[test]
    fn test_admin_with_empty_token_rejected() {
        let (_, code, _) = run(json!({
            "account": "horns&hoofs",
            "login": "admin",
            "method": "online_score",
            "token": "",
            "arguments": {},
        }));
        assert_eq!(code, FORBIDDEN);
    }

    #[test]
    fn test_online_score_ok() {
        let (payload, code, ctx) = run(json!({
            "account": "horns&hoofs",
            "login": "h&f",
            "method": "online_score",
            "token": regular_token("horns&hoofs", "h&f"),
            "arguments": {"phone": "79175002040", "email": "stupnikov@otus.ru"},
        }));
        assert_eq!(code, OK);
        let score = payload["score"].as_f64().unwrap();
        assert!(score >= 0.0);
        assert_eq!(ctx["has"], json!(["email", "phone"]));
    }

    #[test]
    fn test_online_score_admin_shortcut() {
        let (payload, code, _) = run(json!({
            "account": "horns&hoofs",
            "login": "admin",
            "method": "online_score",
            "token": Caller::Admin.expected_digest(),
            "arguments": {"phone": "79175002040", "email": "stupnikov@otus.ru"},
        }));
        assert_eq!(code, OK);
        assert_eq!(payload["score"], json!(42.0));
    }

    #[test]
    fn test_online_score_invalid_payload() {
        let (payload, code, _) = run(json!({
            "account": "horns&hoofs",
            "login": "h&f",
            "method": "online_score",
            "token": regular_token("horns&hoofs", "h&f"),
            "arguments": {"phone": "79175002040"},
        }));
        assert_eq!(code, INVALID_REQUEST);
        assert!(!payload.as_object().unwrap().is_empty());
    }

    #[test]
    fn test_online_score_over_age_birthday() {
        let (_, code, _) = run(json!({
            "account": "horns&hoofs",
            "login": "h&f",
            "method": "online_score",
            "token": regular_token("horns&hoofs", "h&f"),
            "arguments": {
                "phone": "79175002040",
                "email": "stupnikov@otus.ru",
                "gender": 1,
                "birthday": "01.01.1890",
            },
        }));
        assert_eq!(code, INVALID_REQUEST);
    }

    #[test]
    fn test_clients_interests_ok() {
        let store = Store::in_memory();
        store.cache_set("i:1", &json!(["books"]), SCORE_CACHE_TTL);
        store.cache_set("i:2", &json!(["travel", "music"]), SCORE_CACHE_TTL);

        let (payload, code, ctx) = run_with_store(
            json!({
                "account": "horns&hoofs",
                "login": "h&f",
                "method": "clients_interests",
                "token": regular_token("horns&hoofs", "h&f"),
                "arguments": {"client_ids": [1, 2, 3], "date": "19.07.2017"},
            }),
            &store,
        );
        assert_eq!(code, OK);
        assert_eq!(payload["1"], json!(["books"]));
        assert_eq!(payload["2"], json!(["travel", "music"]));
        assert_eq!(payload["3"], json!([]));
        assert_eq!(ctx["nclients"], json!(3));
    }

    #[test]
    fn test_clients_interests_empty_ids_rejected() {
        let (payload, code, _) = run(json!({
            "account": "horns&hoofs",
            "login": "h&f",
            "method": "clients_interests",
            "token": regular_token("horns&hoofs", "h&f"),
            "arguments": {"client_ids": [], "date": "20.07.2017"},
        }));
        assert_eq!(code, INVALID_REQUEST);
        assert!(payload.as_object().unwrap().contains_key("client_ids"));
    }

    #[test]
    fn test_unknown_method_is_validation_failure() {
        let (payload, code, _) = run(json!({
            "account": "horns&hoofs",
            "login": "h&f",
            "method": "offline_score",
            "token": regular_token("horns&hoofs", "h&f"),
            "arguments": {},
        }));
        assert_eq!(code, INVALID_REQUEST);
        assert_ne!(code, NOT_FOUND);
        assert!(payload.as_object().unwrap().contains_key("method"));
    }

    #[test]
    fn test_auth_checked_before_method_lookup() {
        let (_, code, _) = run(json!({
            "account": "horns&hoofs",
            "login": "h&f",
            "method": "offline_score",
            "token": "wrong",
            "arguments": {},
        }));
        assert_eq!(code, FORBIDDEN);
    }
}
