use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use serde_json::json;

use crate::store::Store;

/// How long a computed score stays cached.
pub const SCORE_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Compute a caller's score from the online-score payload fields.
///
/// Cache-aside: a cached score under the identity key is returned as-is;
/// otherwise the score is computed and written back best-effort, so a flaky
/// store degrades this to plain computation instead of failing the request.
pub fn get_score(
    store: &Store,
    phone: Option<&str>,
    email: Option<&str>,
    birthday: Option<NaiveDate>,
    gender: Option<i64>,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> f64 {
    let key = score_cache_key(first_name, last_name, phone, birthday);
    if let Some(cached) = store.cache_get(&key).and_then(|value| value.as_f64()) {
        return cached;
    }

    let mut score = 0.0;
    if phone.is_some() {
        score += 1.5;
    }
    if email.is_some() {
        score += 1.5;
    }
    if birthday.is_some() && gender.is_some() {
        score += 1.5;
    }
    if first_name.is_some() && last_name.is_some() {
        score += 0.5;
    }

    store.cache_set(&key, &json!(score), SCORE_CACHE_TTL);
    score
}

/// Identity-derived cache key: stable across requests carrying the same
/// person, regardless of which optional fields the caller filled in.
fn score_cache_key(
    first_name: Option<&str>,
    last_name: Option<&str>,
    phone: Option<&str>,
    birthday: Option<NaiveDate>,
) -> String {
    let birthday_part = birthday
        .map(|d| d.format("%Y%m%d").to_string())
        .unwrap_or_default();
    let identity = format!(
        "{}{}{}{}",
        first_name.unwrap_or_default(),
        last_name.unwrap_or_default(),
        phone.unwrap_or_default(),
        birthday_part
    );
    format!("uid:{:x}", md5::compute(identity))
}

/// Look up a client's interest list.
///
/// Goes through the retried store read: if the store stays unreachable the
/// failure propagates, since interests have no computable fallback.
pub fn get_interests(store: &Store, client_id: i64) -> anyhow::Result<Vec<String>> {
    let value = store.get(&format!("i:{client_id}"))?;
    match value {
        None => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value)
            .with_context(|| format!("malformed interests entry for client {client_id}")),
    }
}
