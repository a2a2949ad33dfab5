use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::auth::ADMIN_LOGIN;
use crate::fields::{parse_date, phone_as_text, Contract};
use crate::schema::{Instance, Schema};

/// The outer request object carrying credentials, the method name, and the
/// method-specific payload.
#[derive(Debug, Clone)]
pub struct MethodRequest {
    instance: Instance,
}

impl MethodRequest {
    pub fn schema() -> Schema {
        Schema::builder()
            .field("account", Contract::Text, false, true)
            .field("login", Contract::Text, true, true)
            .field("token", Contract::Text, true, true)
            .field("arguments", Contract::Arguments, true, true)
            .field("method", Contract::Text, true, false)
            .build()
    }

    pub fn parse(body: &Map<String, Value>) -> Self {
        MethodRequest {
            instance: Self::schema().bind(body),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.instance.is_valid()
    }

    pub fn errors_value(&self) -> Value {
        self.instance.errors_value()
    }

    fn text(&self, name: &str) -> &str {
        self.instance
            .value(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn account(&self) -> &str {
        self.text("account")
    }

    pub fn login(&self) -> &str {
        self.text("login")
    }

    pub fn token(&self) -> &str {
        self.text("token")
    }

    pub fn method(&self) -> &str {
        self.text("method")
    }

    pub fn arguments(&self) -> Map<String, Value> {
        self.instance
            .value("arguments")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_admin(&self) -> bool {
        self.login() == ADMIN_LOGIN
    }
}

/// Payload shape for the `online_score` method.
///
/// Every field is individually optional, but at least one of the declared
/// pairs must be present for the payload to be valid.
#[derive(Debug, Clone)]
pub struct OnlineScoreRequest {
    instance: Instance,
}

const PAIRS: [(&str, &str); 3] = [
    ("phone", "email"),
    ("first_name", "last_name"),
    ("gender", "birthday"),
];

impl OnlineScoreRequest {
    pub fn schema() -> Schema {
        Schema::builder()
            .field("first_name", Contract::Text, false, true)
            .field("last_name", Contract::Text, false, true)
            .field("email", Contract::Email, false, true)
            .field("phone", Contract::Phone, false, true)
            .field("birthday", Contract::BirthDay, false, true)
            .field("gender", Contract::Gender, false, true)
            .build()
    }

    pub fn parse(args: &Map<String, Value>) -> Self {
        let mut instance = Self::schema().bind(args);
        let satisfied = PAIRS
            .iter()
            .any(|(a, b)| instance.present(a) && instance.present(b));
        if !satisfied {
            instance.add_error(
                "combination",
                "at least one pair must be present: phone and email, \
                 first_name and last_name, gender and birthday",
            );
        }
        OnlineScoreRequest { instance }
    }

    pub fn is_valid(&self) -> bool {
        self.instance.is_valid()
    }

    pub fn errors_value(&self) -> Value {
        self.instance.errors_value()
    }

    /// Present-and-valid field names in declaration order.
    pub fn present_names(&self) -> Vec<&'static str> {
        self.instance.present_names()
    }

    pub fn phone(&self) -> Option<String> {
        self.instance
            .value("phone")
            .and_then(|v| phone_as_text(v).ok())
    }

    pub fn email(&self) -> Option<&str> {
        self.instance.value("email").and_then(Value::as_str)
    }

    pub fn first_name(&self) -> Option<&str> {
        self.instance.value("first_name").and_then(Value::as_str)
    }

    pub fn last_name(&self) -> Option<&str> {
        self.instance.value("last_name").and_then(Value::as_str)
    }

    pub fn birthday(&self) -> Option<NaiveDate> {
        self.instance
            .value("birthday")
            .and_then(|v| parse_date(v).ok())
    }

    pub fn gender(&self) -> Option<i64> {
        self.instance.value("gender").and_then(Value::as_i64)
    }
}

/// Payload shape for the `clients_interests` method.
#[derive(Debug, Clone)]
pub struct ClientsInterestsRequest {
    instance: Instance,
}

impl ClientsInterestsRequest {
    pub fn schema() -> Schema {
        Schema::builder()
            .field("client_ids", Contract::ClientIds, true, false)
            .field("date", Contract::Date, false, true)
            .build()
    }

    pub fn parse(args: &Map<String, Value>) -> Self {
        ClientsInterestsRequest {
            instance: Self::schema().bind(args),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.instance.is_valid()
    }

    pub fn errors_value(&self) -> Value {
        self.instance.errors_value()
    }

    pub fn client_ids(&self) -> Vec<i64> {
        self.instance
            .value("client_ids")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default()
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.instance.value("date").and_then(|v| parse_date(v).ok())
    }
}
