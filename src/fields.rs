use chrono::{Datelike, Local, NaiveDate};
use serde_json::Value;

/// Date pattern shared by the date and birth-date contracts.
pub const DATE_FORMAT: &str = "%d.%m.%Y";

/// Upper bound (exclusive) on the age derived from a birth date.
pub const MAX_AGE_YEARS: i32 = 70;

/// A self-contained validation rule for one value type.
///
/// Contracts classify a value as accepted or rejected with a reason; they
/// never mutate it. Presence handling (missing key, JSON null) happens in the
/// schema layer before a contract runs, so `validate` always sees a concrete
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contract {
    /// Any character string.
    Text,
    /// A JSON object holding the method-specific payload.
    Arguments,
    /// A string containing an `@` separator.
    Email,
    /// A string or integer that reads as 11 characters starting with `7`.
    Phone,
    /// A `DD.MM.YYYY` calendar date.
    Date,
    /// A calendar date whose derived age stays under `MAX_AGE_YEARS`.
    BirthDay,
    /// An integer gender code: 0 unknown, 1 male, 2 female.
    Gender,
    /// A non-empty list of integer client ids.
    ClientIds,
}

impl Contract {
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        match self {
            Contract::Text => validate_text(value),
            Contract::Arguments => validate_arguments(value),
            Contract::Email => validate_email(value),
            Contract::Phone => validate_phone(value),
            Contract::Date => parse_date(value).map(|_| ()),
            Contract::BirthDay => validate_birthday(value),
            Contract::Gender => validate_gender(value),
            Contract::ClientIds => validate_client_ids(value),
        }
    }
}

fn validate_text(value: &Value) -> Result<(), String> {
    if value.is_string() {
        Ok(())
    } else {
        Err("value must be a string".to_string())
    }
}

fn validate_arguments(value: &Value) -> Result<(), String> {
    if value.is_object() {
        Ok(())
    } else {
        Err("value must be an object".to_string())
    }
}

fn validate_email(value: &Value) -> Result<(), String> {
    validate_text(value)?;
    let text = value.as_str().unwrap_or_default();
    if text.contains('@') {
        Ok(())
    } else {
        Err("value must contain @".to_string())
    }
}

/// Coerce a phone value to its textual form: strings pass through, integers
/// render in decimal. Anything else is rejected.
pub fn phone_as_text(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Ok(u.to_string())
            } else {
                Err("value must be a string or an integer".to_string())
            }
        }
        _ => Err("value must be a string or an integer".to_string()),
    }
}

fn validate_phone(value: &Value) -> Result<(), String> {
    let text = phone_as_text(value)?;
    if text.chars().count() != 11 {
        return Err("value must be 11 characters long".to_string());
    }
    if !text.starts_with('7') {
        return Err("value must start with 7".to_string());
    }
    Ok(())
}

/// Parse a `DD.MM.YYYY` value, rejecting non-strings and unparsable input.
pub fn parse_date(value: &Value) -> Result<NaiveDate, String> {
    let text = value
        .as_str()
        .ok_or_else(|| format!("value must be a date in {DATE_FORMAT_HUMAN} format"))?;
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map_err(|_| format!("value must be a date in {DATE_FORMAT_HUMAN} format"))
}

const DATE_FORMAT_HUMAN: &str = "DD.MM.YYYY";

fn validate_birthday(value: &Value) -> Result<(), String> {
    let birthday = parse_date(value)?;
    if age_in_years(birthday, Local::now().date_naive()) < MAX_AGE_YEARS {
        Ok(())
    } else {
        Err(format!("age must be under {MAX_AGE_YEARS}"))
    }
}

/// Whole years elapsed between `birthday` and `today`.
pub fn age_in_years(birthday: NaiveDate, today: NaiveDate) -> i32 {
    let mut years = today.year() - birthday.year();
    if (today.month(), today.day()) < (birthday.month(), birthday.day()) {
        years -= 1;
    }
    years
}

fn validate_gender(value: &Value) -> Result<(), String> {
    let code = match value {
        Value::Number(n) => n.as_i64(),
        _ => None,
    };
    match code {
        Some(0..=2) => Ok(()),
        Some(_) => Err("value must be one of 0, 1, 2".to_string()),
        None => Err("value must be an integer".to_string()),
    }
}

fn validate_client_ids(value: &Value) -> Result<(), String> {
    let items = match value {
        Value::Array(items) => items,
        _ => return Err("value must be a list".to_string()),
    };
    if items.is_empty() {
        return Err("value must not be empty".to_string());
    }
    if items.iter().all(|item| item.as_i64().is_some()) {
        Ok(())
    } else {
        Err("values in the list must be integers".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_contract() {
        assert!(Contract::Text.validate(&json!("text")).is_ok());
        assert!(Contract::Text.validate(&json!(1)).is_err());
        assert!(Contract::Text.validate(&json!(["a"])).is_err());
    }

    #[test]
    fn test_arguments_contract() {
        assert!(Contract::Arguments.validate(&json!({})).is_ok());
        assert!(Contract::Arguments.validate(&json!("invalid")).is_err());
    }

    #[test]
    fn test_email_contract() {
        assert!(Contract::Email.validate(&json!("test@mail.com")).is_ok());
        assert!(Contract::Email.validate(&json!("testmail.com")).is_err());
        assert!(Contract::Email.validate(&json!(5)).is_err());
    }

    #[test]
    fn test_phone_contract() {
        assert!(Contract::Phone.validate(&json!("79210010033")).is_ok());
        assert!(Contract::Phone.validate(&json!(79210010033_i64)).is_ok());
        // Wrong leading digit
        assert!(Contract::Phone.validate(&json!("89232344123")).is_err());
        // Wrong length
        assert!(Contract::Phone.validate(&json!("7923223")).is_err());
        assert!(Contract::Phone.validate(&json!(2.5)).is_err());
    }

    #[test]
    fn test_date_contract() {
        assert!(Contract::Date.validate(&json!("21.01.1970")).is_ok());
        assert!(Contract::Date.validate(&json!("21011970")).is_err());
        assert!(Contract::Date.validate(&json!("31.02.2017")).is_err());
        assert!(Contract::Date.validate(&json!(21011970)).is_err());
    }

    #[test]
    fn test_birthday_contract() {
        assert!(Contract::BirthDay.validate(&json!("21.01.1970")).is_ok());
        assert!(Contract::BirthDay.validate(&json!("21011970")).is_err());
        // Age bound
        assert!(Contract::BirthDay.validate(&json!("01.01.1890")).is_err());
    }

    #[test]
    fn test_gender_contract() {
        for code in [0, 1, 2] {
            assert!(Contract::Gender.validate(&json!(code)).is_ok());
        }
        assert!(Contract::Gender.validate(&json!(3)).is_err());
        assert!(Contract::Gender.validate(&json!(-1)).is_err());
        assert!(Contract::Gender.validate(&json!("1")).is_err());
    }

    #[test]
    fn test_client_ids_contract() {
        assert!(Contract::ClientIds.validate(&json!([1, 2, 3, 4])).is_ok());
        assert!(Contract::ClientIds.validate(&json!([])).is_err());
        assert!(Contract::ClientIds.validate(&json!("1")).is_err());
        assert!(Contract::ClientIds.validate(&json!([1, "2", 3])).is_err());
        assert!(Contract::ClientIds.validate(&json!([1.5])).is_err());
    }

    #[test]
    fn test_validate_is_pure() {
        let value = json!("79210010033");
        let first = Contract::Phone.validate(&value);
        let second = Contract::Phone.validate(&value);
        assert_eq!(first, second);
        assert_eq!(value, json!("79210010033"));
    }

    #[test]
    fn test_age_in_years() {
        let birthday = NaiveDate::from_ymd_opt(2000, 6, 15).unwrap();
        let before = NaiveDate::from_ymd_opt(2070, 6, 14).unwrap();
        let on = NaiveDate::from_ymd_opt(2070, 6, 15).unwrap();
        assert_eq!(age_in_years(birthday, before), 69);
        assert_eq!(age_in_years(birthday, on), 70);
    }
}
