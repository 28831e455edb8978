//! Shared field format checks used by the identity backends and the form validators.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Number, Value};

use crate::error::FieldError;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$").expect("email regex")
});

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?[0-9 ()\-]{7,20}$").expect("phone regex"));

static TIME_OF_DAY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]$").expect("time regex"));

pub fn is_email(s: &str) -> bool { s.len() <= 254 && EMAIL_RE.is_match(s) }

pub fn is_phone(s: &str) -> bool { PHONE_RE.is_match(s) }

/// 24h `HH:MM`.
pub fn is_time_of_day(s: &str) -> bool { TIME_OF_DAY_RE.is_match(s) }

// --- JSON form readers shared by the booking and review validators ---

/// A key holding `null` counts as absent.
pub(crate) fn present<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

pub(crate) fn required(path: &str) -> FieldError { FieldError::new(path, "required", "Laukas privalomas.") }

pub(crate) fn invalid_type(path: &str) -> FieldError { FieldError::new(path, "invalid_type", "Neteisingas reikšmės tipas.") }

pub(crate) fn read_str<'a>(obj: &'a Map<String, Value>, key: &str, path: &str, errors: &mut Vec<FieldError>) -> Option<&'a str> {
    match present(obj, key) {
        None => { errors.push(required(path)); None }
        Some(Value::String(s)) => Some(s.as_str()),
        Some(_) => { errors.push(invalid_type(path)); None }
    }
}

/// Integer value of a JSON number; integral floats such as `4.0` count.
pub(crate) fn whole_number(n: &Number) -> Option<i64> {
    n.as_i64().or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < 1e9).map(|f| f as i64))
}

/// Trimmed string whose length in characters lies in `min..=max`.
pub(crate) fn read_text(obj: &Map<String, Value>, key: &str, min: usize, max: usize, errors: &mut Vec<FieldError>) -> Option<String> {
    let s = read_str(obj, key, key, errors)?.trim();
    let len = s.chars().count();
    if !(min..=max).contains(&len) {
        errors.push(FieldError::new(key, "invalid_length", format!("Ilgis turi būti nuo {} iki {} simbolių.", min, max)));
        return None;
    }
    Some(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails() {
        assert!(is_email("j@example.com"));
        assert!(is_email("jonas.k+picnic@mail.example.lt"));
        assert!(!is_email("jonas"));
        assert!(!is_email("jonas@"));
        assert!(!is_email("jonas@example"));
        assert!(!is_email("jo nas@example.com"));
    }

    #[test]
    fn phones() {
        assert!(is_phone("+37061234567"));
        assert!(is_phone("8 (612) 34-567"));
        assert!(!is_phone("12345"));
        assert!(!is_phone("+3706123456a"));
    }

    #[test]
    fn times() {
        assert!(is_time_of_day("00:00"));
        assert!(is_time_of_day("18:00"));
        assert!(is_time_of_day("23:59"));
        assert!(!is_time_of_day("24:00"));
        assert!(!is_time_of_day("7:30"));
        assert!(!is_time_of_day("18:60"));
        assert!(!is_time_of_day("18:00:00"));
        // only ASCII digits
        assert!(!is_time_of_day("1\u{0668}:00"));
        assert!(!is_time_of_day("\u{0661}\u{0668}:\u{0660}\u{0660}"));
    }

    #[test]
    fn whole_numbers() {
        let n = |v: serde_json::Value| whole_number(v.as_number().unwrap());
        assert_eq!(n(serde_json::json!(5)), Some(5));
        assert_eq!(n(serde_json::json!(5.0)), Some(5));
        assert_eq!(n(serde_json::json!(-2.0)), Some(-2));
        assert_eq!(n(serde_json::json!(4.5)), None);
        assert_eq!(n(serde_json::json!(1e12)), None);
    }

    #[test]
    fn readers_treat_null_as_missing() {
        let obj = serde_json::json!({"a": null, "b": 3, "c": "  Ona  "});
        let obj = obj.as_object().unwrap();
        let mut errors = Vec::new();
        assert!(read_str(obj, "a", "a", &mut errors).is_none());
        assert!(read_str(obj, "b", "b", &mut errors).is_none());
        assert_eq!(read_text(obj, "c", 2, 10, &mut errors).as_deref(), Some("Ona"));
        assert!(read_text(obj, "c", 5, 10, &mut errors).is_none());
        let codes: Vec<&str> = errors.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["required", "invalid_type", "invalid_length"]);
    }
}
