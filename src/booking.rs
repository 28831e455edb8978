//!
//! Booking intake
//! --------------
//! Validation of booking form submissions and persistence of accepted bookings.
//!
//! Validation is collect-all: every violated field is reported with its wire name
//! (`guestCount`, `contactInfo.email`, `additionalServices[2]`), so the form can mark
//! all of them at once. Unknown fields are ignored. Accepted bookings are immutable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::FieldError;
use crate::fields::{self, invalid_type, present, read_str, required};
use crate::identity::User;
use crate::store::{Document, DocumentStore, Query, StoreResult};

pub const BOOKINGS: &str = "bookings";

pub const MAX_GUESTS: i64 = 20;
pub const MAX_BASE_PRICE: f64 = 10_000.0;
pub const MAX_ADDITIONAL_PRICE: f64 = 10_000.0;
pub const MAX_TOTAL_PRICE: f64 = 20_000.0;
pub const MAX_ADD_ONS: usize = 20;
const PRICE_TOLERANCE: f64 = 0.01;

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self { $($name::$variant => $wire),+ }
            }

            pub fn parse(s: &str) -> Option<$name> {
                match s { $($wire => Some($name::$variant),)+ _ => None }
            }

            fn choices() -> String {
                $name::ALL.iter().map(|v| v.as_str()).collect::<Vec<_>>().join(", ")
            }
        }
    };
}

wire_enum!(
    /// Beach locations the business serves.
    Location { Juodkrante => "juodkrante", Nida => "nida", Klaipeda => "klaipeda" }
);

wire_enum!(
    Theme {
        Romantic => "romantic",
        Birthday => "birthday",
        Disco => "disco",
        Boho => "boho",
        Bachelorette => "bachelorette",
        Kids => "kids",
    }
);

wire_enum!(
    /// Add-on services selectable on the booking form.
    AddOn {
        Decorations => "decorations",
        Photographer => "photographer",
        Musician => "musician",
        Cake => "cake",
        Flowers => "flowers",
        Champagne => "champagne",
        Transport => "transport",
    }
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub location: Location,
    pub date: DateTime<Utc>,
    pub theme: Theme,
    pub time: String,
    pub guest_count: u8,
    pub base_price: f64,
    #[serde(default)]
    pub additional_services: Vec<AddOn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_price: Option<f64>,
    pub total_price: f64,
    pub contact_info: ContactInfo,
}

/// Accepted booking as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRecord {
    #[serde(flatten)]
    pub request: BookingRequest,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationOptions {
    /// Reject submissions whose `totalPrice` differs from `basePrice + additionalPrice`.
    pub enforce_price_total: bool,
}

// --- field readers: each pushes at most one error for its field ---

fn read_choice<T>(
    obj: &Map<String, Value>,
    key: &str,
    parse: fn(&str) -> Option<T>,
    choices: fn() -> String,
    errors: &mut Vec<FieldError>,
) -> Option<T> {
    let s = read_str(obj, key, key, errors)?;
    let parsed = parse(s);
    if parsed.is_none() {
        errors.push(FieldError::new(key, "invalid_choice", format!("Leistinos reikšmės: {}.", choices())));
    }
    parsed
}

fn range_error(path: &str, min: f64, max: f64) -> FieldError {
    FieldError::new(path, "out_of_range", format!("Reikšmė turi būti nuo {} iki {}.", min, max))
}

fn read_number(obj: &Map<String, Value>, key: &str, min: f64, max: f64, optional: bool, errors: &mut Vec<FieldError>) -> Option<f64> {
    match present(obj, key) {
        None if optional => None,
        None => { errors.push(required(key)); None }
        Some(Value::Number(n)) => {
            let x = n.as_f64().unwrap_or(f64::NAN);
            if !(min..=max).contains(&x) {
                errors.push(range_error(key, min, max));
                return None;
            }
            Some(x)
        }
        Some(_) => { errors.push(invalid_type(key)); None }
    }
}

fn read_guest_count(obj: &Map<String, Value>, errors: &mut Vec<FieldError>) -> Option<u8> {
    const KEY: &str = "guestCount";
    let n = match present(obj, KEY) {
        None => { errors.push(required(KEY)); return None; }
        Some(Value::Number(n)) => n,
        Some(_) => { errors.push(invalid_type(KEY)); return None; }
    };
    let Some(count) = fields::whole_number(n) else {
        errors.push(FieldError::new(KEY, "invalid_type", "Svečių skaičius turi būti sveikas skaičius."));
        return None;
    };
    if !(1..=MAX_GUESTS).contains(&count) {
        errors.push(FieldError::new(KEY, "out_of_range", format!("Svečių skaičius turi būti nuo 1 iki {}.", MAX_GUESTS)));
        return None;
    }
    u8::try_from(count).ok()
}

fn read_date(obj: &Map<String, Value>, errors: &mut Vec<FieldError>) -> Option<DateTime<Utc>> {
    let s = read_str(obj, "date", "date", errors)?;
    match DateTime::parse_from_rfc3339(s) {
        Ok(d) => Some(d.with_timezone(&Utc)),
        Err(_) => { errors.push(FieldError::new("date", "invalid_format", "Neteisinga data.")); None }
    }
}

fn read_time(obj: &Map<String, Value>, errors: &mut Vec<FieldError>) -> Option<String> {
    let s = read_str(obj, "time", "time", errors)?;
    if !fields::is_time_of_day(s) {
        errors.push(FieldError::new("time", "invalid_format", "Laikas turi būti formatu HH:MM."));
        return None;
    }
    Some(s.to_string())
}

fn read_add_ons(obj: &Map<String, Value>, errors: &mut Vec<FieldError>) -> Option<Vec<AddOn>> {
    const KEY: &str = "additionalServices";
    let items = match present(obj, KEY) {
        None => return Some(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => { errors.push(invalid_type(KEY)); return None; }
    };
    if items.len() > MAX_ADD_ONS {
        errors.push(FieldError::new(KEY, "too_many", format!("Galima pasirinkti ne daugiau kaip {} paslaugų.", MAX_ADD_ONS)));
        return None;
    }
    let before = errors.len();
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let path = format!("{KEY}[{i}]");
        match item.as_str().map(AddOn::parse) {
            Some(Some(a)) => out.push(a),
            Some(None) => errors.push(FieldError::new(path, "invalid_choice", format!("Leistinos reikšmės: {}.", AddOn::choices()))),
            None => errors.push(invalid_type(&path)),
        }
    }
    (errors.len() == before).then_some(out)
}

fn read_contact(obj: &Map<String, Value>, errors: &mut Vec<FieldError>) -> Option<ContactInfo> {
    const KEY: &str = "contactInfo";
    let contact = match present(obj, KEY) {
        None => { errors.push(required(KEY)); return None; }
        Some(Value::Object(m)) => m,
        Some(_) => { errors.push(invalid_type(KEY)); return None; }
    };
    let before = errors.len();

    let name = read_str(contact, "name", "contactInfo.name", errors).map(str::trim);
    if let Some(n) = name {
        let len = n.chars().count();
        if !(2..=100).contains(&len) {
            errors.push(FieldError::new("contactInfo.name", "invalid_length", "Vardas turi būti nuo 2 iki 100 simbolių."));
        }
    }
    let email = read_str(contact, "email", "contactInfo.email", errors).map(str::trim);
    if let Some(e) = email {
        if !fields::is_email(e) {
            errors.push(FieldError::new("contactInfo.email", "invalid_format", "Neteisingas el. pašto adresas."));
        }
    }
    let phone = read_str(contact, "phone", "contactInfo.phone", errors).map(str::trim);
    if let Some(p) = phone {
        if !fields::is_phone(p) {
            errors.push(FieldError::new("contactInfo.phone", "invalid_format", "Neteisingas telefono numeris."));
        }
    }

    if errors.len() != before {
        return None;
    }
    Some(ContactInfo {
        name: name?.to_string(),
        email: email?.to_string(),
        phone: phone?.to_string(),
    })
}

/// Validate a raw booking submission, reporting every violated field.
pub fn validate(raw: &Value, opts: ValidationOptions) -> Result<BookingRequest, Vec<FieldError>> {
    let Some(obj) = raw.as_object() else {
        return Err(vec![FieldError::new("", "invalid_type", "Užklausa turi būti JSON objektas.")]);
    };
    let mut errors = Vec::new();

    let location = read_choice(obj, "location", Location::parse, Location::choices, &mut errors);
    let date = read_date(obj, &mut errors);
    let theme = read_choice(obj, "theme", Theme::parse, Theme::choices, &mut errors);
    let time = read_time(obj, &mut errors);
    let guest_count = read_guest_count(obj, &mut errors);
    let base_price = read_number(obj, "basePrice", 0.0, MAX_BASE_PRICE, false, &mut errors);
    let additional_services = read_add_ons(obj, &mut errors);
    let additional_price = read_number(obj, "additionalPrice", 0.0, MAX_ADDITIONAL_PRICE, true, &mut errors);
    let total_price = read_number(obj, "totalPrice", 0.0, MAX_TOTAL_PRICE, false, &mut errors);
    let contact_info = read_contact(obj, &mut errors);

    if opts.enforce_price_total {
        if let (Some(base), Some(total)) = (base_price, total_price) {
            let expected = base + additional_price.unwrap_or(0.0);
            if (total - expected).abs() > PRICE_TOLERANCE {
                errors.push(FieldError::new(
                    "totalPrice",
                    "price_mismatch",
                    "Bendra kaina nesutampa su bazine ir papildomų paslaugų kaina.",
                ));
            }
        }
    }

    match (location, date, theme, time, guest_count, base_price, additional_services, total_price, contact_info) {
        (Some(location), Some(date), Some(theme), Some(time), Some(guest_count), Some(base_price), Some(additional_services), Some(total_price), Some(contact_info))
            if errors.is_empty() =>
        {
            Ok(BookingRequest {
                location,
                date,
                theme,
                time,
                guest_count,
                base_price,
                additional_services,
                additional_price,
                total_price,
                contact_info,
            })
        }
        _ => Err(errors),
    }
}

/// Store an accepted booking on behalf of a signed-in user.
pub fn accept(store: &dyn DocumentStore, user: &User, request: BookingRequest) -> StoreResult<(Document, BookingRecord)> {
    let record = BookingRecord { request, user_id: user.uid.clone(), created_at: Utc::now() };
    let doc = store.collection(BOOKINGS).add_record(&record)?;
    info!(
        target: "picnic::booking",
        "booking accepted id={} user={} location={} date={} guests={}",
        doc.id, user.uid, record.request.location.as_str(), record.request.date.to_rfc3339(), record.request.guest_count
    );
    Ok((doc, record))
}

/// All bookings, newest first.
pub fn list(store: &dyn DocumentStore) -> StoreResult<Vec<Value>> {
    let docs = store.collection(BOOKINGS).query(&Query::new().order_by_desc("createdAt"))?;
    Ok(docs.into_iter().map(Document::into_json).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn example() -> Value {
        json!({
            "location": "nida",
            "date": "2025-08-01T18:00:00Z",
            "theme": "disco",
            "time": "18:00",
            "guestCount": 4,
            "basePrice": 100,
            "totalPrice": 100,
            "contactInfo": {"name": "Jonas K", "email": "j@example.com", "phone": "+37061234567"}
        })
    }

    fn fields_of(errors: &[FieldError]) -> Vec<&str> { errors.iter().map(|e| e.field.as_str()).collect() }

    #[test]
    fn example_submission_is_valid() {
        let b = validate(&example(), ValidationOptions::default()).unwrap();
        assert_eq!(b.location, Location::Nida);
        assert_eq!(b.theme, Theme::Disco);
        assert_eq!(b.guest_count, 4);
        assert_eq!(b.date.to_rfc3339(), "2025-08-01T18:00:00+00:00");
        assert!(b.additional_services.is_empty());
        assert_eq!(b.additional_price, None);
    }

    #[test]
    fn too_many_guests_is_exactly_one_error() {
        let mut raw = example();
        raw["guestCount"] = json!(25);
        let errors = validate(&raw, ValidationOptions::default()).unwrap_err();
        assert_eq!(fields_of(&errors), vec!["guestCount"]);
        assert_eq!(errors[0].code, "out_of_range");
    }

    #[test]
    fn guest_count_bounds() {
        for (n, ok) in [(0, false), (1, true), (20, true), (21, false), (-3, false)] {
            let mut raw = example();
            raw["guestCount"] = json!(n);
            let res = validate(&raw, ValidationOptions::default());
            assert_eq!(res.is_ok(), ok, "guestCount={n}");
            if let Err(errors) = res {
                assert!(fields_of(&errors).contains(&"guestCount"));
            }
        }
        let mut raw = example();
        raw["guestCount"] = json!(4.5);
        assert_eq!(fields_of(&validate(&raw, ValidationOptions::default()).unwrap_err()), vec!["guestCount"]);
        raw["guestCount"] = json!(4.0);
        assert!(validate(&raw, ValidationOptions::default()).is_ok());
    }

    #[test]
    fn time_must_use_ascii_digits() {
        let mut raw = example();
        raw["time"] = json!("1\u{0668}:00");
        let errors = validate(&raw, ValidationOptions::default()).unwrap_err();
        assert_eq!(fields_of(&errors), vec!["time"]);
        assert_eq!(errors[0].code, "invalid_format");
    }

    #[test]
    fn locations_outside_the_set_are_rejected() {
        for loc in ["palanga", "Nida", "", "vilnius"] {
            let mut raw = example();
            raw["location"] = json!(loc);
            let errors = validate(&raw, ValidationOptions::default()).unwrap_err();
            assert_eq!(fields_of(&errors), vec!["location"], "location={loc}");
        }
        for loc in Location::ALL {
            let mut raw = example();
            raw["location"] = json!(loc.as_str());
            assert!(validate(&raw, ValidationOptions::default()).is_ok());
        }
    }

    #[test]
    fn all_violations_are_collected() {
        let raw = json!({
            "location": "riga",
            "date": "rytoj",
            "theme": 7,
            "time": "25:00",
            "guestCount": "four",
            "basePrice": -1,
            "additionalServices": ["cake", "fireworks"],
            "totalPrice": 100,
            "contactInfo": {"name": "J", "email": "nope", "phone": "x"}
        });
        let errors = validate(&raw, ValidationOptions::default()).unwrap_err();
        assert_eq!(
            fields_of(&errors),
            vec![
                "location", "date", "theme", "time", "guestCount", "basePrice",
                "additionalServices[1]", "contactInfo.name", "contactInfo.email", "contactInfo.phone",
            ]
        );
    }

    #[test]
    fn missing_fields_are_required() {
        let errors = validate(&json!({}), ValidationOptions::default()).unwrap_err();
        let fields = fields_of(&errors);
        for f in ["location", "date", "theme", "time", "guestCount", "basePrice", "totalPrice", "contactInfo"] {
            assert!(fields.contains(&f), "missing {f}");
        }
        assert!(errors.iter().all(|e| e.code == "required"));
        // optional fields are not reported
        assert!(!fields.contains(&"additionalServices"));
        assert!(!fields.contains(&"additionalPrice"));
    }

    #[test]
    fn non_object_payload() {
        let errors = validate(&json!([1, 2]), ValidationOptions::default()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "");
    }

    #[test]
    fn add_ons_and_extra_price() {
        let mut raw = example();
        raw["additionalServices"] = json!(["photographer", "cake"]);
        raw["additionalPrice"] = json!(80.5);
        raw["totalPrice"] = json!(180.5);
        let b = validate(&raw, ValidationOptions { enforce_price_total: true }).unwrap();
        assert_eq!(b.additional_services, vec![AddOn::Photographer, AddOn::Cake]);
        assert_eq!(b.additional_price, Some(80.5));
    }

    #[test]
    fn price_total_is_permissive_by_default() {
        let mut raw = example();
        raw["totalPrice"] = json!(5);
        assert!(validate(&raw, ValidationOptions::default()).is_ok());
        let errors = validate(&raw, ValidationOptions { enforce_price_total: true }).unwrap_err();
        assert_eq!(fields_of(&errors), vec!["totalPrice"]);
        assert_eq!(errors[0].code, "price_mismatch");
    }

    #[test]
    fn contact_fields_are_trimmed() {
        let mut raw = example();
        raw["contactInfo"]["name"] = json!("  Ona  ");
        let b = validate(&raw, ValidationOptions::default()).unwrap();
        assert_eq!(b.contact_info.name, "Ona");
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let mut raw = example();
        raw["promoCode"] = json!("VASARA");
        assert!(validate(&raw, ValidationOptions::default()).is_ok());
    }

    #[test]
    fn stored_record_round_trips_through_serde() {
        let req = validate(&example(), ValidationOptions::default()).unwrap();
        let rec = BookingRecord { request: req, user_id: "u1".into(), created_at: Utc::now() };
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["guestCount"], 4);
        assert_eq!(v["userId"], "u1");
        assert_eq!(v["contactInfo"]["phone"], "+37061234567");
        let back: BookingRecord = serde_json::from_value(v).unwrap();
        assert_eq!(back, rec);
    }
}
