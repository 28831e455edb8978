//!
//! Customer reviews
//! ----------------
//! Submission, moderation and listing of reviews. Public pages only ever see
//! `approved` reviews; the admin panel sees everything.
//!
//! When the document store cannot be reached, listings are served from a fixed
//! sample dataset instead of failing, and the response is flagged `fallback: true`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::FieldError;
use crate::fields::{self, present, read_text, required, invalid_type};
use crate::store::{Document, DocumentStore, Query, StoreError, StoreResult};

pub const REVIEWS: &str = "reviews";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<ReviewStatus> {
        match s {
            "pending" => Some(ReviewStatus::Pending),
            "approved" => Some(ReviewStatus::Approved),
            "rejected" => Some(ReviewStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub author_name: String,
    pub author_email: String,
    pub rating: u8,
    pub title: String,
    pub content: String,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewRecord {
    fn from_document(doc: Document) -> StoreResult<ReviewRecord> {
        Ok(serde_json::from_value(doc.into_json())?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewListing {
    pub reviews: Vec<ReviewRecord>,
    pub total: usize,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

impl ReviewListing {
    fn live(reviews: Vec<ReviewRecord>) -> Self {
        Self { total: reviews.len(), reviews, fallback: false }
    }

    fn sample(reviews: Vec<ReviewRecord>) -> Self {
        Self { total: reviews.len(), reviews, fallback: true }
    }
}

/// Validated review submission.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub author_name: String,
    pub author_email: String,
    pub rating: u8,
    pub title: String,
    pub content: String,
}

fn at(ts: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(ts).map(|d| d.with_timezone(&Utc)).unwrap_or_default()
}

fn sample(id: &str, name: &str, rating: u8, title: &str, content: &str, status: ReviewStatus, ts: &str) -> ReviewRecord {
    ReviewRecord {
        id: id.to_string(),
        author_name: name.to_string(),
        author_email: String::new(),
        rating,
        title: title.to_string(),
        content: content.to_string(),
        status,
        created_at: at(ts),
        updated_at: at(ts),
    }
}

/// Fixed dataset served while the store is unreachable.
pub fn sample_reviews() -> Vec<ReviewRecord> {
    vec![
        sample(
            "sample-1", "Rūta", 5, "Nepamirštamas vakaras Nidoje",
            "Viskas buvo paruošta iki smulkmenų, saulėlydis prie marių ir nuostabi dekoracija.",
            ReviewStatus::Approved, "2024-07-14T19:30:00Z",
        ),
        sample(
            "sample-2", "Mantas", 5, "Puiki staigmena merginai",
            "Romantinis piknikas Juodkrantėje pranoko visus lūkesčius. Ačiū komandai!",
            ReviewStatus::Approved, "2024-08-02T18:00:00Z",
        ),
        sample(
            "sample-3", "Eglė", 4, "Gimtadienis Klaipėdoje",
            "Labai jauku ir skanu. Norėtųsi daugiau šešėlio karštą dieną, bet vaikai buvo laimingi.",
            ReviewStatus::Approved, "2024-08-20T15:00:00Z",
        ),
        sample(
            "sample-4", "Tomas", 5, "Disko piknikas",
            "Muzika, šviesos ir jūra. Rekomenduoju draugų kompanijai.",
            ReviewStatus::Pending, "2024-09-05T20:00:00Z",
        ),
    ]
}

fn newest_first(mut reviews: Vec<ReviewRecord>) -> Vec<ReviewRecord> {
    reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    reviews
}

fn decode_all(docs: Vec<Document>) -> Vec<ReviewRecord> {
    docs.into_iter()
        .filter_map(|d| {
            let id = d.id.clone();
            match ReviewRecord::from_document(d) {
                Ok(r) => Some(r),
                Err(e) => {
                    warn!(target: "picnic::reviews", "skipping malformed review id={}: {}", id, e);
                    None
                }
            }
        })
        .collect()
}

fn list_with_fallback(store: &dyn DocumentStore, status: Option<ReviewStatus>) -> StoreResult<ReviewListing> {
    let mut q = Query::new().order_by_desc("createdAt");
    if let Some(s) = status {
        q = q.where_eq("status", s.as_str());
    }
    match store.collection(REVIEWS).query(&q) {
        Ok(docs) => Ok(ReviewListing::live(decode_all(docs))),
        Err(StoreError::Unavailable(detail)) => {
            warn!(target: "picnic::reviews", "review store unavailable, serving sample dataset: {}", detail);
            let reviews = sample_reviews().into_iter().filter(|r| status.map_or(true, |s| r.status == s)).collect();
            Ok(ReviewListing::sample(newest_first(reviews)))
        }
        Err(e) => Err(e),
    }
}

/// Admin listing, optionally narrowed to one status.
pub fn list_admin(store: &dyn DocumentStore, status: Option<ReviewStatus>) -> StoreResult<ReviewListing> {
    list_with_fallback(store, status)
}

/// Approved reviews for public pages.
pub fn list_public(store: &dyn DocumentStore) -> StoreResult<ReviewListing> {
    list_with_fallback(store, Some(ReviewStatus::Approved))
}

fn read_rating(obj: &Map<String, Value>, errors: &mut Vec<FieldError>) -> Option<u8> {
    match present(obj, "rating") {
        None => { errors.push(required("rating")); None }
        Some(Value::Number(n)) => match fields::whole_number(n) {
            Some(r @ 1..=5) => Some(r as u8),
            Some(_) => { errors.push(FieldError::new("rating", "out_of_range", "Įvertinimas turi būti nuo 1 iki 5.")); None }
            None => { errors.push(FieldError::new("rating", "invalid_type", "Įvertinimas turi būti sveikas skaičius.")); None }
        },
        Some(_) => { errors.push(invalid_type("rating")); None }
    }
}

pub fn validate(raw: &Value) -> Result<NewReview, Vec<FieldError>> {
    let Some(obj) = raw.as_object() else {
        return Err(vec![FieldError::new("", "invalid_type", "Užklausa turi būti JSON objektas.")]);
    };
    let mut errors = Vec::new();
    let author_name = read_text(obj, "authorName", 2, 100, &mut errors);
    let author_email = read_text(obj, "authorEmail", 3, 254, &mut errors);
    if let Some(e) = author_email.as_deref() {
        if !fields::is_email(e) {
            errors.push(FieldError::new("authorEmail", "invalid_format", "Neteisingas el. pašto adresas."));
        }
    }
    let rating = read_rating(obj, &mut errors);
    let title = read_text(obj, "title", 3, 120, &mut errors);
    let content = read_text(obj, "content", 10, 2000, &mut errors);

    match (author_name, author_email, rating, title, content) {
        (Some(author_name), Some(author_email), Some(rating), Some(title), Some(content)) if errors.is_empty() => {
            Ok(NewReview { author_name, author_email, rating, title, content })
        }
        _ => Err(errors),
    }
}

/// Store a submitted review; it stays `pending` until moderated.
pub fn submit(store: &dyn DocumentStore, new: NewReview) -> StoreResult<ReviewRecord> {
    let now = Utc::now();
    let mut record = ReviewRecord {
        id: String::new(),
        author_name: new.author_name,
        author_email: new.author_email,
        rating: new.rating,
        title: new.title,
        content: new.content,
        status: ReviewStatus::Pending,
        created_at: now,
        updated_at: now,
    };
    let doc = store.collection(REVIEWS).add_record(&record)?;
    record.id = doc.id;
    info!(target: "picnic::reviews", "review submitted id={} rating={}", record.id, record.rating);
    Ok(record)
}

/// Set a review's status. `None` if no such review exists.
pub fn moderate(store: &dyn DocumentStore, id: &str, status: ReviewStatus) -> StoreResult<Option<ReviewRecord>> {
    let mut patch = Map::new();
    patch.insert("status".into(), Value::String(status.as_str().to_string()));
    patch.insert("updatedAt".into(), serde_json::to_value(Utc::now())?);
    let Some(doc) = store.collection(REVIEWS).update(id, patch)? else {
        return Ok(None);
    };
    info!(target: "picnic::reviews", "review moderated id={} status={}", id, status.as_str());
    ReviewRecord::from_document(doc).map(Some)
}

pub fn delete(store: &dyn DocumentStore, id: &str) -> StoreResult<bool> {
    let removed = store.collection(REVIEWS).delete(id)?;
    if removed {
        info!(target: "picnic::reviews", "review deleted id={}", id);
    }
    Ok(removed)
}
