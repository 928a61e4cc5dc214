//! In-process storage for CRM records.
//!
//! Each collection holds JSON objects in insertion order. Records carry a
//! server-assigned `id` plus `created_at`/`updated_at` timestamps.

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Fields the server owns; clients cannot overwrite them.
const RESERVED_FIELDS: [&str; 3] = ["id", "created_at", "updated_at"];

/// A CRM resource collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Orders,
    Masters,
    Cash,
    Calls,
    Directors,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Orders,
        Collection::Masters,
        Collection::Cash,
        Collection::Calls,
        Collection::Directors,
    ];

    /// URL segment for the collection.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::Masters => "masters",
            Self::Cash => "cash",
            Self::Calls => "calls",
            Self::Directors => "directors",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A page of records plus the total number that matched.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub data: Vec<Value>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
}

/// Record storage keyed by collection.
#[derive(Default)]
pub struct RecordStore {
    collections: DashMap<Collection, Vec<Map<String, Value>>>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records whose fields equal every filter, paged from 1.
    pub fn list(
        &self,
        collection: Collection,
        filters: &[(String, String)],
        page: usize,
        limit: usize,
    ) -> Page {
        let matching: Vec<Value> = self
            .collections
            .get(&collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| matches_filters(record, filters))
                    .map(|record| Value::Object(record.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let total = matching.len();
        let data = matching
            .into_iter()
            .skip(page.saturating_sub(1).saturating_mul(limit))
            .take(limit)
            .collect();

        Page {
            data,
            page,
            limit,
            total,
        }
    }

    pub fn get(&self, collection: Collection, id: Uuid) -> Option<Value> {
        let records = self.collections.get(&collection)?;
        records
            .iter()
            .find(|record| has_id(record, id))
            .map(|record| Value::Object(record.clone()))
    }

    /// Insert a new record built from `fields`, returning it.
    pub fn create(&self, collection: Collection, fields: Map<String, Value>) -> Value {
        let now = Value::String(Utc::now().to_rfc3339());
        let mut record = Map::new();
        record.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        record.insert("created_at".into(), now.clone());
        record.insert("updated_at".into(), now);
        merge_fields(&mut record, fields);

        let created = Value::Object(record.clone());
        self.collections.entry(collection).or_default().push(record);
        created
    }

    /// Merge `fields` into an existing record, returning the result.
    pub fn update(
        &self,
        collection: Collection,
        id: Uuid,
        fields: Map<String, Value>,
    ) -> Option<Value> {
        let mut records = self.collections.get_mut(&collection)?;
        let record = records.iter_mut().find(|record| has_id(record, id))?;

        merge_fields(record, fields);
        record.insert(
            "updated_at".into(),
            Value::String(Utc::now().to_rfc3339()),
        );
        Some(Value::Object(record.clone()))
    }

    /// Remove a record; `false` if it did not exist.
    pub fn delete(&self, collection: Collection, id: Uuid) -> bool {
        let Some(mut records) = self.collections.get_mut(&collection) else {
            return false;
        };
        let before = records.len();
        records.retain(|record| !has_id(record, id));
        records.len() != before
    }
}

fn has_id(record: &Map<String, Value>, id: Uuid) -> bool {
    record.get("id").and_then(Value::as_str) == Some(id.to_string().as_str())
}

fn merge_fields(record: &mut Map<String, Value>, fields: Map<String, Value>) {
    for (name, value) in fields {
        if !RESERVED_FIELDS.contains(&name.as_str()) {
            record.insert(name, value);
        }
    }
}

fn matches_filters(record: &Map<String, Value>, filters: &[(String, String)]) -> bool {
    filters.iter().all(|(name, expected)| match record.get(name) {
        Some(Value::String(actual)) => actual == expected,
        Some(other) => other.to_string() == *expected,
        None => false,
    })
}
