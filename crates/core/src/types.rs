//! Catalog types shared by the API client and the front end

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Number of entries the backend returns per page
pub const PAGE_SIZE: u64 = 10;

/// Identifier of an auxiliary record (category, form, manufacturer, generic name)
pub type RecordId = i64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitOfMeasurement {
    #[default]
    #[serde(rename = "TBL")]
    Tablet,
    #[serde(rename = "CAP")]
    Capsule,
    #[serde(rename = "SYR")]
    Syrup,
    #[serde(rename = "ONT")]
    Ointment,
    #[serde(rename = "OTH")]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CategoryType {
    #[serde(rename = "ANT")]
    Antibiotic,
    #[serde(rename = "ANL")]
    Analgesic,
    #[serde(rename = "APR")]
    Antipyretic,
    #[serde(rename = "VIT")]
    Vitamin,
    #[serde(rename = "SUP")]
    Supplement,
    #[serde(rename = "OTH")]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormType {
    #[serde(rename = "TBL")]
    Tablet,
    #[serde(rename = "SYR")]
    Syrup,
    #[serde(rename = "INJ")]
    Injection,
    #[serde(rename = "ONT")]
    Ointment,
    #[serde(rename = "DRP")]
    Drops,
    #[serde(rename = "OTH")]
    Other,
}

/// `{id, name}` reference embedded in a medicine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: RecordId,
    pub name: String,
}

/// `{id, form_type}` reference embedded in a medicine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormRef {
    pub id: RecordId,
    pub form_type: String,
}

/// A medicine as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medicine {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub batch_number: String,
    #[serde(default)]
    pub stock_quantity: u32,
    #[serde(default)]
    pub unit_of_measurement: UnitOfMeasurement,
    #[serde(default)]
    pub prescription_required: bool,
    #[serde(default = "default_true")]
    pub is_available: bool,
    #[serde(default)]
    pub is_featured: bool,
    pub generic_name_details: Option<NamedRef>,
    pub category_details: Option<NamedRef>,
    pub form_details: Option<FormRef>,
    pub manufacturer_details: Option<NamedRef>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

const fn default_true() -> bool {
    true
}

impl Medicine {
    pub fn generic_name(&self) -> Option<&str> {
        self.generic_name_details.as_ref().map(|r| r.name.as_str())
    }

    pub fn manufacturer_name(&self) -> Option<&str> {
        self.manufacturer_details.as_ref().map(|r| r.name.as_str())
    }
}

/// Writable medicine fields
///
/// Foreign keys are sent as ids. Absent fields are left out of the payload so
/// the same type serves creation and partial updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicineInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<UnitOfMeasurement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prescription_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_available: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generic_name: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<RecordId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: RecordId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicineForm {
    pub id: RecordId,
    pub form_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericName {
    pub id: RecordId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manufacturer {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub contact_info: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
}

/// One page of a paginated listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    pub count: u64,
    #[serde(default)]
    pub total_pages: Option<u64>,
}

impl<T> Page<T> {
    /// Wrap an unpaginated list as a single page
    pub fn single(results: Vec<T>) -> Self {
        let count = results.len() as u64;
        Self {
            results,
            count,
            total_pages: Some(1),
        }
    }

    /// Page count reported by the backend, or derived from `count`
    pub fn total_pages(&self) -> u64 {
        self.total_pages
            .unwrap_or_else(|| self.count.div_ceil(PAGE_SIZE))
            .max(1)
    }
}

/// `[start, end)` character offsets of a query match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,
}

impl MatchSpan {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl<'de> Deserialize<'de> for MatchSpan {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Both `[start, end]` and `{"start": .., "end": ..}` are in use
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Pair(usize, usize),
            Object { start: usize, end: usize },
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Pair(start, end) | Repr::Object { start, end } => Self { start, end },
        })
    }
}

/// A search result with per-field match annotations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub medicine: Medicine,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches: Option<BTreeMap<String, Vec<MatchSpan>>>,
}

impl SearchHit {
    /// Match spans recorded for a field, empty when none
    pub fn spans(&self, field: &str) -> &[MatchSpan] {
        self.matches
            .as_ref()
            .and_then(|matches| matches.get(field))
            .map_or(&[], Vec::as_slice)
    }
}

/// Optional search filters; only the set ones are sent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<FormType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<RecordId>,
}

impl SearchFilters {
    pub const fn is_empty(&self) -> bool {
        self.category.is_none() && self.form.is_none() && self.manufacturer.is_none()
    }
}
