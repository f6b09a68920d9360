//! Integrity guard
//!
//! Builds a valid [`DeviceProfile`] out of whatever the form layer produced.
//! Valid parts of the candidate are kept verbatim, invalid parts are replaced
//! by defaults, and the candidate itself is only ever borrowed.

use crate::error::IntegrityError;
use crate::profile::{
    is_blank, AuditMetadata, DeviceProfile, ProfileId, ScalarField, StructuralDescriptor,
    DEFAULT_DOCUMENT_TYPE, DEFAULT_VERSION, KNOWN_KEYS,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};

/// Source of "now" for repaired timestamps
pub type ClockFn = fn() -> DateTime<Utc>;

/// Which parts of a candidate were replaced during repair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Candidate was not an object and was replaced wholesale
    pub replaced_wholesale: bool,
    /// Repaired field paths, e.g. `structure.sections`
    pub repaired: Vec<&'static str>,
}

impl RepairReport {
    /// True when nothing but `lastUpdated` changed
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !self.replaced_wholesale && self.repaired.is_empty()
    }

    fn note(&mut self, path: &'static str) {
        self.repaired.push(path);
    }
}

/// Repairs device profiles so every step receives a valid entity
#[derive(Debug, Clone, Copy)]
pub struct IntegrityGuard {
    clock: ClockFn,
}

impl IntegrityGuard {
    /// Guard using the system clock
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self { clock: Utc::now }
    }

    /// Guard with an explicit clock
    #[inline]
    #[must_use]
    pub fn with_clock(clock: ClockFn) -> Self {
        Self { clock }
    }

    /// Repair an untyped candidate
    ///
    /// # Errors
    /// [`IntegrityError`] only if the repaired profile still violates an
    /// invariant.
    pub fn repair(&self, candidate: &Value) -> Result<DeviceProfile, IntegrityError> {
        self.repair_with_report(candidate).map(|(profile, _)| profile)
    }

    /// Repair a typed profile
    ///
    /// Typed profiles can still carry blank strings or empty section lists,
    /// so they go through the same path as untyped input.
    ///
    /// # Errors
    /// See [`IntegrityGuard::repair`].
    pub fn repair_profile(&self, profile: &DeviceProfile) -> Result<DeviceProfile, IntegrityError> {
        let value = serde_json::to_value(profile)?;
        self.repair(&value)
    }

    /// Repair and report which parts were replaced
    ///
    /// # Errors
    /// See [`IntegrityGuard::repair`].
    pub fn repair_with_report(
        &self,
        candidate: &Value,
    ) -> Result<(DeviceProfile, RepairReport), IntegrityError> {
        let now = (self.clock)();
        let mut report = RepairReport::default();

        let Some(fields) = candidate.as_object() else {
            tracing::warn!(
                kind = value_kind(candidate),
                "profile candidate is not an object, using defaults"
            );
            report.replaced_wholesale = true;
            return Ok((DeviceProfile::default_at(now), report));
        };

        let id = match fields.get("id").and_then(non_blank) {
            Some(id) => ProfileId(id.to_string()),
            None => {
                report.note("id");
                ProfileId::generate()
            }
        };

        let structure = repair_structure(fields.get("structure"), &mut report);
        let metadata = repair_metadata(fields.get("metadata"), now, &mut report);

        let mut scalar = |field: ScalarField| match fields.get(field.key()).and_then(non_blank) {
            Some(value) => value.to_string(),
            None => {
                report.note(field.key());
                field.default_value().to_string()
            }
        };

        let profile = DeviceProfile {
            id,
            name: scalar(ScalarField::Name),
            manufacturer: scalar(ScalarField::Manufacturer),
            product_code: scalar(ScalarField::ProductCode),
            device_class: scalar(ScalarField::DeviceClass),
            status: scalar(ScalarField::Status),
            structure,
            metadata,
            extra: carry_extras(fields),
        };

        check_postconditions(&profile, now)?;

        if report.is_clean() {
            tracing::trace!(id = %profile.id, "device profile passed integrity check");
        } else {
            tracing::debug!(id = %profile.id, repaired = ?report.repaired, "device profile repaired");
        }

        Ok((profile, report))
    }
}

impl Default for IntegrityGuard {
    fn default() -> Self {
        Self::new()
    }
}

fn check_postconditions(profile: &DeviceProfile, now: DateTime<Utc>) -> Result<(), IntegrityError> {
    if profile.metadata.last_updated != now {
        return Err(IntegrityError::InvalidMetadata(
            "lastUpdated was not refreshed".to_string(),
        ));
    }

    profile.validate().map_err(|err| {
        tracing::error!(id = %profile.id, error = %err, "repaired profile is still invalid");
        err
    })
}

fn repair_structure(raw: Option<&Value>, report: &mut RepairReport) -> StructuralDescriptor {
    let Some(raw) = raw.and_then(Value::as_object) else {
        report.note("structure");
        return StructuralDescriptor::default();
    };

    let document_type = match raw.get("documentType").and_then(non_blank) {
        Some(value) => value.to_string(),
        None => {
            report.note("structure.documentType");
            DEFAULT_DOCUMENT_TYPE.to_string()
        }
    };

    let sections = match raw.get("sections").and_then(Value::as_array) {
        Some(entries) => {
            let kept: Vec<String> = entries
                .iter()
                .filter_map(non_blank)
                .map(str::to_string)
                .collect();
            if kept.len() != entries.len() || kept.is_empty() {
                report.note("structure.sections");
            }
            if kept.is_empty() {
                StructuralDescriptor::default_sections()
            } else {
                kept
            }
        }
        None => {
            report.note("structure.sections");
            StructuralDescriptor::default_sections()
        }
    };

    let version = match raw.get("version").and_then(non_blank) {
        Some(value) => value.to_string(),
        None => {
            report.note("structure.version");
            DEFAULT_VERSION.to_string()
        }
    };

    StructuralDescriptor {
        document_type,
        sections,
        version,
    }
}

fn repair_metadata(
    raw: Option<&Value>,
    now: DateTime<Utc>,
    report: &mut RepairReport,
) -> AuditMetadata {
    let Some(raw) = raw.and_then(Value::as_object) else {
        report.note("metadata");
        return AuditMetadata::at(now);
    };

    let created_at = match raw.get("createdAt").and_then(parse_timestamp) {
        Some(at) => at,
        None => {
            report.note("metadata.createdAt");
            now
        }
    };

    AuditMetadata {
        created_at,
        last_updated: now,
    }
}

/// Parse the timestamp shapes the form layer is known to emit
///
/// RFC 3339 first, then naive date-times and dates (read as UTC), then epoch
/// milliseconds.
fn parse_timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(at) = DateTime::parse_from_rfc3339(s) {
                return Some(at.with_timezone(&Utc));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
                return Some(naive.and_utc());
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        }
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn non_blank(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !is_blank(s))
}

fn carry_extras(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .filter(|(key, _)| !KNOWN_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
