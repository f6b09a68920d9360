//! Device profile model
//!
//! The profile is the context entity every workflow step consumes. Its wire
//! shape is camelCase JSON; attributes this crate does not know about are kept
//! in [`DeviceProfile::extra`] so repair never drops caller data.

use crate::error::IntegrityError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ulid::Ulid;

/// Placeholder device name
pub const DEFAULT_NAME: &str = "Unnamed Device";
/// Placeholder manufacturer
pub const DEFAULT_MANUFACTURER: &str = "Unknown Manufacturer";
/// Placeholder product code
pub const DEFAULT_PRODUCT_CODE: &str = "UNK";
/// Placeholder regulatory class
pub const DEFAULT_DEVICE_CLASS: &str = "II";
/// Placeholder lifecycle status
pub const DEFAULT_STATUS: &str = "draft";
/// Default submission document type
pub const DEFAULT_DOCUMENT_TYPE: &str = "510k";
/// Default descriptor version
pub const DEFAULT_VERSION: &str = "1.0";
/// Default ordered submission sections
pub const DEFAULT_SECTIONS: [&str; 6] = [
    "Device Description",
    "Intended Use",
    "Substantial Equivalence",
    "Performance Testing",
    "Labeling",
    "Biocompatibility",
];

/// JSON keys owned by [`DeviceProfile`]; anything else lands in `extra`
pub(crate) const KNOWN_KEYS: [&str; 8] = [
    "id",
    "name",
    "manufacturer",
    "productCode",
    "deviceClass",
    "status",
    "structure",
    "metadata",
];

/// Unique profile identifier
///
/// Generated identifiers are time-ordered (ULID) so profiles created later
/// sort later.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(pub String);

impl ProfileId {
    /// Generate a fresh time-based identifier
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("device-{}", Ulid::new()))
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProfileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One of the five required scalar attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarField {
    /// Trade name
    Name,
    /// Manufacturer
    Manufacturer,
    /// Regulatory product code
    ProductCode,
    /// Regulatory class
    DeviceClass,
    /// Lifecycle status
    Status,
}

impl ScalarField {
    /// All scalar fields in declaration order
    pub const ALL: [ScalarField; 5] = [
        ScalarField::Name,
        ScalarField::Manufacturer,
        ScalarField::ProductCode,
        ScalarField::DeviceClass,
        ScalarField::Status,
    ];

    /// JSON key of this field
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Manufacturer => "manufacturer",
            Self::ProductCode => "productCode",
            Self::DeviceClass => "deviceClass",
            Self::Status => "status",
        }
    }

    /// Placeholder used when the field is missing or blank
    #[must_use]
    pub const fn default_value(self) -> &'static str {
        match self {
            Self::Name => DEFAULT_NAME,
            Self::Manufacturer => DEFAULT_MANUFACTURER,
            Self::ProductCode => DEFAULT_PRODUCT_CODE,
            Self::DeviceClass => DEFAULT_DEVICE_CLASS,
            Self::Status => DEFAULT_STATUS,
        }
    }
}

/// Structural descriptor of the submission document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralDescriptor {
    /// Document type (non-empty)
    pub document_type: String,
    /// Ordered, non-empty section list
    pub sections: Vec<String>,
    /// Descriptor version (non-empty)
    pub version: String,
}

impl StructuralDescriptor {
    /// Default section list as owned strings
    #[must_use]
    pub fn default_sections() -> Vec<String> {
        DEFAULT_SECTIONS.iter().map(|s| (*s).to_string()).collect()
    }
}

impl Default for StructuralDescriptor {
    fn default() -> Self {
        Self {
            document_type: DEFAULT_DOCUMENT_TYPE.to_string(),
            sections: Self::default_sections(),
            version: DEFAULT_VERSION.to_string(),
        }
    }
}

/// Audit timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditMetadata {
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last repair or edit
    pub last_updated: DateTime<Utc>,
}

impl AuditMetadata {
    /// Both timestamps set to `now`
    #[inline]
    #[must_use]
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            last_updated: now,
        }
    }
}

/// The workflow's central context entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfile {
    /// Unique identity
    pub id: ProfileId,
    /// Trade name
    pub name: String,
    /// Manufacturer
    pub manufacturer: String,
    /// Regulatory product code
    pub product_code: String,
    /// Regulatory class
    pub device_class: String,
    /// Lifecycle status
    pub status: String,
    /// Document structure
    pub structure: StructuralDescriptor,
    /// Audit timestamps
    pub metadata: AuditMetadata,
    /// Attributes owned by other layers, carried through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeviceProfile {
    /// Fully defaulted profile with a generated id, timestamps at `now`
    #[must_use]
    pub fn default_at(now: DateTime<Utc>) -> Self {
        Self {
            id: ProfileId::generate(),
            name: DEFAULT_NAME.to_string(),
            manufacturer: DEFAULT_MANUFACTURER.to_string(),
            product_code: DEFAULT_PRODUCT_CODE.to_string(),
            device_class: DEFAULT_DEVICE_CLASS.to_string(),
            status: DEFAULT_STATUS.to_string(),
            structure: StructuralDescriptor::default(),
            metadata: AuditMetadata::at(now),
            extra: Map::new(),
        }
    }

    /// With trade name
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// With manufacturer
    #[inline]
    #[must_use]
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = manufacturer.into();
        self
    }

    /// With product code
    #[inline]
    #[must_use]
    pub fn with_product_code(mut self, code: impl Into<String>) -> Self {
        self.product_code = code.into();
        self
    }

    /// With device class
    #[inline]
    #[must_use]
    pub fn with_device_class(mut self, class: impl Into<String>) -> Self {
        self.device_class = class.into();
        self
    }

    /// With status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// Value of a scalar attribute
    #[must_use]
    pub fn scalar(&self, field: ScalarField) -> &str {
        match field {
            ScalarField::Name => &self.name,
            ScalarField::Manufacturer => &self.manufacturer,
            ScalarField::ProductCode => &self.product_code,
            ScalarField::DeviceClass => &self.device_class,
            ScalarField::Status => &self.status,
        }
    }

    /// Check every profile invariant
    ///
    /// # Errors
    /// The first violated invariant, as an [`IntegrityError`].
    pub fn validate(&self) -> Result<(), IntegrityError> {
        if is_blank(self.id.as_str()) {
            return Err(IntegrityError::BlankId);
        }

        for field in ScalarField::ALL {
            if is_blank(self.scalar(field)) {
                return Err(IntegrityError::BlankField(field.key()));
            }
        }

        if is_blank(&self.structure.document_type) {
            return Err(IntegrityError::InvalidDescriptor(
                "documentType is blank".to_string(),
            ));
        }
        if self.structure.sections.is_empty() {
            return Err(IntegrityError::InvalidDescriptor(
                "sections is empty".to_string(),
            ));
        }
        if let Some(pos) = self.structure.sections.iter().position(|s| is_blank(s)) {
            return Err(IntegrityError::InvalidDescriptor(format!(
                "section {pos} is blank"
            )));
        }
        if is_blank(&self.structure.version) {
            return Err(IntegrityError::InvalidDescriptor(
                "version is blank".to_string(),
            ));
        }

        Ok(())
    }
}

#[inline]
pub(crate) fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}
