//! Reference (predicate) device search

use super::{letter, name_keywords, profile_seed};
use crate::error::RecoveryError;
use crate::step::{Provenance, StepRecord, WorkflowStep};
use rrl_profile::profile::DEFAULT_MANUFACTURER;
use rrl_profile::DeviceProfile;
use serde::{Deserialize, Serialize};

/// Candidate predicate device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceDevice {
    /// Clearance number
    pub k_number: String,
    /// Trade name
    pub device_name: String,
    /// Applicant
    pub manufacturer: String,
    /// Product code
    pub product_code: String,
    /// Regulatory class
    pub device_class: String,
    /// Decision date, `YYYY-MM-DD`
    pub decision_date: String,
    /// Similarity to the subject device, 0-100
    pub match_score: u8,
    /// Provenance flags
    #[serde(flatten)]
    pub provenance: Provenance,
}

impl StepRecord for ReferenceDevice {
    fn provenance(&self) -> Provenance {
        self.provenance
    }

    fn set_provenance(&mut self, provenance: Provenance) {
        self.provenance = provenance;
    }
}

/// Criteria for the predicate search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceCriteria {
    /// Product code to match
    pub product_code: String,
    /// Regulatory class to match
    pub device_class: String,
    /// Words from the trade name
    pub keywords: Vec<String>,
    /// Applicant, when known
    pub manufacturer: Option<String>,
}

/// Reference device step
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceDeviceStep;

impl WorkflowStep for ReferenceDeviceStep {
    const NAME: &'static str = "reference_devices";
    const LABEL: &'static str = "Reference devices";

    type Record = ReferenceDevice;
    type Criteria = ReferenceCriteria;

    fn criteria(profile: &DeviceProfile) -> ReferenceCriteria {
        let manufacturer = profile.manufacturer.trim();
        ReferenceCriteria {
            product_code: profile.product_code.trim().to_uppercase(),
            device_class: profile.device_class.trim().to_string(),
            keywords: name_keywords(profile),
            manufacturer: (!manufacturer.is_empty() && manufacturer != DEFAULT_MANUFACTURER)
                .then(|| manufacturer.to_string()),
        }
    }

    fn synthesize(profile: &DeviceProfile, count: usize) -> Result<Vec<ReferenceDevice>, RecoveryError> {
        if count == 0 {
            return Err(RecoveryError::Synthesis {
                step: Self::NAME,
                reason: "zero records requested".to_string(),
            });
        }

        let seed = profile_seed(profile) % 900_000;
        let records = (0..count)
            .map(|index| {
                let offset = u32::try_from(index).unwrap_or(u32::MAX);
                let year = 2024_u32.saturating_sub(offset);
                ReferenceDevice {
                    k_number: format!(
                        "K{:06}",
                        100_000 + seed.wrapping_add(offset.wrapping_mul(7_919)) % 900_000
                    ),
                    device_name: format!("{} Reference {}", profile.name, letter(index)),
                    manufacturer: format!("Reference Manufacturer {}", letter(index)),
                    product_code: profile.product_code.clone(),
                    device_class: profile.device_class.clone(),
                    decision_date: format!("{year}-01-15"),
                    match_score: u8::try_from(90_usize.saturating_sub(index * 10)).unwrap_or(0),
                    provenance: Provenance::emergency(),
                }
            })
            .collect();

        Ok(records)
    }

    fn critical_record() -> ReferenceDevice {
        ReferenceDevice {
            k_number: "K000000".to_string(),
            device_name: "Reference device unavailable".to_string(),
            manufacturer: "Unknown".to_string(),
            product_code: "UNK".to_string(),
            device_class: "II".to_string(),
            decision_date: String::new(),
            match_score: 0,
            provenance: Provenance::critical(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn profile() -> DeviceProfile {
        let now = Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap();
        DeviceProfile::default_at(now)
            .with_name("CardioFlow Infusion Pump")
            .with_manufacturer("Acme Medical")
            .with_product_code("frn")
    }

    #[test]
    fn criteria_from_profile() {
        assert_eq!(
            ReferenceDeviceStep::criteria(&profile()),
            ReferenceCriteria {
                product_code: "FRN".to_string(),
                device_class: "II".to_string(),
                keywords: vec!["cardioflow".into(), "infusion".into(), "pump".into()],
                manufacturer: Some("Acme Medical".to_string()),
            }
        );
    }

    #[test]
    fn placeholder_manufacturer_is_not_a_criterion() {
        let now = Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap();
        let criteria = ReferenceDeviceStep::criteria(&DeviceProfile::default_at(now));
        assert_eq!(criteria.manufacturer, None);
        assert!(criteria.keywords.is_empty());
    }

    #[test]
    fn synthesis_is_deterministic_and_flagged() {
        let first = ReferenceDeviceStep::synthesize(&profile(), 3).unwrap();
        let second = ReferenceDeviceStep::synthesize(&profile(), 3).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].device_name, "CardioFlow Infusion Pump Reference A");
        assert_eq!(first[2].match_score, 70);
        assert!(first.iter().all(|r| r.provenance == Provenance::emergency()));
        assert!(first.iter().all(|r| r.k_number.len() == 7));
    }

    #[test]
    fn zero_count_is_an_error() {
        assert!(matches!(
            ReferenceDeviceStep::synthesize(&profile(), 0),
            Err(RecoveryError::Synthesis { step: "reference_devices", .. })
        ));
    }

    #[test]
    fn critical_record_is_flagged() {
        let record = ReferenceDeviceStep::critical_record();
        assert!(record.provenance.critical_recovery);
        assert!(record.provenance.emergency_data);
    }

    #[test]
    fn cache_keys() {
        assert_eq!(ReferenceDeviceStep::results_key(), "rrl.reference_devices.results");
        assert_eq!(ReferenceDeviceStep::selection_key(), "rrl.reference_devices.selection");
    }
}
