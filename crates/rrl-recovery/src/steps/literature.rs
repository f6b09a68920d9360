//! Literature search

use super::{letter, name_keywords, profile_seed};
use crate::error::RecoveryError;
use crate::step::{Provenance, StepRecord, WorkflowStep};
use rrl_profile::DeviceProfile;
use serde::{Deserialize, Serialize};

/// Upper bound on publications requested from the live service
pub const MAX_RESULTS: usize = 25;

const JOURNALS: [&str; 3] = [
    "Journal of Medical Devices",
    "Clinical Device Safety Review",
    "Regulatory Science Quarterly",
];

/// Supporting publication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Publication {
    /// Stable identifier (PMID, DOI, ...)
    pub id: String,
    /// Title
    pub title: String,
    /// Author list
    pub authors: Vec<String>,
    /// Journal
    pub journal: String,
    /// Publication year
    pub year: u16,
    /// Short abstract
    pub summary: String,
    /// Provenance flags
    #[serde(flatten)]
    pub provenance: Provenance,
}

impl StepRecord for Publication {
    fn provenance(&self) -> Provenance {
        self.provenance
    }

    fn set_provenance(&mut self, provenance: Provenance) {
        self.provenance = provenance;
    }
}

/// Query for the literature service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiteratureQuery {
    /// Search terms
    pub terms: Vec<String>,
    /// Result cap
    pub max_results: usize,
}

/// Literature step
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteratureStep;

impl WorkflowStep for LiteratureStep {
    const NAME: &'static str = "literature";
    const LABEL: &'static str = "Literature";

    type Record = Publication;
    type Criteria = LiteratureQuery;

    fn criteria(profile: &DeviceProfile) -> LiteratureQuery {
        let mut terms = name_keywords(profile);
        for (prefix, value) in [("code", &profile.product_code), ("class", &profile.device_class)] {
            let value = value.trim();
            if !value.is_empty() {
                terms.push(format!("{prefix}:{value}"));
            }
        }

        LiteratureQuery {
            terms,
            max_results: MAX_RESULTS,
        }
    }

    fn synthesize(profile: &DeviceProfile, count: usize) -> Result<Vec<Publication>, RecoveryError> {
        if count == 0 {
            return Err(RecoveryError::Synthesis {
                step: Self::NAME,
                reason: "zero records requested".to_string(),
            });
        }

        let seed = profile_seed(profile);
        let records = (0..count)
            .map(|index| {
                let offset = u16::try_from(index).unwrap_or(u16::MAX);
                Publication {
                    id: format!("EMERGENCY-{:08X}-{}", seed, index + 1),
                    title: format!(
                        "Safety and performance of {} class {} devices ({})",
                        profile.product_code,
                        profile.device_class,
                        letter(index)
                    ),
                    authors: vec![format!("Author {}", letter(index))],
                    journal: JOURNALS[index % JOURNALS.len()].to_string(),
                    year: 2024_u16.saturating_sub(offset),
                    summary: format!(
                        "Placeholder summary for {}. Replace with retrieved literature before submission.",
                        profile.name
                    ),
                    provenance: Provenance::emergency(),
                }
            })
            .collect();

        Ok(records)
    }

    fn critical_record() -> Publication {
        Publication {
            id: "CRITICAL-0".to_string(),
            title: "Literature unavailable".to_string(),
            authors: Vec::new(),
            journal: String::new(),
            year: 0,
            summary: "Literature could not be loaded. Retry once the service is reachable.".to_string(),
            provenance: Provenance::critical(),
        }
    }
}
