//! Repairing profiles the way the form layer hands them over

use chrono::{DateTime, TimeZone, Utc};
use pretty_assertions::assert_eq;
use rrl_profile::{DeviceProfile, IntegrityGuard, ScalarField, StructuralDescriptor};
use serde_json::json;

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap()
}

fn guard() -> IntegrityGuard {
    IntegrityGuard::with_clock(fixed_now)
}

#[test]
fn half_filled_form_keeps_what_the_user_typed() {
    let candidate = json!({
        "id": "device-17",
        "name": "Glucose Monitor",
        "manufacturer": "",
        "productCode": 42,
        "structure": { "documentType": "De Novo", "sections": ["Labeling", 7, ""] },
        "metadata": { "createdAt": "2025-11-02" },
        "owner": "regulatory-team"
    });

    let (profile, report) = guard().repair_with_report(&candidate).unwrap();

    assert_eq!(profile.id.as_str(), "device-17");
    assert_eq!(profile.name, "Glucose Monitor");
    assert_eq!(profile.scalar(ScalarField::Manufacturer), ScalarField::Manufacturer.default_value());
    assert_eq!(profile.scalar(ScalarField::ProductCode), ScalarField::ProductCode.default_value());
    assert_eq!(profile.structure.document_type, "De Novo");
    assert_eq!(profile.structure.sections, vec!["Labeling".to_string()]);
    assert_eq!(profile.metadata.created_at, Utc.with_ymd_and_hms(2025, 11, 2, 0, 0, 0).unwrap());
    assert_eq!(profile.metadata.last_updated, fixed_now());
    assert_eq!(profile.extra["owner"], "regulatory-team");
    assert!(report.repaired.contains(&"manufacturer"));
    assert!(!report.repaired.contains(&"name"));
    profile.validate().unwrap();
}

#[test]
fn scalar_candidates_are_replaced_wholesale() {
    for candidate in [json!(null), json!("device"), json!(12), json!([1, 2])] {
        let (profile, report) = guard().repair_with_report(&candidate).unwrap();

        assert!(report.replaced_wholesale);
        assert!(profile.id.as_str().starts_with("device-"));
        assert_eq!(profile.structure, StructuralDescriptor::default());
        assert_eq!(profile.metadata.created_at, fixed_now());
    }
}

#[test]
fn repair_does_not_touch_the_input() {
    let candidate = json!({ "name": "Stent", "structure": { "sections": [] } });
    let before = candidate.clone();

    guard().repair(&candidate).unwrap();

    assert_eq!(candidate, before);
}

#[test]
fn repaired_profile_is_stable_under_a_second_pass() {
    let first = guard().repair(&json!({ "name": "Catheter" })).unwrap();
    let (second, report) = guard().repair_with_report(&serde_json::to_value(&first).unwrap()).unwrap();

    assert!(report.is_clean());
    assert_eq!(second, first);
}

#[test]
fn typed_profiles_are_refreshed() {
    let profile = DeviceProfile::default_at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        .with_name("Infusion Pump");

    let repaired = guard().repair_profile(&profile).unwrap();

    assert_eq!(repaired.name, "Infusion Pump");
    assert_eq!(repaired.metadata.created_at, profile.metadata.created_at);
    assert_eq!(repaired.metadata.last_updated, fixed_now());
}
