#![allow(clippy::unwrap_used, clippy::expect_used)]

use profilehub_core::*;
use uuid::Uuid;

fn sample_profile() -> Profile {
    Profile::new(ProfileInput {
        name: "김철수".into(),
        email: "chulsoo.kim@example.com".into(),
        job_grade: Some(JobGrade::GeneralManager),
        education: Some(Education::Bachelor),
        position_role: Some(PositionRole::BackendDeveloper),
        industry_experience: vec!["금융".into()],
        skills: vec!["Node.js".into(), "PostgreSQL".into()],
        career_description: Some("10년차 백엔드 개발자".into()),
        ..Default::default()
    })
}

// ---------------------------------------------------------------------------
// 1. Detail view flattens the profile next to its dependents
// ---------------------------------------------------------------------------

#[test]
fn detail_serializes_flat() {
    let profile = sample_profile();
    let id = profile.id;
    let detail = ProfileDetail {
        employment_history: vec![EmploymentHistory::new(id, "한빛은행")],
        project_careers: vec![ProjectCareer::new(id, "차세대 뱅킹")],
        capabilities: None,
        profile,
    };

    let value = serde_json::to_value(&detail).unwrap();
    assert_eq!(value["id"], serde_json::json!(id));
    assert_eq!(value["name"], "김철수");
    assert_eq!(value["job_grade"], "부장");
    assert_eq!(value["education"], "학사");
    assert_eq!(value["employment_history"][0]["company_name"], "한빛은행");
    assert_eq!(value["project_careers"][0]["project_name"], "차세대 뱅킹");
    assert!(value["capabilities"].is_null());
}

// ---------------------------------------------------------------------------
// 2. Stored rows survive a serialize/deserialize cycle
// ---------------------------------------------------------------------------

#[test]
fn stored_row_reloads_identically() {
    let mut profile = sample_profile();
    profile.embedding = Some(vec![0.1, 0.2, 0.3]);

    let json = serde_json::to_string(&profile).unwrap();
    let reloaded: Profile = serde_json::from_str(&json).unwrap();
    assert_eq!(reloaded, profile);
}

// ---------------------------------------------------------------------------
// 3. Capability axes keep chart order
// ---------------------------------------------------------------------------

#[test]
fn capability_axes_order() {
    let scores = CapabilityScores {
        profile_id: Uuid::new_v4(),
        markup_precision: 1,
        logic_scripting: 2,
        framework_proficiency: 3,
        ui_ux_design: 4,
        optimization: 5,
        accessibility: 6,
    };
    let values: Vec<u8> = scores.axes().iter().map(|(_, v)| *v).collect();
    assert_eq!(values, vec![1, 2, 3, 4, 5, 6]);
}
