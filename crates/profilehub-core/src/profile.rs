use crate::{ProfileHubError, ProfileHubResult};
use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Declares a classification enum persisted as a Korean literal, with an
/// English alias accepted on input.
macro_rules! labeled_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $label:literal | $alias:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $label, alias = $alias)] $variant, )+
        }

        impl $name {
            /// Every variant, lowest rank first.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The literal stored in the datastore.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            /// English alias accepted by [`FromStr`].
            pub fn alias(&self) -> &'static str {
                match self {
                    $($name::$variant => $alias,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ProfileHubError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == wanted || v.alias().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| {
                        ProfileHubError::Validation(format!(
                            "unknown {} value: {wanted}",
                            stringify!($name)
                        ))
                    })
            }
        }
    };
}

labeled_enum! {
    /// Job grade, seven ranks from staff to executive.
    JobGrade {
        /// 사원
        Staff => "사원" | "staff",
        /// 대리
        AssistantManager => "대리" | "assistant_manager",
        /// 과장
        Manager => "과장" | "manager",
        /// 차장
        DeputyGeneralManager => "차장" | "deputy_general_manager",
        /// 부장
        GeneralManager => "부장" | "general_manager",
        /// 실장
        Director => "실장" | "director",
        /// 이사
        Executive => "이사" | "executive",
    }
}

labeled_enum! {
    /// Highest completed education level.
    Education {
        /// 고졸
        HighSchool => "고졸" | "high_school",
        /// 전문학사
        Associate => "전문학사" | "associate",
        /// 학사
        Bachelor => "학사" | "bachelor",
        /// 석사
        Master => "석사" | "master",
        /// 박사
        Doctorate => "박사" | "doctorate",
    }
}

labeled_enum! {
    /// Position role within a delivery team.
    PositionRole {
        /// 기획자
        Planner => "기획자" | "planner",
        /// 디자이너
        Designer => "디자이너" | "designer",
        /// 퍼블리셔
        Publisher => "퍼블리셔" | "publisher",
        /// 프론트엔드개발자
        FrontendDeveloper => "프론트엔드개발자" | "frontend_developer",
        /// 백엔드개발자
        BackendDeveloper => "백엔드개발자" | "backend_developer",
    }
}

/// An employee or candidate profile. Aggregate root for employment history,
/// project careers, and capability scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Immutable identifier assigned at creation.
    pub id: Uuid,
    /// Korean display name.
    pub name: String,
    /// Optional Latin-script name.
    #[serde(default)]
    pub name_en: Option<String>,
    /// Unique across all profiles.
    pub email: String,
    /// Contact number as entered.
    #[serde(default)]
    pub phone: Option<String>,
    /// Unknown stored labels read as `None`.
    #[serde(default, deserialize_with = "lenient_facet")]
    pub job_grade: Option<JobGrade>,
    /// Highest completed degree.
    #[serde(default, deserialize_with = "lenient_facet")]
    pub education: Option<Education>,
    /// Job function.
    #[serde(default, deserialize_with = "lenient_facet")]
    pub position_role: Option<PositionRole>,
    /// Free-form industry names, stored in Korean or English.
    #[serde(default, deserialize_with = "null_as_default")]
    pub industry_experience: Vec<String>,
    /// Skill tokens in display order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub skills: Vec<String>,
    /// Career narrative; each line renders as one bullet.
    #[serde(default)]
    pub career_description: Option<String>,
    /// Public URL of the profile picture.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Search-time score in 0..=100. Overwritten per search call.
    #[serde(default, deserialize_with = "null_as_default")]
    pub match_score: u32,
    /// Populated by the external ingestion pipeline, never computed here.
    #[serde(
        default,
        deserialize_with = "lenient_embedding",
        skip_serializing_if = "Option::is_none"
    )]
    pub embedding: Option<Vec<f32>>,
    /// Set once at creation.
    pub created_at: DateTime<Utc>,
    /// Bumped on every update.
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Build a new profile from a validated admin payload.
    pub fn new(input: ProfileInput) -> Self {
        let now = Utc::now();
        let mut profile = Self {
            id: Uuid::new_v4(),
            name: String::new(),
            name_en: None,
            email: String::new(),
            phone: None,
            job_grade: None,
            education: None,
            position_role: None,
            industry_experience: Vec::new(),
            skills: Vec::new(),
            career_description: None,
            avatar_url: None,
            match_score: 0,
            embedding: None,
            created_at: now,
            updated_at: now,
        };
        profile.apply(input);
        profile.updated_at = now;
        profile
    }

    /// Overwrite the editable fields from an admin payload. Identity,
    /// creation time, and the embedding are preserved.
    pub fn apply(&mut self, input: ProfileInput) {
        self.name = input.name;
        self.name_en = input.name_en;
        self.email = input.email;
        self.phone = input.phone;
        self.job_grade = input.job_grade;
        self.education = input.education;
        self.position_role = input.position_role;
        self.industry_experience = input.industry_experience;
        self.skills = input.skills;
        self.career_description = input.career_description;
        self.avatar_url = input.avatar_url;
        self.updated_at = Utc::now();
    }

    /// Non-empty lines of the career narrative.
    pub fn career_bullets(&self) -> Vec<&str> {
        self.career_description
            .as_deref()
            .map(|text| {
                text.lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Case-insensitive intersection test between the stored industries and
    /// a list of accepted literals.
    pub fn has_any_industry(&self, accepted: &[&str]) -> bool {
        self.industry_experience.iter().any(|stored| {
            let stored = stored.to_lowercase();
            accepted.iter().any(|a| a.to_lowercase() == stored)
        })
    }

    /// Attach a search-time score.
    pub fn with_match_score(mut self, score: u32) -> Self {
        self.match_score = score.min(100);
        self
    }

    /// Drop the embedding before the profile leaves the process.
    pub fn without_embedding(mut self) -> Self {
        self.embedding = None;
        self
    }

    /// First character of the display name followed by `**`.
    pub fn masked_name(&self) -> String {
        match self.name.chars().next() {
            Some(first) => format!("{first}**"),
            None => "**".to_string(),
        }
    }
}

/// Create/update payload submitted by the admin console.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProfileInput {
    /// Required; trimmed on normalize.
    pub name: String,
    /// Optional Latin-script name.
    #[serde(default)]
    pub name_en: Option<String>,
    /// Required; lowercased on normalize.
    pub email: String,
    /// Contact number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Korean label or English alias.
    #[serde(default, deserialize_with = "optional_facet")]
    pub job_grade: Option<JobGrade>,
    /// Korean label or English alias.
    #[serde(default, deserialize_with = "optional_facet")]
    pub education: Option<Education>,
    /// Korean label or English alias.
    #[serde(default, deserialize_with = "optional_facet")]
    pub position_role: Option<PositionRole>,
    /// Free-form industry names.
    #[serde(default)]
    pub industry_experience: Vec<String>,
    /// Skill tokens; blanks are dropped.
    #[serde(default)]
    pub skills: Vec<String>,
    /// Career narrative.
    #[serde(default)]
    pub career_description: Option<String>,
    /// Public URL of the profile picture.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Company names; replaces the stored list on save.
    #[serde(default)]
    pub employment_history: Vec<String>,
    /// Project names; replaces the stored list on save.
    #[serde(default)]
    pub project_careers: Vec<String>,
}

impl ProfileInput {
    /// Trim every field, drop blank list entries, and check the required
    /// identity fields.
    pub fn normalize(self) -> ProfileHubResult<Self> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ProfileHubError::Validation("name is required".to_string()));
        }

        let email = self.email.trim().to_string();
        if email.is_empty() || !email.contains('@') || email.chars().any(char::is_whitespace) {
            return Err(ProfileHubError::Validation(format!(
                "invalid email address: '{email}'"
            )));
        }

        Ok(Self {
            name,
            name_en: non_blank(self.name_en),
            email,
            phone: non_blank(self.phone),
            job_grade: self.job_grade,
            education: self.education,
            position_role: self.position_role,
            industry_experience: clean_list(self.industry_experience),
            skills: clean_list(self.skills),
            career_description: non_blank(self.career_description),
            avatar_url: non_blank(self.avatar_url),
            employment_history: clean_list(self.employment_history),
            project_careers: clean_list(self.project_careers),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// A past employer. Owned by exactly one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmploymentHistory {
    /// Row identifier.
    pub id: Uuid,
    /// Owning profile.
    pub profile_id: Uuid,
    /// Employer name as entered.
    pub company_name: String,
    /// Insert time.
    pub created_at: DateTime<Utc>,
}

impl EmploymentHistory {
    /// New row for `profile_id` with a fresh id.
    pub fn new(profile_id: Uuid, company_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            profile_id,
            company_name: company_name.into(),
            created_at: Utc::now(),
        }
    }
}

/// A past project. Owned by exactly one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectCareer {
    /// Row identifier.
    pub id: Uuid,
    /// Owning profile.
    pub profile_id: Uuid,
    /// Project name as entered.
    pub project_name: String,
    /// Insert time.
    pub created_at: DateTime<Utc>,
}

impl ProjectCareer {
    /// New row for `profile_id` with a fresh id.
    pub fn new(profile_id: Uuid, project_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            profile_id,
            project_name: project_name.into(),
            created_at: Utc::now(),
        }
    }
}

/// Six-axis capability assessment produced by an external analysis process.
/// Every axis is in 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityScores {
    /// Assessed profile; at most one row each.
    pub profile_id: Uuid,
    /// HTML/CSS markup accuracy.
    pub markup_precision: u8,
    /// JavaScript/TypeScript logic.
    #[serde(rename = "js_ts_logic")]
    pub logic_scripting: u8,
    /// Command of UI frameworks.
    pub framework_proficiency: u8,
    /// UI/UX design sense.
    pub ui_ux_design: u8,
    /// Web performance optimization.
    #[serde(rename = "web_optimization")]
    pub optimization: u8,
    /// Accessibility practice.
    pub accessibility: u8,
}

impl CapabilityScores {
    /// Labelled axes in chart order.
    pub fn axes(&self) -> [(&'static str, u8); 6] {
        [
            ("markup_precision", self.markup_precision),
            ("logic_scripting", self.logic_scripting),
            ("framework_proficiency", self.framework_proficiency),
            ("ui_ux_design", self.ui_ux_design),
            ("optimization", self.optimization),
            ("accessibility", self.accessibility),
        ]
    }

    /// Mean over all six axes.
    pub fn average(&self) -> f32 {
        let sum: u32 = self.axes().iter().map(|(_, v)| u32::from(*v)).sum();
        sum as f32 / 6.0
    }
}

/// A profile with its owned dependents, as shown on the detail page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileDetail {
    /// The profile row, flattened into the detail object.
    #[serde(flatten)]
    pub profile: Profile,
    /// Past employers, oldest first.
    pub employment_history: Vec<EmploymentHistory>,
    /// Past projects, oldest first.
    pub project_careers: Vec<ProjectCareer>,
    /// `None` until the analysis process has run.
    pub capabilities: Option<CapabilityScores>,
}

// --- Serde helpers ---

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Stored facets outside the known vocabulary read as absent.
fn lenient_facet<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

/// Blank input means "unset"; anything else must be a known value.
fn optional_facet<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr<Err = ProfileHubError>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => raw.parse().map(Some).map_err(D::Error::custom),
        _ => Ok(None),
    }
}

fn lenient_embedding<'de, D>(deserializer: D) -> Result<Option<Vec<f32>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(parse_embedding))
}

/// Parse an embedding stored either as a JSON array or as pgvector text
/// (`"[0.1,0.2]"`). Anything else, including an empty vector, is `None`.
pub fn parse_embedding(value: serde_json::Value) -> Option<Vec<f32>> {
    let parsed = match value {
        serde_json::Value::Array(items) => items
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Option<Vec<f32>>>(),
        serde_json::Value::String(text) => serde_json::from_str::<Vec<f32>>(&text).ok(),
        _ => None,
    }?;

    if parsed.is_empty() || parsed.iter().any(|x| !x.is_finite()) {
        None
    } else {
        Some(parsed)
    }
}
