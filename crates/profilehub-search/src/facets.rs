use crate::industry::Industry;
use profilehub_core::{Education, JobGrade, PositionRole, Profile};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Structured constraints inferred from a free-text query.
///
/// An empty facet set means "unconstrained", not "match nothing".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facets {
    /// Every industry category mentioned, deduplicated, table order.
    pub industries: Vec<Industry>,
    /// First matching role pattern.
    pub role: Option<PositionRole>,
    /// Grade named in the query.
    pub job_grade: Option<JobGrade>,
    /// Highest degree mentioned.
    pub education: Option<Education>,
}

impl Facets {
    /// No facet of any kind was extracted.
    pub fn is_empty(&self) -> bool {
        self.industries.is_empty() && !self.has_scalar()
    }

    /// A role, grade, or education facet was extracted.
    pub fn has_scalar(&self) -> bool {
        self.role.is_some() || self.job_grade.is_some() || self.education.is_some()
    }

    /// Union of the stored literals of every matched industry, deduplicated,
    /// in category order.
    pub fn stored_industry_values(&self) -> Vec<&'static str> {
        let mut values: Vec<&'static str> = Vec::new();
        for industry in &self.industries {
            for value in industry.stored_values() {
                if !values.contains(value) {
                    values.push(value);
                }
            }
        }
        values
    }

    /// Whether a profile satisfies every non-empty facet.
    ///
    /// Industry is a case-insensitive intersection with the stored literals;
    /// role, grade, and education must be equal.
    pub fn matches(&self, profile: &Profile) -> bool {
        if !self.industries.is_empty() && !profile.has_any_industry(&self.stored_industry_values())
        {
            return false;
        }
        if self.role.is_some() && profile.position_role != self.role {
            return false;
        }
        if self.job_grade.is_some() && profile.job_grade != self.job_grade {
            return false;
        }
        if self.education.is_some() && profile.education != self.education {
            return false;
        }
        true
    }

    /// Keep only the profiles that satisfy every facet, preserving order.
    pub fn apply(&self, profiles: Vec<Profile>) -> Vec<Profile> {
        if self.is_empty() {
            return profiles;
        }
        profiles.into_iter().filter(|p| self.matches(p)).collect()
    }
}

#[allow(clippy::expect_used)]
fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("valid facet pattern")
}

/// Role patterns in priority order; the first match wins.
///
/// The short forms use an ASCII word boundary. Hangul is not an ASCII word
/// character, so "기획" alone never matches between Korean text or spaces.
static ROLE_PATTERNS: LazyLock<Vec<(Regex, PositionRole)>> = LazyLock::new(|| {
    vec![
        (pattern(r"퍼블리셔|퍼블리싱|퍼블(?-u:\b)"), PositionRole::Publisher),
        (pattern(r"디자이너|디자인(?-u:\b)"), PositionRole::Designer),
        (pattern(r"기획자|기획(?-u:\b)"), PositionRole::Planner),
        (
            pattern(r"프론트엔드|프론트(?-u:\b)|프론트엔드개발자"),
            PositionRole::FrontendDeveloper,
        ),
        (pattern(r"백엔드|백엔드개발자"), PositionRole::BackendDeveloper),
    ]
});

/// Education patterns, highest degree first. "전문학사" contains "학사"
/// and therefore resolves to bachelor.
static EDUCATION_PATTERNS: LazyLock<Vec<(Regex, Education)>> = LazyLock::new(|| {
    vec![
        (pattern(r"(?i)박사|phd"), Education::Doctorate),
        (pattern(r"(?i)석사|硕士|master|mba"), Education::Master),
        (pattern(r"(?i)학사|学士|bachelor|대졸"), Education::Bachelor),
        (pattern(r"전문학사|전문대"), Education::Associate),
        (pattern(r"고졸|고등학교"), Education::HighSchool),
    ]
});

fn extract_role(query: &str) -> Option<PositionRole> {
    ROLE_PATTERNS
        .iter()
        .find(|(re, _)| re.is_match(query))
        .map(|(_, role)| *role)
}

/// Grades are tried lowest rank first; names are plain substrings.
fn extract_job_grade(query: &str) -> Option<JobGrade> {
    JobGrade::ALL
        .iter()
        .copied()
        .find(|grade| query.contains(grade.as_str()))
}

fn extract_education(query: &str) -> Option<Education> {
    EDUCATION_PATTERNS
        .iter()
        .find(|(re, _)| re.is_match(query))
        .map(|(_, level)| *level)
}

/// Extract structured facets from a free-text query.
///
/// Pure: the same input always yields the same facets.
pub fn extract_facets(query: &str) -> Facets {
    Facets {
        industries: Industry::detect(query),
        role: extract_role(query),
        job_grade: extract_job_grade(query),
        education: extract_education(query),
    }
}
