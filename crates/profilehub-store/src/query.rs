use profilehub_core::Profile;

/// Scalar columns usable in equality filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    /// `id`
    Id,
    /// `email`
    Email,
    /// `job_grade`
    JobGrade,
    /// `education`
    Education,
    /// `position_role`
    PositionRole,
}

impl Column {
    /// Datastore column name.
    pub fn name(&self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Email => "email",
            Column::JobGrade => "job_grade",
            Column::Education => "education",
            Column::PositionRole => "position_role",
        }
    }

    fn value_of(&self, profile: &Profile) -> Option<String> {
        match self {
            Column::Id => Some(profile.id.to_string()),
            Column::Email => Some(profile.email.clone()),
            Column::JobGrade => profile.job_grade.map(|v| v.as_str().to_string()),
            Column::Education => profile.education.map(|v| v.as_str().to_string()),
            Column::PositionRole => profile.position_role.map(|v| v.as_str().to_string()),
        }
    }
}

/// Text-array columns usable in containment and overlap filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayColumn {
    /// `industry_experience`
    IndustryExperience,
    /// `skills`
    Skills,
}

impl ArrayColumn {
    /// Datastore column name.
    pub fn name(&self) -> &'static str {
        match self {
            ArrayColumn::IndustryExperience => "industry_experience",
            ArrayColumn::Skills => "skills",
        }
    }

    fn values_of<'a>(&self, profile: &'a Profile) -> &'a [String] {
        match self {
            ArrayColumn::IndustryExperience => &profile.industry_experience,
            ArrayColumn::Skills => &profile.skills,
        }
    }
}

/// Free-text columns usable in substring filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextColumn {
    /// `career_description`
    CareerDescription,
    /// `name`
    Name,
}

impl TextColumn {
    /// Datastore column name.
    pub fn name(&self) -> &'static str {
        match self {
            TextColumn::CareerDescription => "career_description",
            TextColumn::Name => "name",
        }
    }

    fn text_of<'a>(&self, profile: &'a Profile) -> Option<&'a str> {
        match self {
            TextColumn::CareerDescription => profile.career_description.as_deref(),
            TextColumn::Name => Some(profile.name.as_str()),
        }
    }
}

/// A single predicate. All predicates of a [`ProfileQuery`] are ANDed.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Column equals the value exactly.
    Eq(Column, String),
    /// Array column holds every listed value.
    Contains(ArrayColumn, Vec<String>),
    /// Array column holds at least one listed value.
    Overlaps(ArrayColumn, Vec<String>),
    /// Case-insensitive substring match.
    ILike(TextColumn, String),
    /// Profile has a stored embedding.
    HasEmbedding,
}

impl Filter {
    /// Evaluate the predicate against a profile in process.
    pub fn matches(&self, profile: &Profile) -> bool {
        match self {
            Filter::Eq(column, value) => column.value_of(profile).as_deref() == Some(value.as_str()),
            Filter::Contains(column, values) => {
                let stored = column.values_of(profile);
                values.iter().all(|v| stored.contains(v))
            }
            Filter::Overlaps(column, values) => {
                let stored = column.values_of(profile);
                values.iter().any(|v| stored.contains(v))
            }
            Filter::ILike(column, needle) => column
                .text_of(profile)
                .map(|text| text.to_lowercase().contains(&needle.to_lowercase()))
                .unwrap_or(false),
            Filter::HasEmbedding => profile.embedding.is_some(),
        }
    }
}

/// A read query against the profile table, built fluently.
///
/// ```
/// use profilehub_store::{ArrayColumn, Column, ProfileQuery};
///
/// let q = ProfileQuery::new()
///     .contains(ArrayColumn::IndustryExperience, ["금융"])
///     .eq(Column::PositionRole, "프론트엔드개발자")
///     .limit(20);
/// assert_eq!(q.filters().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileQuery {
    filters: Vec<Filter>,
    limit: Option<usize>,
    newest_first: bool,
}

impl ProfileQuery {
    /// An unconstrained query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Equality on a scalar column.
    pub fn eq(mut self, column: Column, value: impl Into<String>) -> Self {
        self.filters.push(Filter::Eq(column, value.into()));
        self
    }

    /// Array column contains every value.
    pub fn contains<I, S>(mut self, column: ArrayColumn, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.push(Filter::Contains(
            column,
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Array column shares at least one value.
    pub fn overlaps<I, S>(mut self, column: ArrayColumn, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.push(Filter::Overlaps(
            column,
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Case-insensitive substring match on a text column.
    pub fn ilike(mut self, column: TextColumn, needle: impl Into<String>) -> Self {
        self.filters.push(Filter::ILike(column, needle.into()));
        self
    }

    /// Only profiles with a stored embedding.
    pub fn has_embedding(mut self) -> Self {
        self.filters.push(Filter::HasEmbedding);
        self
    }

    /// Order by creation time, newest first.
    pub fn newest_first(mut self) -> Self {
        self.newest_first = true;
        self
    }

    /// Cap the number of returned rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Filters in the order they were added.
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Row cap, if any.
    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    /// Whether rows are ordered by `created_at` descending.
    pub fn is_newest_first(&self) -> bool {
        self.newest_first
    }

    /// Whether every filter accepts the profile.
    pub fn matches(&self, profile: &Profile) -> bool {
        self.filters.iter().all(|f| f.matches(profile))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use profilehub_core::{JobGrade, PositionRole, ProfileInput};

    fn profile() -> Profile {
        let mut p = Profile::new(ProfileInput {
            name: "이영희".into(),
            email: "younghee@example.com".into(),
            job_grade: Some(JobGrade::AssistantManager),
            position_role: Some(PositionRole::FrontendDeveloper),
            industry_experience: vec!["이커머스".into(), "Finance".into()],
            skills: vec!["React".into(), "Next.js".into()],
            career_description: Some("UI/UX에 관심이 많은 프론트엔드 개발자".into()),
            ..Default::default()
        });
        p.embedding = None;
        p
    }

    #[test]
    fn test_eq_filter() {
        let p = profile();
        assert!(ProfileQuery::new()
            .eq(Column::PositionRole, "프론트엔드개발자")
            .matches(&p));
        assert!(!ProfileQuery::new().eq(Column::JobGrade, "과장").matches(&p));
        // Unset column never equals anything.
        assert!(!ProfileQuery::new().eq(Column::Education, "학사").matches(&p));
    }

    #[test]
    fn test_contains_requires_all_values() {
        let p = profile();
        assert!(ProfileQuery::new()
            .contains(ArrayColumn::IndustryExperience, ["Finance"])
            .matches(&p));
        assert!(!ProfileQuery::new()
            .contains(ArrayColumn::IndustryExperience, ["Finance", "물류"])
            .matches(&p));
        // Containment is exact, as in the datastore.
        assert!(!ProfileQuery::new()
            .contains(ArrayColumn::IndustryExperience, ["finance"])
            .matches(&p));
    }

    #[test]
    fn test_overlaps_requires_any_value() {
        let p = profile();
        assert!(ProfileQuery::new()
            .overlaps(ArrayColumn::Skills, ["Vue", "React"])
            .matches(&p));
        assert!(!ProfileQuery::new()
            .overlaps(ArrayColumn::Skills, ["Vue"])
            .matches(&p));
        assert!(!ProfileQuery::new()
            .overlaps(ArrayColumn::Skills, Vec::<String>::new())
            .matches(&p));
    }

    #[test]
    fn test_ilike_case_insensitive() {
        let p = profile();
        assert!(ProfileQuery::new()
            .ilike(TextColumn::CareerDescription, "ui/ux")
            .matches(&p));
        assert!(!ProfileQuery::new()
            .ilike(TextColumn::CareerDescription, "커뮤니케이션")
            .matches(&p));
    }

    #[test]
    fn test_has_embedding() {
        let mut p = profile();
        assert!(!ProfileQuery::new().has_embedding().matches(&p));
        p.embedding = Some(vec![1.0]);
        assert!(ProfileQuery::new().has_embedding().matches(&p));
    }

    #[test]
    fn test_filters_are_anded() {
        let p = profile();
        let q = ProfileQuery::new()
            .eq(Column::PositionRole, "프론트엔드개발자")
            .eq(Column::JobGrade, "부장");
        assert!(!q.matches(&p));
    }
}
