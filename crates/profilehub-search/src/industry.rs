use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Industry category recognized in queries.
///
/// Profiles store industries as free-form text in either language, so each
/// category expands to every literal it may be stored as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Industry {
    /// Banking, securities, insurance.
    #[serde(rename = "금융")]
    Finance,
    /// Online retail.
    #[serde(rename = "이커머스")]
    Ecommerce,
    /// Medical and health services.
    #[serde(rename = "헬스케어")]
    Healthcare,
    /// Education and edtech.
    #[serde(rename = "교육")]
    Education,
    /// Manufacturing.
    #[serde(rename = "제조")]
    Manufacturing,
    /// Logistics and delivery.
    #[serde(rename = "물류")]
    Logistics,
}

struct IndustryEntry {
    industry: Industry,
    pattern: Regex,
    stored_values: &'static [&'static str],
}

/// Literal patterns; a typo here fails every facet test.
#[allow(clippy::expect_used)]
fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("valid industry pattern")
}

static TABLE: LazyLock<Vec<IndustryEntry>> = LazyLock::new(|| {
    vec![
        IndustryEntry {
            industry: Industry::Finance,
            pattern: pattern(r"(?i)금융|금융권|은행|증권|보험|financial|finance|banking"),
            stored_values: &["금융", "Finance", "financial", "금융권", "Banking", "banking"],
        },
        IndustryEntry {
            industry: Industry::Ecommerce,
            pattern: pattern(r"(?i)이커머스|전자상거래|쇼핑몰|e-commerce|ecommerce"),
            stored_values: &["이커머스", "E-commerce", "ecommerce", "e-commerce", "전자상거래"],
        },
        IndustryEntry {
            industry: Industry::Healthcare,
            pattern: pattern(r"(?i)의료|헬스케어|병원|헬스|healthcare|medical"),
            stored_values: &["헬스케어", "Healthcare", "healthcare", "의료", "Medical"],
        },
        IndustryEntry {
            industry: Industry::Education,
            pattern: pattern(r"(?i)교육|에듀|education"),
            stored_values: &["교육", "Education", "education", "에듀"],
        },
        IndustryEntry {
            industry: Industry::Manufacturing,
            pattern: pattern(r"(?i)제조|제조업|공장|manufacturing"),
            stored_values: &["제조", "Manufacturing", "manufacturing", "제조업"],
        },
        IndustryEntry {
            industry: Industry::Logistics,
            pattern: pattern(r"(?i)물류|로지스틱스|배송|logistics"),
            stored_values: &["물류", "Logistics", "logistics", "로지스틱스"],
        },
    ]
});

impl Industry {
    /// Every category, in matching order.
    pub const ALL: &'static [Industry] = &[
        Industry::Finance,
        Industry::Ecommerce,
        Industry::Healthcare,
        Industry::Education,
        Industry::Manufacturing,
        Industry::Logistics,
    ];

    fn entry(&self) -> Option<&'static IndustryEntry> {
        TABLE.iter().find(|e| e.industry == *self)
    }

    /// Korean category key.
    pub fn key(&self) -> &'static str {
        match self {
            Industry::Finance => "금융",
            Industry::Ecommerce => "이커머스",
            Industry::Healthcare => "헬스케어",
            Industry::Education => "교육",
            Industry::Manufacturing => "제조",
            Industry::Logistics => "물류",
        }
    }

    /// Every literal a profile may store for this category.
    pub fn stored_values(&self) -> &'static [&'static str] {
        self.entry().map(|e| e.stored_values).unwrap_or(&[])
    }

    /// Whether the text mentions this category.
    pub fn matches(&self, text: &str) -> bool {
        self.entry().is_some_and(|e| e.pattern.is_match(text))
    }

    /// Every category mentioned in the text, in table order.
    pub fn detect(text: &str) -> Vec<Industry> {
        TABLE
            .iter()
            .filter(|e| e.pattern.is_match(text))
            .map(|e| e.industry)
            .collect()
    }

    /// Category whose stored literals include `value` (case-insensitive).
    pub fn classify_stored(value: &str) -> Option<Industry> {
        let lower = value.trim().to_lowercase();
        TABLE
            .iter()
            .find(|e| e.stored_values.iter().any(|v| v.to_lowercase() == lower))
            .map(|e| e.industry)
    }
}

impl std::fmt::Display for Industry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_table_covers_every_category() {
        for industry in Industry::ALL {
            assert!(
                !industry.stored_values().is_empty(),
                "{industry} has no stored values"
            );
            assert!(industry.stored_values().contains(&industry.key()));
        }
    }

    #[test]
    fn test_detect_korean_and_english() {
        assert_eq!(Industry::detect("금융권 프로젝트"), vec![Industry::Finance]);
        assert_eq!(Industry::detect("banking platform"), vec![Industry::Finance]);
        assert_eq!(Industry::detect("Healthcare SaaS"), vec![Industry::Healthcare]);
        assert_eq!(Industry::detect("쇼핑몰 구축"), vec![Industry::Ecommerce]);
        assert!(Industry::detect("우수한 커뮤니케이션 능력").is_empty());
    }

    #[test]
    fn test_detect_english_tokens_ignores_case() {
        assert_eq!(Industry::detect("Finance 도메인 경험"), vec![Industry::Finance]);
        assert_eq!(Industry::detect("FINANCE"), vec![Industry::Finance]);
        assert_eq!(
            Industry::detect("E-Commerce 플랫폼"),
            vec![Industry::Ecommerce]
        );
        assert_eq!(Industry::detect("LogIstics"), vec![Industry::Logistics]);
    }

    #[test]
    fn test_detect_multiple_in_table_order() {
        assert_eq!(
            Industry::detect("물류 배송 시스템과 은행 연동"),
            vec![Industry::Finance, Industry::Logistics]
        );
    }

    #[test]
    fn test_classify_stored() {
        assert_eq!(Industry::classify_stored("FINANCE"), Some(Industry::Finance));
        assert_eq!(Industry::classify_stored("로지스틱스"), Some(Industry::Logistics));
        assert_eq!(Industry::classify_stored("게임"), None);
    }

    #[test]
    fn test_serializes_as_key() {
        assert_eq!(
            serde_json::to_string(&Industry::Manufacturing).unwrap(),
            "\"제조\""
        );
    }
}
