/// Input sanitizer for search queries and log-bound header values.
pub struct Sanitizer {
    max_query_chars: usize,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self {
            max_query_chars: 500,
        }
    }
}

impl Sanitizer {
    /// Sanitizer rejecting queries over `max_query_chars` characters.
    pub fn new(max_query_chars: usize) -> Self {
        Self { max_query_chars }
    }

    /// Longest accepted query, in characters.
    pub fn max_query_chars(&self) -> usize {
        self.max_query_chars
    }

    /// Sanitize a search query: enforce the length limit (in characters) and
    /// strip control characters. Newlines and tabs become spaces so tokens
    /// stay separated.
    pub fn sanitize(&self, input: &str) -> SanitizeResult {
        if input.chars().count() > self.max_query_chars {
            return SanitizeResult::Rejected(format!(
                "Query exceeds maximum length of {} characters",
                self.max_query_chars
            ));
        }

        let cleaned: String = input
            .chars()
            .filter_map(|c| match c {
                '\n' | '\t' | '\r' => Some(' '),
                c if c.is_control() => None,
                c => Some(c),
            })
            .collect();

        if cleaned.trim().is_empty() && !input.trim().is_empty() {
            return SanitizeResult::Rejected("Query contains only control characters".to_string());
        }

        if cleaned != input {
            SanitizeResult::Cleaned(cleaned)
        } else {
            SanitizeResult::Clean(cleaned)
        }
    }

    /// Sanitize HTTP headers to prevent log poisoning.
    pub fn sanitize_header(&self, value: &str) -> String {
        value
            .chars()
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .take(1000)
            .collect()
    }
}

/// Outcome of [`Sanitizer::sanitize`].
#[derive(Debug, PartialEq)]
pub enum SanitizeResult {
    /// Input was already clean.
    Clean(String),
    /// Input was cleaned (control characters removed).
    Cleaned(String),
    /// Input was rejected entirely.
    Rejected(String),
}

impl SanitizeResult {
    /// The input was refused.
    pub fn is_rejected(&self) -> bool {
        matches!(self, SanitizeResult::Rejected(_))
    }

    /// The usable text, if any.
    pub fn into_string(self) -> Option<String> {
        match self {
            SanitizeResult::Clean(s) | SanitizeResult::Cleaned(s) => Some(s),
            SanitizeResult::Rejected(_) => None,
        }
    }
}
