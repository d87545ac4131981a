// Safety gate between model output and the query engine. This is a textual
// allow-list, not a SQL parser: a single SELECT statement passes, everything
// else is rejected. Read-level restrictions belong to the database role.

use std::error::Error;
use std::fmt;

/// Raw SQL text extracted from a model completion. Untrusted until validated.
#[derive(Debug, Clone)]
pub struct CandidateSql(String);

impl CandidateSql {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// SQL that has passed the read-only/single-statement policy. The only form
/// the query executor accepts.
#[derive(Debug, Clone)]
pub struct ValidatedSql(String);

impl ValidatedSql {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum PolicyError {
    NotReadOnly,
    MultipleStatements,
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyError::NotReadOnly => write!(f, "statement is not a SELECT"),
            PolicyError::MultipleStatements => write!(f, "more than one statement detected"),
        }
    }
}

impl Error for PolicyError {}

/// Checks the policy in order; the first failure wins.
pub fn validate(candidate: CandidateSql) -> Result<ValidatedSql, PolicyError> {
    let text = candidate.0.trim();

    if !text.to_uppercase().starts_with("SELECT") {
        return Err(PolicyError::NotReadOnly);
    }

    if text.matches(';').count() > 1 {
        return Err(PolicyError::MultipleStatements);
    }

    Ok(ValidatedSql(text.to_string()))
}

/// Removes Markdown code-fence markers the model tends to wrap SQL in.
pub fn strip_fences(text: &str) -> String {
    text.replace("```sql", "").replace("```", "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_single_select() {
        let sql = validate(CandidateSql::new("SELECT COUNT(*) FROM videos;")).unwrap();
        assert_eq!(sql.as_str(), "SELECT COUNT(*) FROM videos;");
    }

    #[test]
    fn accepts_lowercase_select_with_whitespace() {
        let sql = validate(CandidateSql::new("  select id from videos limit 3")).unwrap();
        assert_eq!(sql.as_str(), "select id from videos limit 3");
    }

    #[test]
    fn rejects_non_select() {
        let err = validate(CandidateSql::new("DELETE FROM videos")).unwrap_err();
        assert_eq!(err, PolicyError::NotReadOnly);
    }

    #[test]
    fn rejects_update_disguised_by_whitespace() {
        let err = validate(CandidateSql::new("\n  UPDATE videos SET views_count = 0")).unwrap_err();
        assert_eq!(err, PolicyError::NotReadOnly);
    }

    #[test]
    fn rejects_stacked_statements() {
        let err = validate(CandidateSql::new("SELECT 1; DROP TABLE videos;")).unwrap_err();
        assert_eq!(err, PolicyError::MultipleStatements);
    }

    #[test]
    fn single_trailing_semicolon_is_fine() {
        assert!(validate(CandidateSql::new("SELECT 1;")).is_ok());
    }

    #[test]
    fn strips_sql_fences() {
        assert_eq!(
            strip_fences("```sql\nSELECT 1\n```"),
            "SELECT 1"
        );
    }

    #[test]
    fn strips_plain_fences_and_whitespace() {
        assert_eq!(strip_fences("  ```\nSELECT 2\n```  "), "SELECT 2");
    }

    #[test]
    fn leaves_unfenced_text_alone() {
        assert_eq!(strip_fences("SELECT 3"), "SELECT 3");
    }
}
