//! Rule table parse errors

use thiserror::Error;

/// A rule line that could not be used
///
/// These never abort compilation; the offending line is skipped.
#[derive(Debug, Error)]
pub enum RuleError {
    /// The line has no unescaped `=` separating pattern from reply
    #[error("No reply found in {line}")]
    MissingReply { line: String },

    /// The pattern is flagged as a regex but does not compile
    #[error("Could not parse regex \"{pattern}\": {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Result type for rule operations
pub type RuleResult<T> = Result<T, RuleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = RuleError::MissingReply {
            line: "hello".to_string(),
        };
        assert_eq!(error.to_string(), "No reply found in hello");

        let source = regex::Regex::new("(").expect_err("Expected an invalid regex");
        let error = RuleError::InvalidRegex {
            pattern: "r/(".to_string(),
            source,
        };
        assert!(error.to_string().starts_with("Could not parse regex \"r/(\": "));
    }
}
