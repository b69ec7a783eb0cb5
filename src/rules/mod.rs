//! Rule tables
//!
//! A rule table maps incoming lines to reply templates. It is compiled from
//! text, one rule per line, in the form `flags/pattern=reply`:
//!
//! ```text
//! i/test=test failed
//! hey=Hello {sender}
//! # this is a comment
//! ir/^(foo|bar)=I SAW "$1", WOHOO!!
//! ```
//!
//! `i/` ignores case, `r/` treats the pattern as a regex, `ir/` or `ri/` does
//! both. Without a recognized flag the pattern must equal the whole line.

mod compiler;
mod error;
mod matcher;
mod render;

pub use compiler::{CompileOutput, compile};
pub use error::{RuleError, RuleResult};
pub use matcher::{Candidate, Selection};
pub use render::{PLACEHOLDERS, ReplyContext, render, unknown_placeholders};

use std::fmt::{Display, Formatter};

use regex::Regex;

/// How a rule decides whether a line matches
#[derive(Debug, Clone)]
pub enum Pattern {
    /// The line must equal the text exactly
    Literal(String),
    /// The case-folded line must equal the case-folded text
    CaseInsensitive(String),
    /// The regex must match somewhere in the line
    Regex { regex: Regex, case_insensitive: bool },
}

impl Pattern {
    /// Normalized identity of the pattern: flags plus source text
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::Literal(text) => format!("/{text}"),
            Self::CaseInsensitive(text) => format!("i/{text}"),
            Self::Regex {
                regex,
                case_insensitive: true,
            } => format!("ir/{}", regex.as_str()),
            Self::Regex {
                regex,
                case_insensitive: false,
            } => format!("r/{}", regex.as_str()),
        }
    }

    #[must_use]
    pub fn is_regex(&self) -> bool {
        matches!(self, Self::Regex { .. })
    }

    #[must_use]
    pub fn is_case_insensitive(&self) -> bool {
        match self {
            Self::Literal(_) => false,
            Self::CaseInsensitive(_) => true,
            Self::Regex {
                case_insensitive, ..
            } => *case_insensitive,
        }
    }
}

impl Display for Pattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(text) => write!(f, "{text}"),
            _ => write!(f, "{}", self.key()),
        }
    }
}

/// One pattern and every reply configured for it
#[derive(Debug, Clone)]
pub struct Rule {
    pub pattern: Pattern,
    pub templates: Vec<String>,
}

impl Rule {
    #[must_use]
    pub fn is_regex(&self) -> bool {
        self.pattern.is_regex()
    }

    #[must_use]
    pub fn case_insensitive(&self) -> bool {
        self.pattern.is_case_insensitive()
    }
}

/// Compiled rules for one chat context, in first-seen order
///
/// Immutable once built; a settings change builds a new table.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Look up a rule by its normalized pattern key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.pattern.key() == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_keys_include_flags() {
        let literal = Pattern::Literal("hey".to_string());
        let folded = Pattern::CaseInsensitive("hey".to_string());
        let regex = Pattern::Regex {
            regex: Regex::new("hey").expect("valid regex"),
            case_insensitive: false,
        };
        let folded_regex = Pattern::Regex {
            regex: Regex::new("hey").expect("valid regex"),
            case_insensitive: true,
        };

        let keys = [literal.key(), folded.key(), regex.key(), folded_regex.key()];
        assert_eq!(keys, ["/hey", "i/hey", "r/hey", "ir/hey"]);
    }

    #[test]
    fn test_pattern_flags() {
        let literal = Pattern::Literal("hey".to_string());
        assert!(!literal.is_regex());
        assert!(!literal.is_case_insensitive());
        assert_eq!(literal.to_string(), "hey");

        let folded = Pattern::CaseInsensitive("hey".to_string());
        assert!(folded.is_case_insensitive());
        assert_eq!(folded.to_string(), "i/hey");
    }
}
