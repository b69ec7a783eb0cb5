//! Matching incoming lines against a rule table

use rand::Rng;
use rand::seq::IndexedRandom;
use regex::Regex;

use super::{Pattern, Rule, RuleTable};

/// One rule/template pair eligible as the reply to a line
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub rule: &'a Rule,
    pub template: &'a str,
}

/// The chosen reply for a line
#[derive(Debug, Clone)]
pub struct Selection<'a> {
    pub rule: &'a Rule,
    pub template: &'a str,
    /// Capture groups 1..n of a regex rule, empty for literal rules
    pub groups: Vec<Option<String>>,
}

impl Pattern {
    /// Whether `line` triggers this pattern
    ///
    /// Literal patterns need the whole line to match; regexes search anywhere.
    #[must_use]
    pub fn matches(&self, line: &str) -> bool {
        match self {
            Self::Literal(text) => line == text,
            Self::CaseInsensitive(folded) => line.to_lowercase() == *folded,
            Self::Regex { regex, .. } => regex.is_match(line),
        }
    }
}

impl RuleTable {
    /// Every (rule, template) pair whose rule matches `line`.
    ///
    /// A rule with N templates contributes N candidates.
    #[must_use]
    pub fn candidates(&self, line: &str) -> Vec<Candidate<'_>> {
        self.rules
            .iter()
            .filter(|rule| rule.pattern.matches(line))
            .flat_map(|rule| {
                rule.templates
                    .iter()
                    .map(move |template| Candidate { rule, template })
            })
            .collect()
    }

    /// Pick one candidate uniformly at random using `rng`
    pub fn select<R: Rng + ?Sized>(&self, line: &str, rng: &mut R) -> Option<Selection<'_>> {
        let candidates = self.candidates(line);
        let chosen = candidates.choose(rng)?;

        let groups = match &chosen.rule.pattern {
            Pattern::Regex { regex, .. } => capture_groups(regex, line),
            _ => Vec::new(),
        };

        Some(Selection {
            rule: chosen.rule,
            template: chosen.template,
            groups,
        })
    }

    /// Pick the reply for `line` with the thread-local RNG.
    ///
    /// Returns `None` when nothing matches, which is the normal outcome for
    /// most lines.
    #[must_use]
    pub fn find_reply(&self, line: &str) -> Option<Selection<'_>> {
        self.select(line, &mut rand::rng())
    }
}

/// Groups 1..n of the first match; groups that did not participate are `None`
fn capture_groups(regex: &Regex, line: &str) -> Vec<Option<String>> {
    regex
        .captures(line)
        .map(|captures| {
            captures
                .iter()
                .skip(1)
                .map(|group| group.map(|m| m.as_str().to_string()))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::compile;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashMap;

    fn table(text: &str) -> RuleTable {
        let output = compile(text);
        assert!(output.errors.is_empty(), "unexpected errors: {:?}", output.errors);
        output.table
    }

    #[test]
    fn test_no_match_gives_no_reply() {
        let table = table("hey=Hello\ni/test=Test failed\nr/^foo=bar");
        assert!(table.candidates("nothing to see").is_empty());
        assert!(table.find_reply("nothing to see").is_none());
        assert!(RuleTable::default().find_reply("hey").is_none());
    }

    #[test]
    fn test_case_insensitive_literal_needs_full_line() {
        let table = table("i/Hello=Hi");
        assert!(table.find_reply("hello").is_some());
        assert!(table.find_reply("HELLO").is_some());
        assert!(table.find_reply("Hello").is_some());
        assert!(table.find_reply("hello there").is_none());
        assert!(table.find_reply("oh hello").is_none());
    }

    #[test]
    fn test_case_sensitive_literal() {
        let table = table("hey=Hello");
        assert!(table.find_reply("hey").is_some());
        assert!(table.find_reply("Hey").is_none());
        assert!(table.find_reply("hey you").is_none());
    }

    #[test]
    fn test_regex_searches_anywhere() {
        let table = table("r/b[aeiou]r=found");
        assert!(table.find_reply("foo bar baz").is_some());
        assert!(table.find_reply("BAR").is_none());

        let folded = self::table("ir/b[aeiou]r=found");
        assert!(folded.find_reply("BAR").is_some());
    }

    #[test]
    fn test_regex_selection_carries_groups() {
        let table = table("r/(\\w+) loves (\\w+)?=ok");
        let selection = table.find_reply("alice loves bob").expect("Expected a match");
        assert_eq!(
            selection.groups,
            vec![Some("alice".to_string()), Some("bob".to_string())]
        );

        let table = self::table("r/(\\w+) loves( \\w+)?$=ok");
        let selection = table.find_reply("alice loves").expect("Expected a match");
        assert_eq!(selection.groups, vec![Some("alice".to_string()), None]);
    }

    #[test]
    fn test_literal_selection_has_no_groups() {
        let table = table("hey=Hello");
        let selection = table.find_reply("hey").expect("Expected a match");
        assert!(selection.groups.is_empty());
        assert_eq!(selection.template, "Hello");
    }

    #[test]
    fn test_all_matching_rules_contribute() {
        let table = table("hey=literal\ni/HEY=folded\nr/^h=regex\nr/^h=regex again\nr/zzz=never");
        let templates: Vec<&str> = table.candidates("hey").iter().map(|c| c.template).collect();
        assert_eq!(templates, vec!["literal", "folded", "regex", "regex again"]);
    }

    #[test]
    fn test_selection_is_uniform_over_templates() {
        let table = table("hi=a1\nhi=a2\nhi=a3\nr/^h=b1");
        let mut rng = StdRng::seed_from_u64(7);
        let mut counts: HashMap<String, usize> = HashMap::new();

        for _ in 0..4000 {
            let selection = table.select("hi", &mut rng).expect("Expected a match");
            *counts.entry(selection.template.to_string()).or_default() += 1;
        }

        assert_eq!(counts.len(), 4);
        for (template, count) in &counts {
            assert!(
                (800..=1200).contains(count),
                "template {template} chosen {count} times"
            );
        }
    }
}
