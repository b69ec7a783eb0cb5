//! Rule table compilation

use std::collections::HashMap;

use regex::RegexBuilder;

use super::{Pattern, Rule, RuleError, RuleResult, RuleTable};

/// A compiled table plus one error per line that had to be skipped
#[derive(Debug, Default)]
pub struct CompileOutput {
    pub table: RuleTable,
    pub errors: Vec<RuleError>,
}

/// Compile rule text into a table.
///
/// Never fails as a whole: malformed lines are skipped and reported in
/// [`CompileOutput::errors`]. Lines with the same pattern accumulate their
/// replies on one rule.
#[must_use]
pub fn compile(text: &str) -> CompileOutput {
    let mut rules: Vec<Rule> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut errors = Vec::new();

    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (pattern, reply) = match parse_line(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                errors.push(e);
                continue;
            }
        };

        let key = pattern.key();
        if let Some(&position) = index.get(&key) {
            rules[position].templates.push(reply);
        } else {
            index.insert(key, rules.len());
            rules.push(Rule {
                pattern,
                templates: vec![reply],
            });
        }
    }

    CompileOutput {
        table: RuleTable { rules },
        errors,
    }
}

/// Parse one non-comment line into its pattern and reply template
fn parse_line(line: &str) -> RuleResult<(Pattern, String)> {
    let (lhs, reply) = split_reply(line).ok_or_else(|| RuleError::MissingReply {
        line: line.to_string(),
    })?;
    let (case_insensitive, is_regex, body) = split_flags(lhs);

    let pattern = if is_regex {
        let regex = RegexBuilder::new(body)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|source| RuleError::InvalidRegex {
                pattern: lhs.to_string(),
                source,
            })?;
        Pattern::Regex {
            regex,
            case_insensitive,
        }
    } else if case_insensitive {
        Pattern::CaseInsensitive(unescape_separator(body).to_lowercase())
    } else {
        Pattern::Literal(unescape_separator(body))
    };

    Ok((pattern, reply.to_string()))
}

/// Split on the first `=` that is not preceded by a backslash
fn split_reply(line: &str) -> Option<(&str, &str)> {
    let mut previous = None;
    for (position, c) in line.char_indices() {
        if c == '=' && previous != Some('\\') {
            return Some((&line[..position], &line[position + 1..]));
        }
        previous = Some(c);
    }
    None
}

/// Strip a recognized flag prefix: returns (ignore case, regex, remainder)
fn split_flags(lhs: &str) -> (bool, bool, &str) {
    const FLAGS: [(&str, bool, bool); 4] = [
        ("ir/", true, true),
        ("ri/", true, true),
        ("i/", true, false),
        ("r/", false, true),
    ];

    FLAGS
        .iter()
        .find_map(|(prefix, case_insensitive, is_regex)| {
            lhs.strip_prefix(*prefix)
                .map(|rest| (*case_insensitive, *is_regex, rest))
        })
        .unwrap_or((false, false, lhs))
}

fn unescape_separator(text: &str) -> String {
    text.replace("\\=", "=")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_reply_on_first_unescaped_separator() {
        assert_eq!(split_reply("a=b=c"), Some(("a", "b=c")));
        assert_eq!(split_reply(r"1+1\=2=math"), Some((r"1+1\=2", "math")));
        assert_eq!(split_reply("=reply"), Some(("", "reply")));
        assert_eq!(split_reply(r"no\=separator"), None);
        assert_eq!(split_reply("nothing here"), None);
    }

    #[test]
    fn test_split_flags() {
        assert_eq!(split_flags("i/Hello"), (true, false, "Hello"));
        assert_eq!(split_flags("r/^he+y"), (false, true, "^he+y"));
        assert_eq!(split_flags("ir/x"), (true, true, "x"));
        assert_eq!(split_flags("ri/x"), (true, true, "x"));
        assert_eq!(split_flags("x/literal"), (false, false, "x/literal"));
        assert_eq!(split_flags("plain"), (false, false, "plain"));
    }

    #[test]
    fn test_compile_skips_comments_and_blank_lines() {
        let output = compile("# greeting rules\n\n   \nhey=Hello {sender}\n  # indented comment\n");
        assert!(output.errors.is_empty());
        assert_eq!(output.table.len(), 1);

        let rule = &output.table.rules()[0];
        assert!(matches!(&rule.pattern, Pattern::Literal(text) if text == "hey"));
        assert_eq!(rule.templates, vec!["Hello {sender}".to_string()]);
    }

    #[test]
    fn test_compile_flag_variants() {
        let output = compile("i/Hello=Hi\nr/^(foo|bar)=saw $1\nir/BAZ=baz\nri/qux=qux\nx/y=z");
        assert!(output.errors.is_empty());
        assert_eq!(output.table.len(), 5);

        let rules = output.table.rules();
        assert!(matches!(&rules[0].pattern, Pattern::CaseInsensitive(text) if text == "hello"));
        assert!(rules[1].is_regex() && !rules[1].case_insensitive());
        assert!(rules[2].is_regex() && rules[2].case_insensitive());
        assert!(rules[3].is_regex() && rules[3].case_insensitive());
        assert!(matches!(&rules[4].pattern, Pattern::Literal(text) if text == "x/y"));
    }

    #[test]
    fn test_duplicate_patterns_accumulate_replies() {
        let output = compile("hey=Hello\nhey=Hi there\nr/a+=one\nr/a+=two\nhey=Yo");
        assert_eq!(output.table.len(), 2);

        let hey = output.table.get("/hey").expect("Expected the literal rule");
        assert_eq!(hey.templates, vec!["Hello", "Hi there", "Yo"]);

        let regex = output.table.get("r/a+").expect("Expected the regex rule");
        assert_eq!(regex.templates, vec!["one", "two"]);
    }

    #[test]
    fn test_same_source_with_different_flags_are_distinct() {
        let output = compile("hey=a\ni/hey=b\nr/hey=c\nir/hey=d\nri/hey=e");
        assert_eq!(output.table.len(), 4);
        assert_eq!(
            output.table.get("ir/hey").map(|rule| rule.templates.clone()),
            Some(vec!["d".to_string(), "e".to_string()])
        );
    }

    #[test]
    fn test_malformed_lines_are_reported_not_fatal() {
        let output = compile("badregex=reply\nir/(unterminated=ok\nno separator here\nhey=Hello");

        assert_eq!(output.table.len(), 2);
        assert!(output.table.get("/badregex").is_some());
        assert!(output.table.get("/hey").is_some());

        assert_eq!(output.errors.len(), 2);
        assert!(matches!(&output.errors[0], RuleError::InvalidRegex { pattern, .. } if pattern == "ir/(unterminated"));
        assert!(matches!(&output.errors[1], RuleError::MissingReply { line } if line == "no separator here"));
    }

    #[test]
    fn test_escaped_separator_in_literal() {
        let output = compile(r"1+1\=2=correct");
        assert!(output.errors.is_empty());
        assert!(output.table.get("/1+1=2").is_some());
    }

    #[test]
    fn test_reply_keeps_further_separators() {
        let output = compile("x=a=b");
        assert_eq!(output.table.rules()[0].templates, vec!["a=b"]);
    }

    #[test]
    fn test_empty_text() {
        let output = compile("");
        assert!(output.table.is_empty());
        assert!(output.errors.is_empty());
    }
}
