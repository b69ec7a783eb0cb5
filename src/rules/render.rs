//! Reply template rendering
//!
//! Templates may reference regex capture groups as `$1`, `$2`, ... and the
//! placeholders `{self}`, `{sender}` and `{room}`. Rendering is best effort:
//! anything it does not recognize is left as written.

/// Placeholder names understood by [`render`]
pub const PLACEHOLDERS: [&str; 3] = ["self", "sender", "room"];

/// Values for the named placeholders
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplyContext<'a> {
    /// The bot's own display name, for `{self}`
    pub own_name: &'a str,
    /// The author of the incoming line, for `{sender}`
    pub sender: &'a str,
    /// The room name, for `{room}`; empty in private chats
    pub room: &'a str,
}

impl ReplyContext<'_> {
    fn value_of(&self, name: &str) -> Option<&str> {
        match name {
            "self" => Some(self.own_name),
            "sender" => Some(self.sender),
            "room" => Some(self.room),
            _ => None,
        }
    }
}

/// Expand capture groups, then named placeholders.
///
/// `groups[0]` is capture group 1. A `$n` token whose group is missing or did
/// not participate in the match stays as literal text.
#[must_use]
pub fn render(template: &str, context: &ReplyContext<'_>, groups: &[Option<String>]) -> String {
    let expanded = if groups.is_empty() {
        template.to_string()
    } else {
        substitute_groups(template, groups)
    };
    substitute_placeholders(&expanded, context)
}

/// `{name}` tokens in `template` that are not known placeholders
#[must_use]
pub fn unknown_placeholders(template: &str) -> Vec<String> {
    let mut unknown = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        let tail = &rest[start..];
        if let Some(escaped) = tail.strip_prefix("{{") {
            rest = escaped;
            continue;
        }

        let Some(end) = tail.find('}') else {
            break;
        };
        let name = &tail[1..end];
        if name.contains('{') {
            // Rescan from the inner brace
            rest = &tail[1..];
            continue;
        }
        if !name.is_empty() && !PLACEHOLDERS.contains(&name) {
            unknown.push(name.to_string());
        }
        rest = &tail[end + 1..];
    }

    unknown
}

fn substitute_groups(template: &str, groups: &[Option<String>]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(dollar) = rest.find('$') {
        out.push_str(&rest[..dollar]);
        let after = &rest[dollar + 1..];
        let digits = after
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(after.len());

        let value = after[..digits]
            .parse::<usize>()
            .ok()
            .and_then(|index| index.checked_sub(1))
            .and_then(|index| groups.get(index))
            .and_then(Option::as_deref);

        match value {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[dollar..=dollar + digits]),
        }
        rest = &after[digits..];
    }

    out.push_str(rest);
    out
}

/// Single pass, so substituted values are never expanded again.
/// `{{` and `}}` produce literal braces.
fn substitute_placeholders(text: &str, context: &ReplyContext<'_>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(position) = rest.find(['{', '}']) {
        out.push_str(&rest[..position]);
        let tail = &rest[position..];

        if let Some(escaped) = tail.strip_prefix("{{") {
            out.push('{');
            rest = escaped;
            continue;
        }
        if let Some(escaped) = tail.strip_prefix("}}") {
            out.push('}');
            rest = escaped;
            continue;
        }

        if tail.starts_with('{') {
            if let Some(end) = tail.find('}') {
                if let Some(value) = context.value_of(&tail[1..end]) {
                    out.push_str(value);
                    rest = &tail[end + 1..];
                    continue;
                }
            }
        }

        out.push_str(&tail[..1]);
        rest = &tail[1..];
    }

    out.push_str(rest);
    out
}
