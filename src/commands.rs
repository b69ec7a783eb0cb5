use crate::settings::CHECK_UPDATE;
use crate::{ChatScope, Context, Error, rules};
use poise::command;

/// Rule table selectable from slash commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum ReplyScope {
    #[name = "public"]
    Public,
    #[name = "private"]
    Private,
}

impl From<ReplyScope> for ChatScope {
    fn from(scope: ReplyScope) -> Self {
        match scope {
            ReplyScope::Public => Self::Public,
            ReplyScope::Private => Self::Private,
        }
    }
}

/// Slash command options are single line, so `\n` stands for a line break.
fn unescape_newlines(text: &str) -> String {
    text.replace("\\n", "\n")
}

/// Basic ping command
/// This command is used to check if the bot is responsive.
#[command(prefix_command, slash_command, guild_only)]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say("Pong!").await?;
    Ok(())
}

/// Show the reply rules for public rooms or private chats
#[command(slash_command, required_permissions = "MANAGE_GUILD")]
pub async fn replies(
    ctx: Context<'_>,
    #[description = "Which rules to show"] scope: ReplyScope,
) -> Result<(), Error> {
    let text = ctx.data().reply_text(scope.into());
    if text.trim().is_empty() {
        ctx.say(format!("No {} rules configured", ChatScope::from(scope)))
            .await?;
    } else {
        ctx.say(format!("```\n{text}\n```")).await?;
    }
    Ok(())
}

/// Replace the reply rules, one `pattern=reply` per line
#[command(slash_command, required_permissions = "MANAGE_GUILD")]
pub async fn set_replies(
    ctx: Context<'_>,
    #[description = "Which rules to replace"] scope: ReplyScope,
    #[description = "Rule lines, separated by \\n"] text: String,
) -> Result<(), Error> {
    let scope = ChatScope::from(scope);
    let text = unescape_newlines(&text);
    let preview = rules::compile(&text);

    let data = ctx.data();
    data.settings.set(scope.setting_key(), text);
    data.save_settings().await?;

    let mut response = format!("Saved {} {scope} rule(s)", preview.table.len());
    for error in &preview.errors {
        response.push_str(&format!("\nSkipped: {error}"));
    }
    ctx.say(response).await?;
    Ok(())
}

/// Turn the periodic update check on or off
#[command(slash_command, required_permissions = "MANAGE_GUILD")]
pub async fn check_update(
    ctx: Context<'_>,
    #[description = "Whether to look for new releases"] enabled: bool,
) -> Result<(), Error> {
    let data = ctx.data();
    data.settings.set(CHECK_UPDATE, enabled);
    data.save_settings().await?;

    let mut response = format!("Update checks {}", if enabled { "enabled" } else { "disabled" });
    if let Some(tag) = data.plugin.available_update() {
        response.push_str(&format!("\nVersion {tag} is available"));
    }
    ctx.say(response).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test that the ping command is properly defined
    #[test]
    fn test_ping_command_definition() {
        let cmd = ping();
        assert_eq!(cmd.name, "ping");
        assert!(cmd.description.unwrap_or_default().contains("check if the bot is responsive"));
        assert!(cmd.guild_only);
    }

    #[test]
    fn test_rule_commands_are_slash_commands() {
        for cmd in [replies(), set_replies(), check_update()] {
            assert!(cmd.create_as_slash_command().is_some(), "{} is not a slash command", cmd.name);
            assert!(cmd.required_permissions.contains(poise::serenity_prelude::Permissions::MANAGE_GUILD));
        }
        assert_eq!(set_replies().parameters.len(), 2);
    }

    #[test]
    fn test_reply_scope_conversion() {
        assert_eq!(ChatScope::from(ReplyScope::Public), ChatScope::Public);
        assert_eq!(ChatScope::from(ReplyScope::Private), ChatScope::Private);
    }

    #[test]
    fn test_unescape_newlines() {
        assert_eq!(unescape_newlines(r"hey=Hello\ni/bye=Bye"), "hey=Hello\ni/bye=Bye");
        assert_eq!(unescape_newlines("single=line"), "single=line");
    }
}
