use crate::{Context, Error};

pub(crate) fn help_text(prefix: &str, default_tab: &str) -> String {
    let p = prefix;
    format!(
        "**C1C Matchmaker — Commands**\n\
         `{p}clan <tag|name>` → post one card (alias of `{p}cmpost`)\n\
         `{p}clanmatch` → filter panel · `{p}clanmatch <text>` → browser panel\n\
         `{p}clansearch [text]` → interactive browser panel\n\
         `{p}cmpost <tag|name> [tab]` · `{p}cmsearch <text>` (list)\n\
         `{p}cmdump <tag|name> [tab]` · `{p}cmformat <tag|name> [tab]`\n\
         `{p}cmwhichsheet` · `{p}cmchecksheet [tab]` · `{p}cmheaders [tab]` · `{p}cmrefresh`\n\
         `{p}welcome <tag> [@member]` · `{p}welcome-refresh` · `{p}welcome-on` · `{p}welcome-off` · `{p}welcome-status`\n\
         React 💡 on a posted card for the clan profile.\n\
         (Default tab: `{default_tab}` — change via env `C1C_MATCH_TAB`)"
    )
}

/// Show the command overview
#[poise::command(prefix_command, slash_command)]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    let data = ctx.data();
    ctx.reply(help_text(&data.config.command_prefix, data.sheets.default_tab()))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_uses_prefix_and_tab() {
        let text = help_text("?", "clans");
        assert!(text.contains("`?clan <tag|name>`"));
        assert!(text.contains("Default tab: `clans`"));
        assert!(!text.contains("`!"));
    }
}
