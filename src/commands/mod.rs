use crate::matching::search_keys;
use crate::sheets::Table;
use crate::{Context, Data, Error};

pub mod clan;
pub mod debug;
pub mod help;
pub mod welcome;

/// Every command the framework registers.
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        clan::clan(),
        clan::cmpost(),
        clan::cmsearch(),
        clan::clansearch(),
        clan::clanmatch(),
        debug::cmwhichsheet(),
        debug::cmheaders(),
        debug::cmchecksheet(),
        debug::cmdump(),
        debug::cmformat(),
        debug::cmrefresh(),
        help::help(),
        welcome::welcome(),
        welcome::welcome_refresh(),
        welcome::welcome_on(),
        welcome::welcome_off(),
        welcome::welcome_status(),
    ]
}

/// `❌ <Action> failed: `<error>`` reply for sheet-backed commands.
pub(crate) async fn reply_failure(
    ctx: Context<'_>,
    action: &str,
    err: impl std::fmt::Display,
) -> Result<(), Error> {
    ctx.reply(format!("❌ {} failed: `{}`", action, err)).await?;
    Ok(())
}

/// Reply text for a command that failed or could not parse its arguments.
pub fn command_error_text(err: &dyn std::fmt::Display) -> String {
    format!("⚠️ Command error: `{}`", err)
}

pub(crate) fn no_row_message(query: &str, table: &Table) -> String {
    let keys = search_keys(&table.headers);
    let searched = if keys.is_empty() {
        "—".to_string()
    } else {
        keys.join(", ")
    };
    format!(
        "❓ No row for `{}` in tab `{}`.\n(Searching in: {})",
        query, table.title, searched
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::table::table_from;

    #[test]
    fn test_no_row_message_lists_search_columns() {
        let table = table_from(&[&["Clan Tag", "Clan Name", "Level"], &["ALP", "Alpha", "5"]]);
        assert_eq!(
            no_row_message("zzz", &table),
            "❓ No row for `zzz` in tab `bot_info`.\n(Searching in: Clan Tag, Clan Name)"
        );

        let bare = table_from(&[&["Level"], &["5"]]);
        assert!(no_row_message("zzz", &bare).ends_with("(Searching in: —)"));
    }

    #[test]
    fn test_command_error_text() {
        let missing: Error = "Too few arguments".into();
        assert_eq!(
            command_error_text(&missing),
            "⚠️ Command error: `Too few arguments`"
        );
    }

    #[test]
    fn test_command_names() {
        let names: Vec<String> = all().into_iter().map(|c| c.name).collect();
        for expected in ["clan", "cmpost", "clanmatch", "cmdump", "help", "welcome-refresh"] {
            assert!(names.iter().any(|n| n == expected), "missing {}", expected);
        }
    }
}
