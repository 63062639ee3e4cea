//! Sheet diagnostics for admins setting up the bot.

use crate::card::format_entry_criteria;
use crate::commands::{no_row_message, reply_failure};
use crate::matching::find_row;
use crate::{Context, Error};
use tracing::info;

const DUMP_LIMIT: usize = 1900;

/// Pretty JSON cut at `limit` characters.
pub(crate) fn truncate_dump(pretty: &str, limit: usize) -> String {
    if pretty.chars().count() <= limit {
        return pretty.to_string();
    }
    let cut: String = pretty.chars().take(limit).collect();
    format!("{}\n… (truncated)", cut)
}

/// Show which spreadsheet and tabs the bot is connected to
#[poise::command(prefix_command)]
pub async fn cmwhichsheet(ctx: Context<'_>) -> Result<(), Error> {
    let sheets = &ctx.data().sheets;
    match sheets.titles().await {
        Ok(titles) => {
            let tabs = if titles.is_empty() {
                "—".to_string()
            } else {
                titles.join(", ")
            };
            ctx.reply(format!(
                "✅ Connected to sheet `{}`.\nTabs: {}\nDefault tab: `{}`",
                sheets.spreadsheet_id(),
                tabs,
                sheets.default_tab()
            ))
            .await?;
            Ok(())
        }
        Err(e) => reply_failure(ctx, "Sheet connect", e).await,
    }
}

/// List the headers of a tab
#[poise::command(prefix_command)]
pub async fn cmheaders(ctx: Context<'_>, tab: Option<String>) -> Result<(), Error> {
    match ctx.data().sheets.table(tab.as_deref()).await {
        Ok(table) => {
            ctx.reply(format!(
                "Headers in `{}`:\n{}",
                table.title,
                table.headers.join(", ")
            ))
            .await?;
            Ok(())
        }
        Err(e) => reply_failure(ctx, "Headers", e).await,
    }
}

/// Check that a tab can be read
#[poise::command(prefix_command)]
pub async fn cmchecksheet(ctx: Context<'_>, tab: Option<String>) -> Result<(), Error> {
    let sheets = &ctx.data().sheets;
    let titles = match sheets.titles().await {
        Ok(titles) => titles,
        Err(e) => return reply_failure(ctx, "Matchmaker sheet check", e).await,
    };
    match sheets.table(tab.as_deref()).await {
        Ok(table) => {
            ctx.reply(format!(
                "✅ Connected. Tab `{}` rows: **{}**",
                table.title,
                table.len()
            ))
            .await?;
        }
        Err(e) if e.is_not_found() => {
            let wanted = tab.as_deref().unwrap_or(sheets.default_tab());
            let available = if titles.is_empty() {
                "—".to_string()
            } else {
                titles.join(", ")
            };
            ctx.reply(format!(
                "⚠️ Connected, but tab `{}` not found.\nAvailable: {}",
                wanted, available
            ))
            .await?;
        }
        Err(e) => return reply_failure(ctx, "Matchmaker sheet check", e).await,
    }
    Ok(())
}

/// Show exactly what the bot reads for one clan
#[poise::command(prefix_command)]
pub async fn cmdump(ctx: Context<'_>, clan: String, tab: Option<String>) -> Result<(), Error> {
    let table = match ctx.data().sheets.table(tab.as_deref()).await {
        Ok(table) => table,
        Err(e) => return reply_failure(ctx, "Dump", e).await,
    };
    let Some(record) = find_row(&table, &clan) else {
        ctx.reply(no_row_message(&clan, &table)).await?;
        return Ok(());
    };
    let pretty = serde_json::to_string_pretty(&record.to_json())?;
    ctx.reply(format!("```json\n{}\n```", truncate_dump(&pretty, DUMP_LIMIT)))
        .await?;
    Ok(())
}

/// Render the Entry Criteria text for one clan
#[poise::command(prefix_command)]
pub async fn cmformat(ctx: Context<'_>, clan: String, tab: Option<String>) -> Result<(), Error> {
    let table = match ctx.data().sheets.table(tab.as_deref()).await {
        Ok(table) => table,
        Err(e) => return reply_failure(ctx, "Format", e).await,
    };
    let Some(record) = find_row(&table, &clan) else {
        ctx.reply(no_row_message(&clan, &table)).await?;
        return Ok(());
    };
    ctx.reply(format_entry_criteria(record)).await?;
    Ok(())
}

/// Drop cached sheet data
#[poise::command(prefix_command)]
pub async fn cmrefresh(ctx: Context<'_>) -> Result<(), Error> {
    info!("Sheet cache refresh requested by {}", ctx.author().name);
    ctx.data().sheets.refresh();
    ctx.reply("♻️ Sheet cache cleared. The next command reads fresh data.")
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_dump() {
        assert_eq!(truncate_dump("short", 10), "short");
        assert_eq!(truncate_dump("abcdefghij", 4), "abcd\n… (truncated)");
        assert_eq!(truncate_dump("ééé", 2), "éé\n… (truncated)");
    }
}
