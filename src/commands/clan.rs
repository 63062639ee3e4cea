use crate::card::list_line;
use crate::commands::{no_row_message, reply_failure};
use crate::emoji::guild_emojis;
use crate::matching::{find_row, search_hits, text_hits};
use crate::panel::{post_card, run_browser, run_filter_panel};
use crate::{Context, Error};
use tracing::info;

const LIST_LIMIT: usize = 15;
const BROWSER_LIMIT: usize = 50;

async fn post_one(ctx: Context<'_>, query: &str, tab: Option<&str>) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let table = match ctx.data().sheets.table(tab).await {
        Ok(table) => table,
        Err(e) => return reply_failure(ctx, "Post", e).await,
    };
    let Some(record) = find_row(&table, query) else {
        ctx.reply(no_row_message(query, &table)).await?;
        return Ok(());
    };

    let emojis = guild_emojis(ctx.serenity_context(), ctx.guild_id());
    match post_card(
        ctx.serenity_context(),
        ctx.data(),
        ctx.channel_id(),
        record,
        &table.title,
        &emojis,
    )
    .await
    {
        Ok(message) => {
            info!("Posted clan card for '{}' as message {}", query, message.id);
            if let poise::Context::Application(_) = ctx {
                ctx.send(
                    poise::CreateReply::default()
                        .content("Posted ✅")
                        .ephemeral(true),
                )
                .await?;
            }
            Ok(())
        }
        Err(e) => reply_failure(ctx, "Post", e).await,
    }
}

/// Post one clan card
#[poise::command(prefix_command, slash_command)]
pub async fn clan(
    ctx: Context<'_>,
    #[description = "Clan tag or name"]
    #[rest]
    query: Option<String>,
) -> Result<(), Error> {
    let query = query.unwrap_or_default();
    if query.trim().is_empty() {
        ctx.reply("Usage: `!clan <tag|name>` — posts one card. See `!help`.")
            .await?;
        return Ok(());
    }
    post_one(ctx, query.trim(), None).await
}

/// Post one clan card from a given tab
#[poise::command(prefix_command, slash_command)]
pub async fn cmpost(
    ctx: Context<'_>,
    #[description = "Clan tag or name"] clan: String,
    #[description = "Worksheet tab"] tab: Option<String>,
) -> Result<(), Error> {
    post_one(ctx, &clan, tab.as_deref()).await
}

/// Quick text list of matching clans
#[poise::command(prefix_command, slash_command)]
pub async fn cmsearch(
    ctx: Context<'_>,
    #[description = "Part of a clan tag or name"]
    #[rest]
    text: String,
) -> Result<(), Error> {
    ctx.defer().await?;
    let table = match ctx.data().sheets.table(None).await {
        Ok(table) => table,
        Err(e) => return reply_failure(ctx, "Search", e).await,
    };
    let hits = text_hits(&table, &text, LIST_LIMIT);
    if hits.is_empty() {
        ctx.reply("No matches.").await?;
        return Ok(());
    }
    let lines: Vec<String> = hits.into_iter().map(list_line).collect();
    ctx.reply(lines.join("\n")).await?;
    Ok(())
}

async fn open_browser(ctx: Context<'_>, text: &str) -> Result<(), Error> {
    ctx.defer().await?;
    let table = match ctx.data().sheets.table(None).await {
        Ok(table) => table,
        Err(e) => return reply_failure(ctx, "Search", e).await,
    };
    let hits: Vec<_> = search_hits(&table, text, BROWSER_LIMIT)
        .into_iter()
        .cloned()
        .collect();
    let heading = if text.trim().is_empty() {
        "Open clans".to_string()
    } else {
        format!("Results for **{}**", text.trim())
    };
    run_browser(ctx, hits, table.title.clone(), heading).await
}

/// Browse clans one card at a time
#[poise::command(prefix_command, slash_command)]
pub async fn clansearch(
    ctx: Context<'_>,
    #[description = "Clan tag or name (empty shows open clans)"]
    #[rest]
    text: Option<String>,
) -> Result<(), Error> {
    open_browser(ctx, text.as_deref().unwrap_or_default()).await
}

/// Find a clan with filters, or browse matches for a text query
#[poise::command(prefix_command, slash_command)]
pub async fn clanmatch(
    ctx: Context<'_>,
    #[description = "Clan tag or name (empty opens the filter panel)"]
    #[rest]
    text: Option<String>,
) -> Result<(), Error> {
    match text.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => open_browser(ctx, t).await,
        _ => run_filter_panel(ctx).await,
    }
}
