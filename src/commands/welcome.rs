use crate::emoji::{emoji_cdn_url, guild_emojis, GuildEmoji};
use crate::welcome::{
    expand, expand_all, format_now, has_permission, log_to_channel, LogLevel, Placeholders,
};
use crate::{Context, Error};
use chrono::Utc;
use poise::serenity_prelude as serenity;
use std::time::Duration;

const WELCOME_COLOR: u32 = 0x3498DB;
const CLEANUP_DELAY: Duration = Duration::from_secs(2);

/// The member who ran the command, as the welcome module sees them.
struct Invoker {
    name: String,
    roles: Vec<u64>,
}

async fn invoker(ctx: Context<'_>) -> Invoker {
    match ctx.author_member().await {
        Some(member) => Invoker {
            name: member.display_name().to_string(),
            roles: member.roles.iter().map(|r| r.get()).collect(),
        },
        None => Invoker {
            name: ctx.author().name.clone(),
            roles: Vec::new(),
        },
    }
}

struct Target {
    id: serenity::UserId,
    display_name: String,
}

impl Target {
    fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

/// The newcomer: first mention in the command, else the author of the
/// message being replied to.
async fn resolve_target(ctx: Context<'_>) -> Option<Target> {
    let poise::Context::Prefix(prefix_ctx) = ctx else {
        return None;
    };
    let msg = prefix_ctx.msg;
    let user = match msg.mentions.first() {
        Some(user) => user.clone(),
        None => msg.referenced_message.as_ref()?.author.clone(),
    };
    let display_name = match ctx.guild_id() {
        Some(guild_id) => match guild_id.member(ctx.serenity_context(), user.id).await {
            Ok(member) => member.display_name().to_string(),
            Err(_) => user.global_name.clone().unwrap_or_else(|| user.name.clone()),
        },
        None => user.name.clone(),
    };
    Some(Target {
        id: user.id,
        display_name,
    })
}

async fn send_general_notice(
    ctx: Context<'_>,
    text: &str,
    values: &Placeholders,
    target: Option<&Target>,
    emojis: &[GuildEmoji],
) {
    let data = ctx.data();
    let log_channel = data.config.log_channel_id;
    let Some(channel_id) = data.config.general_channel_id else {
        log_to_channel(
            ctx.http(),
            log_channel,
            LogLevel::Info,
            "General notice skipped",
            &[("cause", Some("general channel not set".to_string()))],
        )
        .await;
        return;
    };

    let notice_values = Placeholders {
        inviter: String::new(),
        ..values.clone()
    };
    let content = expand(text, &notice_values, emojis);
    let mentions = serenity::CreateAllowedMentions::new().users(target.map(|t| t.id));
    let sent = serenity::ChannelId::new(channel_id)
        .send_message(
            ctx.serenity_context(),
            serenity::CreateMessage::new()
                .content(content)
                .allowed_mentions(mentions),
        )
        .await;
    if let Err(e) = sent {
        log_to_channel(
            ctx.http(),
            log_channel,
            LogLevel::Warn,
            "General notice failed",
            &[("error", Some(e.to_string())), ("tag", Some(values.clan.clone()))],
        )
        .await;
    }
}

/// Post a clan welcome for a new member
#[poise::command(prefix_command, guild_only, user_cooldown = 10)]
pub async fn welcome(
    ctx: Context<'_>,
    #[description = "Clan tag"] clantag: String,
    #[rest] _member: Option<String>,
) -> Result<(), Error> {
    let data = ctx.data();
    let log_channel = data.config.log_channel_id;
    let tag = clantag.to_uppercase();
    let author = invoker(ctx).await;
    let user_kv = Some(format!("@{}", author.name));

    if !data.welcome.enabled() {
        log_to_channel(
            ctx.http(),
            log_channel,
            LogLevel::Info,
            "Module disabled • ignored command",
            &[("user", user_kv), ("tag", Some(tag))],
        )
        .await;
        ctx.reply("The welcome module is currently **off**.").await?;
        return Ok(());
    }

    if !has_permission(&author.roles, &data.config.welcome_allowed_roles) {
        log_to_channel(
            ctx.http(),
            log_channel,
            LogLevel::Error,
            "Permission denied",
            &[("user", user_kv), ("tag", Some(tag))],
        )
        .await;
        ctx.reply(format!(
            "You're not allowed to use `{}welcome`.",
            data.config.command_prefix
        ))
        .await?;
        return Ok(());
    }

    let target = resolve_target(ctx).await;

    let Some(template) = data.welcome.effective(&tag) else {
        log_to_channel(
            ctx.http(),
            log_channel,
            LogLevel::Error,
            "Failed to post",
            &[
                ("tag", Some(tag.clone())),
                ("cause", Some("no clan row or inactive and no C1C text".to_string())),
                ("action", Some("skipped general notice".to_string())),
            ],
        )
        .await;
        ctx.reply(format!(
            "I can't find an active welcome for **{}**. Ask an admin to add/activate it in the sheet.",
            tag
        ))
        .await?;
        return Ok(());
    };

    let Some(channel_id) = template.channel_id() else {
        log_to_channel(
            ctx.http(),
            log_channel,
            LogLevel::Error,
            "Failed to post",
            &[
                ("tag", Some(tag.clone())),
                ("cause", Some("missing/invalid TARGET_CHANNEL_ID".to_string())),
                ("action", Some("skipped general notice".to_string())),
            ],
        )
        .await;
        ctx.reply(format!("No target channel configured for **{}**.", tag))
            .await?;
        return Ok(());
    };

    let emojis = guild_emojis(ctx.serenity_context(), ctx.guild_id());
    let guild_name = ctx.guild().map(|g| g.name.clone()).unwrap_or_default();
    let values = Placeholders {
        mention: target.as_ref().map(Target::mention).unwrap_or_default(),
        username: target
            .as_ref()
            .map(|t| t.display_name.clone())
            .unwrap_or_default(),
        clan: tag.clone(),
        guild: guild_name,
        now: format_now(Utc::now()),
        inviter: author.name.clone(),
    };

    let title = expand_all(&template.title, &template, &values, &emojis);
    let body = expand_all(&template.body, &template, &values, &emojis);
    let footer = expand_all(&template.footer, &template, &values, &emojis);

    let mut embed = serenity::CreateEmbed::new()
        .description(body)
        .color(WELCOME_COLOR)
        .timestamp(serenity::Timestamp::now());
    if !title.is_empty() {
        embed = embed.title(title);
    }
    if template.crest_url.starts_with("http") {
        embed = embed.thumbnail(&template.crest_url);
    }
    if !footer.is_empty() {
        let mut embed_footer = serenity::CreateEmbedFooter::new(footer);
        if let Some(emoji_id) = data.config.footer_emoji_id {
            embed_footer = embed_footer.icon_url(emoji_cdn_url(&emojis, emoji_id));
        }
        embed = embed.footer(embed_footer);
    }

    let ping = match &target {
        Some(t) if template.ping_user => t.mention(),
        _ => String::new(),
    };
    let mentions = serenity::CreateAllowedMentions::new().users(target.as_ref().map(|t| t.id));
    let sent = serenity::ChannelId::new(channel_id)
        .send_message(
            ctx.serenity_context(),
            serenity::CreateMessage::new()
                .content(ping)
                .embed(embed)
                .allowed_mentions(mentions),
        )
        .await;
    if let Err(e) = sent {
        log_to_channel(
            ctx.http(),
            log_channel,
            LogLevel::Error,
            "Discord send failed",
            &[
                ("tag", Some(tag.clone())),
                ("channel", Some(channel_id.to_string())),
                ("error", Some(e.to_string())),
                ("action", Some("skipped general notice".to_string())),
            ],
        )
        .await;
        ctx.reply("Couldn't post the welcome in the clan channel.")
            .await?;
        return Ok(());
    }

    log_to_channel(
        ctx.http(),
        log_channel,
        LogLevel::Info,
        "Welcome posted",
        &[
            ("tag", Some(tag.clone())),
            ("channel", Some(channel_id.to_string())),
            ("user", target.as_ref().map(|t| format!("@{}", t.display_name))),
        ],
    )
    .await;

    let notice = data.welcome.general_notice();
    send_general_notice(ctx, &notice, &values, target.as_ref(), &emojis).await;

    if let poise::Context::Prefix(prefix_ctx) = ctx {
        tokio::time::sleep(CLEANUP_DELAY).await;
        if prefix_ctx.msg.delete(ctx.serenity_context()).await.is_err() {
            log_to_channel(
                ctx.http(),
                log_channel,
                LogLevel::Warn,
                "Cleanup warning • message delete failed",
                &[
                    ("channel", Some(ctx.channel_id().to_string())),
                    ("user", Some(format!("@{}", author.name))),
                ],
            )
            .await;
        }
    }
    Ok(())
}

/// Reload welcome templates from the sheet
#[poise::command(prefix_command, guild_only, rename = "welcome-refresh")]
pub async fn welcome_refresh(ctx: Context<'_>) -> Result<(), Error> {
    let data = ctx.data();
    let author = invoker(ctx).await;
    if !has_permission(&author.roles, &data.config.welcome_allowed_roles) {
        log_to_channel(
            ctx.http(),
            data.config.log_channel_id,
            LogLevel::Error,
            "Permission denied (refresh)",
            &[("user", Some(format!("@{}", author.name)))],
        )
        .await;
        ctx.reply("Not allowed.").await?;
        return Ok(());
    }

    match data
        .welcome
        .reload(
            ctx.http(),
            &data.sheets,
            &data.config.welcome_tab,
            data.config.log_channel_id,
        )
        .await
    {
        Ok(()) => ctx.reply("Welcome templates reloaded. ✅").await?,
        Err(e) => ctx.reply(format!("Reload failed: `{}`", e)).await?,
    };
    Ok(())
}

async fn set_enabled(ctx: Context<'_>, on: bool) -> Result<(), Error> {
    let data = ctx.data();
    let author = invoker(ctx).await;
    if !has_permission(&author.roles, &data.config.welcome_allowed_roles) {
        ctx.reply("Not allowed.").await?;
        return Ok(());
    }
    data.welcome.set_enabled(on);
    let (msg, state) = if on {
        ("Module enabled by user", "ON")
    } else {
        ("Module disabled by user", "OFF")
    };
    log_to_channel(
        ctx.http(),
        data.config.log_channel_id,
        LogLevel::Info,
        msg,
        &[("user", Some(format!("@{}", author.name)))],
    )
    .await;
    ctx.reply(format!("Welcome module: **{}**", state)).await?;
    Ok(())
}

/// Turn the welcome module on
#[poise::command(prefix_command, guild_only, rename = "welcome-on")]
pub async fn welcome_on(ctx: Context<'_>) -> Result<(), Error> {
    set_enabled(ctx, true).await
}

/// Turn the welcome module off
#[poise::command(prefix_command, guild_only, rename = "welcome-off")]
pub async fn welcome_off(ctx: Context<'_>) -> Result<(), Error> {
    set_enabled(ctx, false).await
}

/// Show whether the welcome module is on
#[poise::command(prefix_command, rename = "welcome-status")]
pub async fn welcome_status(ctx: Context<'_>) -> Result<(), Error> {
    let data = ctx.data();
    let (state, source) = data.welcome.status();
    log_to_channel(
        ctx.http(),
        data.config.log_channel_id,
        LogLevel::Info,
        "Status query",
        &[
            ("state", Some(state.to_string())),
            ("source", Some(source.to_string())),
        ],
    )
    .await;
    ctx.reply(format!("Welcome module is **{}** (source: {}).", state, source))
        .await?;
    Ok(())
}
