//! Interactive messages bound to one command invocation.
//!
//! Component custom ids are prefixed with the poise invocation id so two
//! panels open in the same channel never react to each other's clicks.

use poise::serenity_prelude as serenity;
use tracing::warn;

use crate::cache::PostedCard;
use crate::card::{clan_name, clan_tag, ClanCard, PROFILE_EMOJI};
use crate::emoji::GuildEmoji;
use crate::sheets::Record;
use crate::Data;

pub mod browser;
pub mod filters;

pub use browser::run_browser;
pub use filters::run_filter_panel;

pub(crate) struct ComponentIds {
    prefix: String,
}

impl ComponentIds {
    pub fn new(ctx_id: u64) -> Self {
        Self {
            prefix: format!("{ctx_id}_"),
        }
    }

    pub fn id(&self, action: &str) -> String {
        format!("{}{}", self.prefix, action)
    }

    /// The action part of a custom id owned by this invocation.
    pub fn action<'a>(&self, custom_id: &'a str) -> Option<&'a str> {
        custom_id.strip_prefix(self.prefix.as_str())
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

pub(crate) async fn reject_foreign_user(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    owner: serenity::UserId,
) {
    let _ = interaction
        .create_response(
            ctx,
            serenity::CreateInteractionResponse::Message(
                serenity::CreateInteractionResponseMessage::new()
                    .content(format!("Only <@{}> can use this panel.", owner))
                    .ephemeral(true),
            ),
        )
        .await;
}

/// Sends a clan card without pings, adds the 💡 reaction and remembers the
/// message so the reaction can be resolved later.
pub async fn post_card(
    ctx: &serenity::Context,
    data: &Data,
    channel_id: serenity::ChannelId,
    record: &Record,
    tab: &str,
    emojis: &[GuildEmoji],
) -> Result<serenity::Message, serenity::Error> {
    let embed = ClanCard::from_record(record).to_embed(emojis);
    let message = channel_id
        .send_message(
            ctx,
            serenity::CreateMessage::new()
                .embed(embed)
                .allowed_mentions(serenity::CreateAllowedMentions::new()),
        )
        .await?;

    if let Err(e) = message
        .react(ctx, serenity::ReactionType::Unicode(PROFILE_EMOJI.to_string()))
        .await
    {
        warn!("Could not add profile reaction to {}: {}", message.id, e);
    }

    let tag = match clan_tag(record) {
        t if t.is_empty() => clan_name(record),
        t => t,
    };
    data.posted.insert(
        message.id,
        PostedCard {
            tab: tab.to_string(),
            tag,
        },
    );
    Ok(message)
}
