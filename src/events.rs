use crate::card::{ProfileCard, PROFILE_EMOJI};
use crate::matching::find_row;
use crate::{Data, Error};
use poise::serenity_prelude as serenity;
use tracing::{debug, info, warn};

pub async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Ready { data_about_bot } => {
            info!(
                "Logged in as {} ({})",
                data_about_bot.user.name, data_about_bot.user.id
            );
            info!("Default data tab: {}", data.sheets.default_tab());
        }
        serenity::FullEvent::ReactionAdd { add_reaction } => {
            if let Err(e) = handle_profile_reaction(ctx, add_reaction, data).await {
                warn!("Profile reaction on {} failed: {}", add_reaction.message_id, e);
            }
        }
        _ => {}
    }
    Ok(())
}

pub(crate) fn is_profile_emoji(emoji: &serenity::ReactionType) -> bool {
    matches!(emoji, serenity::ReactionType::Unicode(s) if s == PROFILE_EMOJI)
}

/// Replies to a remembered clan card with the clan's profile.
async fn handle_profile_reaction(
    ctx: &serenity::Context,
    reaction: &serenity::Reaction,
    data: &Data,
) -> Result<(), Error> {
    if !is_profile_emoji(&reaction.emoji) {
        return Ok(());
    }
    if reaction.user_id == Some(ctx.cache.current_user().id) {
        return Ok(());
    }
    let Some(card) = data.posted.get(reaction.message_id) else {
        debug!("💡 on unknown message {}", reaction.message_id);
        return Ok(());
    };

    let table = data.sheets.table(Some(&card.tab)).await?;
    let Some(record) = find_row(&table, &card.tag) else {
        warn!("Clan '{}' no longer in tab '{}'", card.tag, card.tab);
        return Ok(());
    };

    let embed = ProfileCard::from_record(record).to_embed();
    reaction
        .channel_id
        .send_message(
            ctx,
            serenity::CreateMessage::new()
                .embed(embed)
                .reference_message((reaction.channel_id, reaction.message_id))
                .allowed_mentions(serenity::CreateAllowedMentions::new()),
        )
        .await?;
    info!("Posted profile for '{}' in channel {}", card.tag, reaction.channel_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_emoji_detection() {
        assert!(is_profile_emoji(&serenity::ReactionType::Unicode("💡".to_string())));
        assert!(!is_profile_emoji(&serenity::ReactionType::Unicode("👍".to_string())));
    }
}
