use poise::serenity_prelude as serenity;
use serenity::{
    ButtonStyle, CreateActionRow, CreateButton, CreateInteractionResponse,
    CreateInteractionResponseMessage, EditMessage,
};
use tracing::debug;

use super::{post_card, reject_foreign_user, ComponentIds};
use crate::card::ClanCard;
use crate::emoji::{guild_emojis, GuildEmoji};
use crate::sheets::Record;
use crate::{Context, Error};

/// Cursor over search hits. Navigation wraps around at both ends.
#[derive(Debug, Clone)]
pub struct Browser {
    hits: Vec<Record>,
    index: usize,
}

impl Browser {
    pub fn new(hits: Vec<Record>) -> Option<Self> {
        if hits.is_empty() {
            return None;
        }
        Some(Self { hits, index: 0 })
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn current(&self) -> &Record {
        &self.hits[self.index]
    }

    pub fn next(&mut self) {
        self.index = (self.index + 1) % self.hits.len();
    }

    pub fn prev(&mut self) {
        self.index = (self.index + self.hits.len() - 1) % self.hits.len();
    }

    pub fn position(&self) -> String {
        format!("Result {}/{}", self.index + 1, self.hits.len())
    }

    fn card(&self) -> ClanCard {
        ClanCard::from_record(self.current()).with_footer_suffix(&self.position())
    }

    fn embed(&self, emojis: &[GuildEmoji]) -> serenity::CreateEmbed {
        self.card().to_embed(emojis)
    }
}

fn controls(ids: &ComponentIds, disabled: bool) -> Vec<CreateActionRow> {
    let button = |action: &str, label: &str, style: ButtonStyle| {
        CreateButton::new(ids.id(action))
            .label(label)
            .style(style)
            .disabled(disabled)
    };
    vec![CreateActionRow::Buttons(vec![
        button("prev", "◀ Prev", ButtonStyle::Secondary),
        button("next", "Next ▶", ButtonStyle::Secondary),
        button("post", "Post Here", ButtonStyle::Success),
        button("close", "Close", ButtonStyle::Danger),
    ])]
}

/// Shows one hit at a time with Prev / Next / Post Here / Close.
pub async fn run_browser(
    ctx: Context<'_>,
    hits: Vec<Record>,
    tab: String,
    heading: String,
) -> Result<(), Error> {
    let Some(mut browser) = Browser::new(hits) else {
        ctx.reply("No matches. Try a different tag/name.").await?;
        return Ok(());
    };

    let sctx = ctx.serenity_context();
    let ids = ComponentIds::new(ctx.id());
    let owner = ctx.author().id;
    let timeout = ctx.data().config.panel_timeout;
    let emojis = guild_emojis(sctx, ctx.guild_id());

    let reply = ctx
        .send(
            poise::CreateReply::default()
                .content(heading)
                .embed(browser.embed(&emojis))
                .components(controls(&ids, false))
                .allowed_mentions(serenity::CreateAllowedMentions::new()),
        )
        .await?;
    let mut message = reply.into_message().await?;

    loop {
        let Some(interaction) = message
            .await_component_interaction(sctx)
            .timeout(timeout)
            .await
        else {
            debug!("Clan browser {} timed out", message.id);
            let _ = message
                .edit(sctx, EditMessage::new().components(controls(&ids, true)))
                .await;
            return Ok(());
        };

        if interaction.user.id != owner {
            reject_foreign_user(sctx, &interaction, owner).await;
            continue;
        }

        let action = ids.action(&interaction.data.custom_id);
        match action {
            Some("prev") | Some("next") => {
                if action == Some("prev") {
                    browser.prev();
                } else {
                    browser.next();
                }
                interaction
                    .create_response(
                        sctx,
                        CreateInteractionResponse::UpdateMessage(
                            CreateInteractionResponseMessage::new().embed(browser.embed(&emojis)),
                        ),
                    )
                    .await?;
            }
            Some("post") => {
                let note = match post_card(
                    sctx,
                    ctx.data(),
                    ctx.channel_id(),
                    browser.current(),
                    &tab,
                    &emojis,
                )
                .await
                {
                    Ok(_) => "Posted ✅".to_string(),
                    Err(e) => format!("❌ Post failed: `{}`", e),
                };
                interaction
                    .create_response(
                        sctx,
                        CreateInteractionResponse::Message(
                            CreateInteractionResponseMessage::new()
                                .content(note)
                                .ephemeral(true),
                        ),
                    )
                    .await?;
            }
            Some("close") => {
                interaction
                    .create_response(
                        sctx,
                        CreateInteractionResponse::UpdateMessage(
                            CreateInteractionResponseMessage::new().components(controls(&ids, true)),
                        ),
                    )
                    .await?;
                return Ok(());
            }
            _ => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::table::table_from;

    fn browser() -> Browser {
        let table = table_from(&[
            &["Clan Tag", "Clan Name"],
            &["ALP", "Alpha"],
            &["BET", "Beta"],
            &["GAM", "Gamma"],
        ]);
        Browser::new(table.records.clone()).unwrap()
    }

    #[test]
    fn test_empty_hits_have_no_browser() {
        assert!(Browser::new(Vec::new()).is_none());
    }

    #[test]
    fn test_navigation_wraps() {
        let mut b = browser();
        assert_eq!(b.position(), "Result 1/3");
        b.prev();
        assert_eq!(b.position(), "Result 3/3");
        assert_eq!(b.current().get("Clan Tag"), Some("GAM"));
        b.next();
        b.next();
        assert_eq!(b.current().get("Clan Tag"), Some("BET"));
        assert_eq!(b.len(), 3);
    }

    #[test]
    fn test_card_footer_carries_position() {
        let mut b = browser();
        b.next();
        let card = b.card();
        assert!(card.footer.ends_with("Result 2/3"));
        assert!(card.title.starts_with("Beta | BET"));
    }
}
