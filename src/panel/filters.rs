use poise::futures_util::StreamExt;
use poise::serenity_prelude as serenity;
use serenity::{
    ButtonStyle, ComponentInteractionCollector, ComponentInteractionDataKind, CreateActionRow,
    CreateButton, CreateEmbed, CreateInteractionResponse, CreateInteractionResponseFollowup,
    CreateInteractionResponseMessage, CreateMessage, CreateSelectMenu, CreateSelectMenuKind,
    CreateSelectMenuOption, EditMessage,
};
use tracing::{debug, warn};

use super::{reject_foreign_user, ComponentIds};
use crate::card::{plural, ClanCard, CARD_COLOR};
use crate::emoji::{guild_emojis, GuildEmoji};
use crate::matching::{filter_rows, ClanFilters, Difficulty};
use crate::sheets::Record;
use crate::{Context, Error};

pub const PAGE_SIZE: usize = 5;
pub const PLAYSTYLES: [&str; 4] = ["Stress Free", "Casual", "Semi Competitive", "Competitive"];

const ANY: &str = "any";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelAction {
    ClanBoss(Option<Difficulty>),
    Hydra(Option<Difficulty>),
    Chimera(Option<Difficulty>),
    Playstyle(Option<String>),
    ToggleCvc,
    ToggleSiege,
    CycleRoster,
    Search,
    Reset,
    PrevPage,
    NextPage,
}

impl PanelAction {
    /// Decodes the action part of a custom id plus any selected values.
    pub fn parse(action: &str, values: &[String]) -> Option<Self> {
        let picked = values.first().map(String::as_str).filter(|v| *v != ANY);
        let tier = || picked.and_then(Difficulty::from_code);
        let action = match action {
            "cb" => PanelAction::ClanBoss(tier()),
            "hydra" => PanelAction::Hydra(tier()),
            "chimera" => PanelAction::Chimera(tier()),
            "style" => PanelAction::Playstyle(picked.map(str::to_string)),
            "cvc" => PanelAction::ToggleCvc,
            "siege" => PanelAction::ToggleSiege,
            "roster" => PanelAction::CycleRoster,
            "search" => PanelAction::Search,
            "reset" => PanelAction::Reset,
            "page_prev" => PanelAction::PrevPage,
            "page_next" => PanelAction::NextPage,
            _ => return None,
        };
        Some(action)
    }
}

/// What the panel loop has to do after an action was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    RedrawPanel,
    Search,
    RedrawResults,
}

/// Any → Yes → No → Any
fn cycle(value: Option<bool>) -> Option<bool> {
    match value {
        None => Some(true),
        Some(true) => Some(false),
        Some(false) => None,
    }
}

fn toggle_label(name: &str, value: Option<bool>) -> String {
    let state = match value {
        None => "Any",
        Some(true) => "Yes",
        Some(false) => "No",
    };
    format!("{}: {}", name, state)
}

/// Filter state plus the cached results of the last search.
#[derive(Debug, Clone, Default)]
pub struct FilterPanel {
    pub filters: ClanFilters,
    results: Vec<Record>,
    relaxed: bool,
    page: usize,
}

impl FilterPanel {
    pub fn apply(&mut self, action: PanelAction) -> Effect {
        match action {
            PanelAction::ClanBoss(d) => self.filters.clan_boss = d,
            PanelAction::Hydra(d) => self.filters.hydra = d,
            PanelAction::Chimera(d) => self.filters.chimera = d,
            PanelAction::Playstyle(style) => self.filters.playstyle = style,
            PanelAction::ToggleCvc => self.filters.cvc = cycle(self.filters.cvc),
            PanelAction::ToggleSiege => self.filters.siege = cycle(self.filters.siege),
            PanelAction::CycleRoster => self.filters.roster = self.filters.roster.next(),
            PanelAction::Reset => self.filters = ClanFilters::default(),
            PanelAction::Search => return Effect::Search,
            PanelAction::PrevPage => {
                self.page = self.page.saturating_sub(1);
                return Effect::RedrawResults;
            }
            PanelAction::NextPage => {
                if self.page + 1 < self.page_count() {
                    self.page += 1;
                }
                return Effect::RedrawResults;
            }
        }
        Effect::RedrawPanel
    }

    pub fn set_results(&mut self, results: Vec<Record>, relaxed: bool) {
        self.results = results;
        self.relaxed = relaxed;
        self.page = 0;
    }

    pub fn page_count(&self) -> usize {
        self.results.len().div_ceil(PAGE_SIZE)
    }

    pub fn page_rows(&self) -> &[Record] {
        let start = (self.page * PAGE_SIZE).min(self.results.len());
        let end = (start + PAGE_SIZE).min(self.results.len());
        &self.results[start..end]
    }

    pub fn embed(&self) -> CreateEmbed {
        CreateEmbed::new()
            .title("Clan Match")
            .description(format!(
                "**Filters:** {}\nPick your filters, then press **Search**.",
                self.filters.summary()
            ))
            .color(CARD_COLOR)
    }

    fn difficulty_menu(
        ids: &ComponentIds,
        action: &str,
        placeholder: &str,
        current: Option<Difficulty>,
    ) -> CreateActionRow {
        let mut options = vec![CreateSelectMenuOption::new("Any", ANY).default_selection(current.is_none())];
        options.extend(Difficulty::ALL.iter().map(|d| {
            CreateSelectMenuOption::new(d.label(), d.code()).default_selection(current == Some(*d))
        }));
        CreateActionRow::SelectMenu(
            CreateSelectMenu::new(ids.id(action), CreateSelectMenuKind::String { options })
                .placeholder(placeholder),
        )
    }

    fn playstyle_menu(&self, ids: &ComponentIds) -> CreateActionRow {
        let current = self.filters.playstyle.as_deref();
        let mut options = vec![CreateSelectMenuOption::new("Any", ANY).default_selection(current.is_none())];
        options.extend(PLAYSTYLES.iter().map(|style| {
            CreateSelectMenuOption::new(*style, *style).default_selection(current == Some(*style))
        }));
        CreateActionRow::SelectMenu(
            CreateSelectMenu::new(ids.id("style"), CreateSelectMenuKind::String { options })
                .placeholder("Playstyle"),
        )
    }

    pub(crate) fn controls(&self, ids: &ComponentIds) -> Vec<CreateActionRow> {
        let f = &self.filters;
        vec![
            Self::difficulty_menu(ids, "cb", "Clan Boss difficulty", f.clan_boss),
            Self::difficulty_menu(ids, "hydra", "Hydra difficulty", f.hydra),
            Self::difficulty_menu(ids, "chimera", "Chimera difficulty", f.chimera),
            self.playstyle_menu(ids),
            CreateActionRow::Buttons(vec![
                CreateButton::new(ids.id("cvc"))
                    .label(toggle_label("CvC", f.cvc))
                    .style(ButtonStyle::Secondary),
                CreateButton::new(ids.id("siege"))
                    .label(toggle_label("Siege", f.siege))
                    .style(ButtonStyle::Secondary),
                CreateButton::new(ids.id("roster"))
                    .label(f.roster.label())
                    .style(ButtonStyle::Secondary),
                CreateButton::new(ids.id("search"))
                    .label("Search")
                    .style(ButtonStyle::Primary),
                CreateButton::new(ids.id("reset"))
                    .label("Reset")
                    .style(ButtonStyle::Danger),
            ]),
        ]
    }

    pub fn results_content(&self) -> String {
        if self.results.is_empty() {
            return "No clans match these filters.".to_string();
        }
        let mut content = format!("Found {}", plural(self.results.len() as i64, "clan"));
        if self.relaxed {
            content.push_str(" (no exact matches, showing broader results)");
        }
        if self.page_count() > 1 {
            content.push_str(&format!(" • page {}/{}", self.page + 1, self.page_count()));
        }
        content
    }

    fn results_embeds(&self, emojis: &[GuildEmoji]) -> Vec<CreateEmbed> {
        self.page_rows()
            .iter()
            .map(|r| ClanCard::from_record(r).to_embed(emojis))
            .collect()
    }

    fn results_controls(&self, ids: &ComponentIds) -> Vec<CreateActionRow> {
        if self.page_count() <= 1 {
            return Vec::new();
        }
        vec![CreateActionRow::Buttons(vec![
            CreateButton::new(ids.id("page_prev"))
                .label("◀ Prev")
                .style(ButtonStyle::Secondary)
                .disabled(self.page == 0),
            CreateButton::new(ids.id("page_next"))
                .label("Next ▶")
                .style(ButtonStyle::Secondary)
                .disabled(self.page + 1 >= self.page_count()),
        ])]
    }
}

/// Posts the results message on the first search and edits it afterwards.
async fn show_results(
    ctx: Context<'_>,
    panel: &FilterPanel,
    ids: &ComponentIds,
    emojis: &[GuildEmoji],
    results_msg: &mut Option<serenity::Message>,
) -> Result<(), Error> {
    let sctx = ctx.serenity_context();
    if let Some(message) = results_msg.as_mut() {
        let edited = message
            .edit(
                sctx,
                EditMessage::new()
                    .content(panel.results_content())
                    .embeds(panel.results_embeds(emojis))
                    .components(panel.results_controls(ids)),
            )
            .await;
        match edited {
            Ok(()) => return Ok(()),
            Err(e) => warn!("Results message {} could not be edited: {}", message.id, e),
        }
    }

    let message = ctx
        .channel_id()
        .send_message(
            sctx,
            CreateMessage::new()
                .content(panel.results_content())
                .embeds(panel.results_embeds(emojis))
                .components(panel.results_controls(ids))
                .allowed_mentions(serenity::CreateAllowedMentions::new()),
        )
        .await?;
    *results_msg = Some(message);
    Ok(())
}

/// Swaps the expired panel's controls for a Reload button.
async fn offer_reload(
    ctx: Context<'_>,
    ids: &ComponentIds,
    panel_msg: &mut serenity::Message,
    results_msg: &mut Option<serenity::Message>,
) -> Result<(), Error> {
    let sctx = ctx.serenity_context();
    if let Some(message) = results_msg.as_mut() {
        let _ = message
            .edit(sctx, EditMessage::new().components(Vec::new()))
            .await;
    }
    panel_msg
        .edit(
            sctx,
            EditMessage::new()
                .content("⏱️ This panel timed out.")
                .components(vec![CreateActionRow::Buttons(vec![CreateButton::new(
                    ids.id("reload"),
                )
                .label("Reload")
                .style(ButtonStyle::Primary)])]),
        )
        .await?;
    Ok(())
}

/// Puts the panel and result controls back after Reload.
async fn restore_panel(
    ctx: Context<'_>,
    panel: &FilterPanel,
    ids: &ComponentIds,
    interaction: &serenity::ComponentInteraction,
    results_msg: &mut Option<serenity::Message>,
) -> Result<(), Error> {
    let sctx = ctx.serenity_context();
    interaction
        .create_response(
            sctx,
            CreateInteractionResponse::UpdateMessage(
                CreateInteractionResponseMessage::new()
                    .content("")
                    .embed(panel.embed())
                    .components(panel.controls(ids)),
            ),
        )
        .await?;
    if let Some(message) = results_msg.as_mut() {
        let _ = message
            .edit(sctx, EditMessage::new().components(panel.results_controls(ids)))
            .await;
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Step {
    Ignore,
    Reload,
    Act(PanelAction),
}

/// What a click means given whether the panel has timed out.
fn next_step(expired: bool, action: Option<&str>, values: &[String]) -> Step {
    match (expired, action) {
        (true, Some("reload")) => Step::Reload,
        (true, _) | (false, None) => Step::Ignore,
        (false, Some(action)) => match PanelAction::parse(action, values) {
            Some(action) => Step::Act(action),
            None => Step::Ignore,
        },
    }
}

/// Dropdown and button panel for filtering the clan sheet.
pub async fn run_filter_panel(ctx: Context<'_>) -> Result<(), Error> {
    let sctx = ctx.serenity_context();
    let ids = ComponentIds::new(ctx.id());
    let owner = ctx.author().id;
    let timeout = ctx.data().config.panel_timeout;
    let emojis = guild_emojis(sctx, ctx.guild_id());

    let mut panel = FilterPanel::default();
    let reply = ctx
        .send(
            poise::CreateReply::default()
                .embed(panel.embed())
                .components(panel.controls(&ids)),
        )
        .await?;
    let mut panel_msg = reply.into_message().await?;
    let mut results_msg: Option<serenity::Message> = None;

    // Single collector for the panel's lifetime; clicks made during a sheet
    // fetch queue up instead of being dropped.
    let prefix = ids.prefix().to_string();
    let mut interactions = Box::pin(
        ComponentInteractionCollector::new(sctx)
            .channel_id(ctx.channel_id())
            .filter(move |i| i.data.custom_id.starts_with(&prefix))
            .stream(),
    );
    let mut expired = false;

    loop {
        let next = tokio::time::timeout(timeout, interactions.next()).await;
        let Ok(Some(interaction)) = next else {
            if expired {
                debug!("Clan match panel {} closed", panel_msg.id);
                let _ = panel_msg
                    .edit(sctx, EditMessage::new().components(Vec::new()))
                    .await;
                return Ok(());
            }
            offer_reload(ctx, &ids, &mut panel_msg, &mut results_msg).await?;
            expired = true;
            continue;
        };

        if interaction.user.id != owner {
            reject_foreign_user(sctx, &interaction, owner).await;
            continue;
        }

        let values: &[String] = match &interaction.data.kind {
            ComponentInteractionDataKind::StringSelect { values } => values,
            _ => &[],
        };
        let action = match next_step(expired, ids.action(&interaction.data.custom_id), values) {
            Step::Ignore => continue,
            Step::Reload => {
                restore_panel(ctx, &panel, &ids, &interaction, &mut results_msg).await?;
                expired = false;
                continue;
            }
            Step::Act(action) => action,
        };

        match panel.apply(action) {
            Effect::RedrawPanel => {
                interaction
                    .create_response(
                        sctx,
                        CreateInteractionResponse::UpdateMessage(
                            CreateInteractionResponseMessage::new()
                                .embed(panel.embed())
                                .components(panel.controls(&ids)),
                        ),
                    )
                    .await?;
            }
            Effect::RedrawResults => {
                interaction
                    .create_response(
                        sctx,
                        CreateInteractionResponse::UpdateMessage(
                            CreateInteractionResponseMessage::new()
                                .content(panel.results_content())
                                .embeds(panel.results_embeds(&emojis))
                                .components(panel.results_controls(&ids)),
                        ),
                    )
                    .await?;
            }
            Effect::Search => {
                interaction
                    .create_response(sctx, CreateInteractionResponse::Acknowledge)
                    .await?;
                match ctx.data().sheets.table(None).await {
                    Ok(table) => {
                        let outcome = filter_rows(&table, &panel.filters);
                        let relaxed = outcome.relaxed;
                        panel.set_results(outcome.rows.into_iter().cloned().collect(), relaxed);
                        show_results(ctx, &panel, &ids, &emojis, &mut results_msg).await?;
                    }
                    Err(e) => {
                        warn!("Clan match search failed: {}", e);
                        interaction
                            .create_followup(
                                sctx,
                                CreateInteractionResponseFollowup::new()
                                    .content(format!("❌ Search failed: `{}`", e))
                                    .ephemeral(true),
                            )
                            .await?;
                    }
                }
            }
        }
    }
}
