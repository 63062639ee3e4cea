use crate::card::{clan_name, clan_tag, plural, to_int};
use crate::config::DISCORD_MESSAGE_LIMIT;
use crate::matching::SPOTS_KEYS;
use crate::sheets::{SheetService, Table};
use anyhow::Context as AnyhowContext;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serenity::all::{ChannelId, CreateAllowedMentions, CreateMessage, RoleId};
use serenity::http::Http;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

/// First `hour:00` UTC strictly after `now`.
pub fn next_run_after(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let today = now
        .date_naive()
        .and_hms_opt(hour.min(23), 0, 0)
        .map(|t| t.and_utc())
        .unwrap_or(now);
    if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    }
}

/// Message body listing every clan with open spots, role pings first.
pub fn build_summary(table: &Table, role_ids: &[u64]) -> String {
    let open: Vec<(String, i64)> = table
        .records
        .iter()
        .filter_map(|r| {
            let spots = r.pick(&SPOTS_KEYS).and_then(to_int).filter(|s| *s > 0)?;
            let tag = clan_tag(r);
            let line = match clan_name(r) {
                name if name.is_empty() => format!("• **{}** — {}", tag, plural(spots, "spot")),
                name => format!("• **{}** {} — {}", tag, name, plural(spots, "spot")),
            };
            Some((line, spots))
        })
        .collect();

    let pings: Vec<String> = role_ids.iter().map(|id| format!("<@&{}>", id)).collect();
    let mut out = String::new();
    if !pings.is_empty() {
        out.push_str(&pings.join(" "));
        out.push('\n');
    }

    if open.is_empty() {
        out.push_str("📣 Daily clan summary: no clans have open spots today.");
        return out;
    }

    let total = open.iter().fold(0i64, |acc, (_, s)| acc.saturating_add(*s));
    out.push_str(&format!(
        "📣 Daily clan summary: {} with open spots, {} in total.",
        plural(open.len() as i64, "clan"),
        plural(total, "spot")
    ));

    // Reserve room for the overflow line.
    let budget = DISCORD_MESSAGE_LIMIT - 40;
    for (i, (line, _)) in open.iter().enumerate() {
        if out.chars().count() + line.chars().count() + 1 > budget {
            out.push_str(&format!("\n…and {} more", open.len() - i));
            break;
        }
        out.push('\n');
        out.push_str(line);
    }
    out
}

/// Posts the open-spots summary to the recruiters channel once a day.
pub struct DailySummary {
    sheets: Arc<SheetService>,
    http: Arc<Http>,
    channel_id: ChannelId,
    role_ids: Vec<u64>,
    hour_utc: u32,
}

impl DailySummary {
    pub fn new(
        sheets: Arc<SheetService>,
        http: Arc<Http>,
        channel_id: u64,
        role_ids: Vec<u64>,
        hour_utc: u32,
    ) -> Self {
        Self {
            sheets,
            http,
            channel_id: ChannelId::new(channel_id),
            role_ids,
            hour_utc,
        }
    }

    pub async fn run(self) {
        loop {
            let now = Utc::now();
            let next = next_run_after(now, self.hour_utc);
            info!("Next daily clan summary at {}", next);
            sleep((next - now).to_std().unwrap_or(Duration::ZERO)).await;
            if let Err(e) = self.post().await {
                error!("Daily clan summary failed: {:#}", e);
            }
        }
    }

    async fn post(&self) -> anyhow::Result<()> {
        let table = self
            .sheets
            .table(None)
            .await
            .context("Failed to read the clan sheet")?;
        let content = build_summary(&table, &self.role_ids);
        let mentions = CreateAllowedMentions::new()
            .roles(self.role_ids.iter().map(|id| RoleId::new(*id)));
        self.channel_id
            .send_message(
                &self.http,
                CreateMessage::new()
                    .content(content)
                    .allowed_mentions(mentions),
            )
            .await
            .with_context(|| format!("Failed to post summary to channel {}", self.channel_id))?;
        info!("Posted daily clan summary to channel {}", self.channel_id);
        Ok(())
    }
}
