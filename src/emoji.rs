use poise::serenity_prelude as serenity;

const CDN_BASE: &str = "https://cdn.discordapp.com/emojis";

/// The parts of a guild emoji the formatter needs, detached from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildEmoji {
    pub id: u64,
    pub name: String,
    pub animated: bool,
}

impl GuildEmoji {
    /// Chat markup, e.g. `<:wolf:123>` or `<a:wolf:123>`.
    pub fn markup(&self) -> String {
        let prefix = if self.animated { "a" } else { "" };
        format!("<{}:{}:{}>", prefix, self.name, self.id)
    }

    pub fn url(&self) -> String {
        let ext = if self.animated { "gif" } else { "png" };
        format!("{}/{}.{}", CDN_BASE, self.id, ext)
    }
}

impl From<&serenity::Emoji> for GuildEmoji {
    fn from(emoji: &serenity::Emoji) -> Self {
        Self {
            id: emoji.id.get(),
            name: emoji.name.clone(),
            animated: emoji.animated,
        }
    }
}

/// Snapshot of a guild's custom emojis from the cache.
pub fn guild_emojis(ctx: &serenity::Context, guild_id: Option<serenity::GuildId>) -> Vec<GuildEmoji> {
    guild_id
        .and_then(|id| ctx.cache.guild(id))
        .map(|guild| guild.emojis.values().map(GuildEmoji::from).collect())
        .unwrap_or_default()
}

/// Whether the text is already emoji markup (`<:name:id>` / `<a:name:id>`).
pub fn is_emoji_markup(value: &str) -> bool {
    let Some(inner) = value.strip_prefix('<').and_then(|v| v.strip_suffix('>')) else {
        return false;
    };
    let inner = inner.strip_prefix('a').unwrap_or(inner);
    let Some(rest) = inner.strip_prefix(':') else {
        return false;
    };
    let Some((name, id)) = rest.split_once(':') else {
        return false;
    };
    !name.is_empty()
        && name.chars().all(|c| c.is_alphanumeric() || c == '_')
        && !id.is_empty()
        && id.chars().all(|c| c.is_ascii_digit())
}

/// Lowercase and drop everything but `[a-z0-9_]`.
pub fn sanitize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect()
}

/// Emoji by markup, numeric id, or case-insensitive name.
pub fn find_emoji<'a>(emojis: &'a [GuildEmoji], token: &str) -> Option<&'a GuildEmoji> {
    let mut token = token.trim();
    if is_emoji_markup(token) {
        token = token
            .trim_end_matches('>')
            .rsplit(':')
            .next()
            .unwrap_or_default();
    }
    if !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()) {
        let id: u64 = token.parse().ok()?;
        return emojis.iter().find(|e| e.id == id);
    }
    let lower = token.to_lowercase();
    emojis.iter().find(|e| e.name.to_lowercase() == lower)
}

fn resolve_token(emojis: &[GuildEmoji], token: &str) -> String {
    let token = token.trim();
    if token.chars().all(|c| c.is_ascii_digit()) && !token.is_empty() {
        return find_emoji(emojis, token)
            .map(GuildEmoji::markup)
            .unwrap_or_else(|| token.to_string());
    }
    let wanted = sanitize_name(token);
    emojis
        .iter()
        .find(|e| e.name.to_lowercase() == wanted)
        .map(GuildEmoji::markup)
        .unwrap_or_else(|| token.to_string())
}

/// Replaces `{EMOJI:name}` / `{EMOJI:id}` placeholders.
pub fn replace_emoji_tokens(text: &str, emojis: &[GuildEmoji]) -> String {
    const OPEN: &str = "{EMOJI:";
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(OPEN) {
        let after = &rest[start + OPEN.len()..];
        match after.find('}') {
            Some(end) if end > 0 => {
                out.push_str(&rest[..start]);
                out.push_str(&resolve_token(emojis, &after[..end]));
                rest = &after[end + 1..];
            }
            _ => {
                out.push_str(&rest[..start + OPEN.len()]);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// CDN URL for an emoji id; unknown ids default to png.
pub fn emoji_cdn_url(emojis: &[GuildEmoji], id: u64) -> String {
    emojis
        .iter()
        .find(|e| e.id == id)
        .map(GuildEmoji::url)
        .unwrap_or_else(|| format!("{}/{}.png", CDN_BASE, id))
}
