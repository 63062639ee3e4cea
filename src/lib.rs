pub mod cache;
pub mod card;
pub mod commands;
pub mod config;
pub mod emoji;
pub mod events;
pub mod matching;
pub mod panel;
pub mod sheets;
pub mod summary;
pub mod welcome;

use std::sync::Arc;

/// Custom data passed to all commands
pub struct Data {
    pub config: config::Config,
    pub sheets: Arc<sheets::SheetService>,
    pub welcome: welcome::WelcomeState,
    /// Clan cards the bot posted, for 💡 lookups
    pub posted: cache::PostedCards,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
