use clanmatch::sheets::cache::run_expiry_sweeper;
use clanmatch::sheets::google::GoogleSheets;
use clanmatch::sheets::{SheetCache, SheetService};
use clanmatch::summary::DailySummary;
use clanmatch::welcome::WelcomeState;
use clanmatch::{cache::PostedCards, commands, config::Config, events, Data, Error};
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const POSTED_CARD_CAPACITY: usize = 500;

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::UnknownCommand {
            ctx, msg, prefix, ..
        } => {
            let text = format!("❓ Unknown command. Try `{}help`.", prefix);
            if let Err(e) = msg.reply(ctx, text).await {
                warn!("Could not answer unknown command: {}", e);
            }
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Command '{}' failed: {}", ctx.command().name, error);
            if let Err(e) = ctx.reply(commands::command_error_text(&error)).await {
                warn!("Could not report command error: {}", e);
            }
        }
        poise::FrameworkError::ArgumentParse {
            error, input, ctx, ..
        } => {
            warn!(
                "Command '{}' got bad arguments {:?}: {}",
                ctx.command().name,
                input,
                error
            );
            if let Err(e) = ctx.reply(commands::command_error_text(&error)).await {
                warn!("Could not report argument error: {}", e);
            }
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration: {:?}", config);
    let discord_token = config.discord_token.clone();

    let source = Arc::new(GoogleSheets::new(&config, reqwest::Client::new()));
    let sheets = Arc::new(SheetService::new(
        source,
        SheetCache::new(config.sheet_cache_ttl),
        config.default_tab.clone(),
    ));

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(config.command_prefix.clone()),
                ..Default::default()
            },
            on_error: |error| Box::pin(on_error(error)),
            event_handler: |ctx, event, framework, data| {
                Box::pin(events::event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                info!("Bot is ready!");
                if config.register_commands {
                    poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                    info!("Registered slash commands globally");
                }

                tokio::spawn(run_expiry_sweeper(
                    sheets.cache().clone(),
                    config.sheet_cache_ttl,
                ));

                let welcome = WelcomeState::new(config.welcome_enabled);
                if let Err(e) = welcome
                    .reload(&ctx.http, &sheets, &config.welcome_tab, config.log_channel_id)
                    .await
                {
                    warn!("Welcome templates not loaded at startup: {}", e);
                }

                match config.recruiters_channel_id {
                    Some(channel_id) => {
                        let summary = DailySummary::new(
                            sheets.clone(),
                            ctx.http.clone(),
                            channel_id,
                            config.recruiter_role_ids.clone(),
                            config.daily_summary_hour_utc,
                        );
                        tokio::spawn(summary.run());
                    }
                    None => info!("RECRUITERS_CHANNEL_ID not set; daily summary disabled"),
                }

                Ok(Data {
                    config,
                    sheets,
                    welcome,
                    posted: PostedCards::new(POSTED_CARD_CAPACITY),
                })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::GUILD_MESSAGE_REACTIONS;

    let mut client = serenity::ClientBuilder::new(&discord_token, intents)
        .framework(framework)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    info!("Starting bot...");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}
