use dotenvy::dotenv;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{ChosenInlineResult, InlineQuery};
use tiktok_relay_bot::bot::delivery::{DeliveryAdapter, TelegramSink};
use tiktok_relay_bot::bot::handlers::{self, Command};
use tiktok_relay_bot::config::{MirrorRegistry, Settings};
use tiktok_relay_bot::resolver::{BrowserSettings, ChromeDriver, MediaResolver};
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting the bot token from logs
struct RedactionPatterns {
    token_in_url: Regex,
    bare_token: Regex,
    token_after_bot: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token_in_url: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            bare_token: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            token_after_bot: Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = input.to_string();
        output = self
            .token_in_url
            .replace_all(&output, "$1[TELEGRAM_TOKEN]$3")
            .to_string();
        output = self
            .bare_token
            .replace_all(&output, "[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .token_after_bot
            .replace_all(&output, "$1[TELEGRAM_TOKEN]")
            .to_string();
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // We return the original buffer length to satisfy the contract,
        // even if the redacted string length differs.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Initialize redaction patterns early (before logging)
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    // Setup logging with redaction
    init_logging(patterns);

    info!("Starting TikTok Relay Bot...");

    // Load settings
    let settings = init_settings();

    // Mirror registry: ordered, explicit, built once at startup
    let registry = MirrorRegistry::from_settings(&settings);
    let mirror = registry.default_mirror().clone();
    info!(mirror = mirror.id, base_url = %mirror.base_url, "mirror registry initialized");

    // Resolution pipeline: one isolated browser session per request
    let driver = Arc::new(ChromeDriver::new(
        BrowserSettings::from_settings(&settings),
        mirror.clone(),
    ));
    let resolver = Arc::new(MediaResolver::new(driver, mirror));

    // Initialize Bot
    let bot = Bot::new(settings.telegram_token.clone());

    // Delivery adapter over the Telegram sink
    let sink = Arc::new(TelegramSink::new(bot.clone()));
    let delivery = Arc::new(DeliveryAdapter::new(sink, settings.download_dir.clone()));

    // Setup handlers
    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![resolver, delivery])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Settings {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(
            Update::filter_message().branch(
                dptree::entry()
                    .filter_command::<Command>()
                    .endpoint(handle_command),
            ),
        )
        .branch(
            Update::filter_message()
                .filter(|msg: Message| msg.text().is_some())
                .endpoint(handle_link_message),
        )
        .branch(Update::filter_inline_query().endpoint(handle_inline_query))
        .branch(Update::filter_chosen_inline_result().endpoint(handle_chosen_result))
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::command(bot, msg, cmd).await {
        error!("Command handler error: {}", e);
    }
    respond(())
}

async fn handle_link_message(
    bot: Bot,
    msg: Message,
    resolver: Arc<MediaResolver>,
    delivery: Arc<DeliveryAdapter>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::link_message(bot, msg, resolver, delivery).await {
        error!("Link message handler error: {}", e);
    }
    respond(())
}

async fn handle_inline_query(bot: Bot, query: InlineQuery) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::inline_query(bot, query).await {
        error!("Inline query handler error: {}", e);
    }
    respond(())
}

async fn handle_chosen_result(
    bot: Bot,
    chosen: ChosenInlineResult,
    resolver: Arc<MediaResolver>,
    delivery: Arc<DeliveryAdapter>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::chosen_result(bot, chosen, resolver, delivery).await {
        error!("Chosen result handler error: {}", e);
    }
    respond(())
}
