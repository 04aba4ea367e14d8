use std::sync::Arc;

use clap::Subcommand;
use paycoffee_core::feed::HttpFeedSource;
use paycoffee_core::notify::{NotificationToken, ScreenInfo, TelegramNotifier, VisitInfo};
use paycoffee_core::payment::PaymentData;
use paycoffee_core::{
    CommandError, Config, SessionDeps, SessionHandle, SessionOrchestrator, SessionSettings,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Subcommand)]
pub enum SessionAction {
    /// Run a session, reading commands from stdin and printing events as JSON lines
    ///
    /// Commands: pay <button>, confirm <button> <amount>, retry, online,
    /// offline, status, quit. EOF also ends the session.
    Run {
        /// Countdown override, `MM:SS` or seconds
        #[arg(long)]
        timer: Option<String>,
        /// Start offline
        #[arg(long)]
        offline: bool,
        /// Page URL reported in the visit notification
        #[arg(long)]
        url: Option<String>,
        /// Referrer reported in the visit notification
        #[arg(long)]
        referrer: Option<String>,
        /// Visitor user agent
        #[arg(long)]
        user_agent: Option<String>,
        /// Visitor screen, `WxH` or `WxH@ratio`
        #[arg(long, value_parser = parse_screen)]
        screen: Option<ScreenInfo>,
    },
}

fn parse_screen(value: &str) -> Result<ScreenInfo, String> {
    ScreenInfo::parse(value).ok_or_else(|| format!("expected WxH or WxH@ratio, got '{value}'"))
}

/// One stdin line.
#[derive(Debug, Clone, PartialEq)]
enum Input {
    Pay(String),
    Confirm(PaymentData),
    Retry,
    Online,
    Offline,
    Status,
    Quit,
}

fn parse_input(line: &str) -> Result<Option<Input>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let input = match verb {
        "pay" => Input::Pay(words.next().ok_or("usage: pay <button>")?.to_string()),
        "confirm" => {
            let button_id = words.next().ok_or("usage: confirm <button> <amount>")?;
            let amount = words
                .next()
                .ok_or("usage: confirm <button> <amount>")?
                .parse::<f64>()
                .map_err(|e| format!("invalid amount: {e}"))?;
            Input::Confirm(PaymentData {
                button_id: button_id.to_string(),
                amount,
            })
        }
        "retry" => Input::Retry,
        "online" => Input::Online,
        "offline" => Input::Offline,
        "status" => Input::Status,
        "quit" | "exit" => Input::Quit,
        other => return Err(format!("unknown command: {other}")),
    };
    Ok(Some(input))
}

pub fn run(action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        SessionAction::Run {
            timer,
            offline,
            url,
            referrer,
            user_agent,
            screen,
        } => {
            let config = Config::load_or_default();
            let mut settings = SessionSettings::from_config(&config);
            if let Some(timer) = timer {
                settings.initial_duration = timer;
            }
            settings.initial_online = !offline;

            let mut visit = VisitInfo::new(url.unwrap_or_else(|| config.api.base_url.clone()));
            visit.referrer = referrer;
            visit.user_agent = user_agent;
            visit.screen = screen;

            let feed = HttpFeedSource::new(config.feed_url()?);
            let notifier = TelegramNotifier::with_api_url(
                &config.telegram.api_url,
                &config.telegram.bot_token,
                &config.telegram.chat_id,
            );
            if !config.telegram.is_configured() {
                tracing::info!("telegram credentials missing, notifications will fail");
            }

            super::runtime()?.block_on(drive(settings, feed, notifier, visit))
        }
    }
}

async fn drive(
    settings: SessionSettings,
    feed: HttpFeedSource,
    notifier: TelegramNotifier,
    visit: VisitInfo,
) -> Result<(), Box<dyn std::error::Error>> {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let deps = SessionDeps {
        feed: Arc::new(feed),
        notifier: Arc::new(notifier),
        visit,
        token: NotificationToken::default(),
        events: Some(events_tx),
    };
    let (session, handle) = SessionOrchestrator::new(settings, deps);
    let session = tokio::spawn(session.run());

    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "could not encode event"),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Ok(None) => {}
            Ok(Some(Input::Quit)) => break,
            Ok(Some(input)) => apply(&handle, input).await?,
            Err(message) => eprintln!("{message}"),
        }
    }

    // Already closed if the session ended on its own.
    let _ = handle.shutdown();
    drop(handle);
    let report = session.await?;
    printer.await?;
    println!(
        "{}",
        serde_json::json!({ "type": "SessionReport", "report": report })
    );
    Ok(())
}

async fn apply(handle: &SessionHandle, input: Input) -> Result<(), Box<dyn std::error::Error>> {
    match input {
        Input::Pay(button_id) => match handle.start_payment(button_id).await {
            Ok(()) | Err(CommandError::Rejected(_)) => {}
            Err(e) => return Err(e.into()),
        },
        Input::Confirm(payment) => handle.confirm_payment(payment)?,
        Input::Retry => handle.retry_feed_load()?,
        Input::Online => handle.set_online(true)?,
        Input::Offline => handle.set_online(false)?,
        Input::Status => {
            let snapshot = handle.snapshot();
            println!(
                "{}",
                serde_json::json!({ "type": "SessionSnapshot", "snapshot": snapshot })
            );
        }
        Input::Quit => {}
    }
    Ok(())
}
