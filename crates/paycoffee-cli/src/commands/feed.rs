use paycoffee_core::error::FeedErrorKind;
use paycoffee_core::feed::{normalize, FeedSource, FeedState, HttpFeedSource};
use paycoffee_core::Config;

pub fn run(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let source = HttpFeedSource::new(config.feed_url()?);

    let state = super::runtime()?.block_on(async {
        match source.fetch().await {
            Ok(payload) => match normalize(&payload) {
                Ok(normalized) => FeedState::published(normalized.supporters),
                Err(kind) => FeedState::failed(kind),
            },
            Err(e) => FeedState::failed(FeedErrorKind::from(&e)),
        }
    });

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    match state.message() {
        Some(message) => println!("{message}"),
        None => {
            for supporter in &state.supporters {
                println!("{:<24} {:>10}", supporter.name, supporter.formatted_amount());
            }
        }
    }
    match state.error {
        Some(kind) => Err(format!("{} ({})", kind.user_message(), source.url()).into()),
        None => Ok(()),
    }
}
