use clap::Subcommand;
use paycoffee_core::timer::{duration_or_default, parse_duration, TimerState};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Show the countdown a timer setting produces
    Parse {
        /// `MM:SS` or whole seconds
        input: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        TimerAction::Parse { input, json } => {
            let valid = parse_duration(&input).is_ok();
            let seconds = duration_or_default(&input);
            let display = TimerState::running(seconds).display();
            if json {
                let out = serde_json::json!({
                    "input": input,
                    "valid": valid,
                    "seconds": seconds,
                    "display": display,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("seconds: {seconds}");
                println!("display: {display}");
                if !valid {
                    println!("(invalid input, using default)");
                }
            }
        }
    }
    Ok(())
}
