pub mod commands;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "beacon",
    about = "Beacon operator CLI",
    long_about = "Inspect beacon configuration, post hack night reminders, and sign payloads for local webhook testing.",
    after_help = "Examples:\n  beacon config\n  beacon remind --channel hack-night\n  beacon sign --body '{\"command\":\"/checkin\"}'"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Post the in-person sign-up reminder for the next hack night")]
    Remind {
        #[arg(long, help = "Channel to post in (defaults to slack.checkins_channel)")]
        channel: Option<String>,
        #[arg(long, help = "Hack night date as YYYY-MM-DD (defaults to the next Tuesday)")]
        date: Option<NaiveDate>,
    },
    #[command(about = "Print Slack signature headers for a raw request body")]
    Sign {
        #[arg(long, help = "Raw request body exactly as it will be sent")]
        body: String,
        #[arg(long, help = "Unix timestamp to sign with (defaults to now)")]
        timestamp: Option<i64>,
        #[arg(long, help = "Signing secret (defaults to slack.signing_secret)")]
        secret: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Remind { channel, date } => commands::remind::run(channel, date),
        Command::Sign { body, timestamp, secret } => commands::sign::run(&body, timestamp, secret),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
