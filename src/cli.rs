use clap::{value_parser, Arg, ArgAction, Command};

pub fn build_cli() -> Command {
    Command::new("twitter-cli")
        .about("Rate-aware Twitter CLI (v2 API)")
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .num_args(1)
                .global(true)
                .help("Override RUST_LOG level (e.g., info, debug)"),
        )
        .arg(
            Arg::new("version")
                .long("version")
                .help("Print version and exit")
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("post")
                .about("Create a new tweet")
                .arg(Arg::new("text").required(true).help("Tweet text (max 280 characters)"))
                .arg(
                    Arg::new("reply-to")
                        .long("reply-to")
                        .num_args(1)
                        .help("Tweet ID to reply to"),
                ),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete a tweet")
                .arg(Arg::new("tweet_id").required(true)),
        )
        .subcommand(
            Command::new("like")
                .about("Like a tweet")
                .arg(Arg::new("tweet_id").required(true)),
        )
        .subcommand(
            Command::new("unlike")
                .about("Unlike a tweet")
                .arg(Arg::new("tweet_id").required(true)),
        )
        .subcommand(
            Command::new("search")
                .about("Search recent tweets")
                .arg(Arg::new("query").required(true))
                .arg(limit_arg("10")),
        )
        .subcommand(
            Command::new("tweet")
                .about("Fetch a single tweet")
                .arg(Arg::new("tweet_id").required(true)),
        )
        .subcommand(
            Command::new("user")
                .about("Get user information")
                .arg(Arg::new("username").required(true)),
        )
        .subcommand(
            Command::new("tweets")
                .about("Get a user's recent tweets")
                .arg(Arg::new("username").required(true))
                .arg(limit_arg("10")),
        )
        .subcommand(
            Command::new("timeline")
                .about("Get your home timeline")
                .arg(limit_arg("20")),
        )
        .subcommand(Command::new("limits").about("Show tracked rate-limit state per endpoint"))
        .subcommand(Command::new("reset-cache").about("Clear cached authorization tokens"))
}

fn limit_arg(default: &'static str) -> Arg {
    Arg::new("limit")
        .long("limit")
        .num_args(1)
        .value_parser(value_parser!(u32))
        .default_value(default)
        .help("Number of results to retrieve")
}

pub fn init_logging(level: Option<&str>) {
    // Respect explicit level, else default to info, allow env override via RUST_LOG
    if let Some(lvl) = level {
        std::env::set_var("RUST_LOG", lvl);
    } else if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
