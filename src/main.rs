use chrono::{DateTime, Utc};
use clap::ArgMatches;

use twitter_cli::api::TwitterApi;
use twitter_cli::{auth, cli, config, credentials};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cmd = cli::build_cli();
    let matches = cmd.get_matches();
    let log_level = matches.get_one::<String>("log-level").cloned();
    cli::init_logging(log_level.as_deref());

    if matches.get_flag("version") {
        println!("twitter-cli {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let Some((name, sub)) = matches.subcommand() else {
        cli::build_cli().print_help()?;
        println!();
        return Ok(());
    };

    let cfg = config::Config::from_env()?;
    let store = credentials::CredentialStore::new(&cfg.state_dir);

    if name == "reset-cache" {
        store.clear()?;
        println!("Cleared cached authorization tokens");
        return Ok(());
    }

    let credential = store.acquire(|| auth::pin_authorize(&cfg)).await?;
    let api = TwitterApi::new(&cfg, &credential)?;

    match name {
        "post" => run_post(&api, sub).await?,
        "delete" => {
            let id = required(sub, "tweet_id");
            api.delete_tweet(id).await?;
            println!("Deleted tweet {id}");
        }
        "like" => {
            let id = required(sub, "tweet_id");
            api.like(id).await?;
            println!("Liked tweet {id}");
        }
        "unlike" => {
            let id = required(sub, "tweet_id");
            api.unlike(id).await?;
            println!("Unliked tweet {id}");
        }
        "search" => {
            let query = required(sub, "query");
            let out = api.search(query, limit(sub)).await?;
            print_json(&out)?;
        }
        "tweet" => {
            let out = api.get_tweet(required(sub, "tweet_id")).await?;
            print_json(&out)?;
        }
        "user" => {
            let out = api.user_info(required(sub, "username")).await?;
            print_json(&out)?;
        }
        "tweets" => run_user_tweets(&api, sub).await?,
        "timeline" => {
            let out = api.home_timeline(limit(sub)).await?;
            print_json(&out)?;
        }
        "limits" => run_limits(&api)?,
        other => anyhow::bail!("unknown command: {other}"),
    }
    Ok(())
}

async fn run_post(api: &TwitterApi, sub: &ArgMatches) -> anyhow::Result<()> {
    let text = required(sub, "text");
    if text.chars().count() > 280 {
        anyhow::bail!("tweet exceeds the 280 character limit");
    }
    let reply_to = sub.get_one::<String>("reply-to").map(String::as_str);
    let out = api.create_tweet(text, reply_to).await?;
    println!(
        "Posted tweet {}",
        out["data"]["id"].as_str().unwrap_or("(unknown id)")
    );
    Ok(())
}

async fn run_user_tweets(api: &TwitterApi, sub: &ArgMatches) -> anyhow::Result<()> {
    let username = required(sub, "username");
    let user = api.user_info(username).await?;
    let Some(user_id) = user["data"]["id"].as_str() else {
        anyhow::bail!("user @{username} not found");
    };
    let out = api.user_tweets(user_id, limit(sub)).await?;
    print_json(&out)?;
    Ok(())
}

fn run_limits(api: &TwitterApi) -> anyhow::Result<()> {
    let snapshot = api.quota_snapshot()?;
    if snapshot.is_empty() {
        println!("No tracked endpoints yet");
        return Ok(());
    }
    for (key, q) in &snapshot {
        let reset = DateTime::<Utc>::from_timestamp(q.reset_at, 0)
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| q.reset_at.to_string());
        println!("{key}: {}/{} remaining, resets {reset}", q.remaining, q.limit);
    }
    Ok(())
}

fn required<'a>(sub: &'a ArgMatches, name: &str) -> &'a str {
    sub.get_one::<String>(name)
        .map(String::as_str)
        .unwrap_or_default()
}

fn limit(sub: &ArgMatches) -> u32 {
    sub.get_one::<u32>("limit").copied().unwrap_or(10)
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
