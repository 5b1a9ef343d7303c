use assert_cmd::prelude::*;
use httpmock::{Method::GET, MockServer};
use predicates::prelude::*;
use std::path::Path;
use std::process::Command;

fn write_credentials(state_dir: &Path) {
    let cred = serde_json::json!({
        "consumer_key": "ck",
        "consumer_secret": "cs",
        "access_token": "at",
        "access_token_secret": "ats",
    });
    std::fs::create_dir_all(state_dir).unwrap();
    std::fs::write(
        state_dir.join("credentials.json"),
        serde_json::to_string(&cred).unwrap(),
    )
    .unwrap();
}

fn cli(state_dir: &Path, api_url: &str) -> Command {
    let mut cmd = Command::cargo_bin("twitter-cli").unwrap();
    cmd.env("TWITTER_API_KEY", "ck")
        .env("TWITTER_API_SECRET", "cs")
        .env("TWITTER_API_URL", api_url)
        .env("TWITTER_STATE_DIR", state_dir)
        .arg("--log-level")
        .arg("warn");
    cmd
}

#[test]
fn user_lookup_records_authoritative_rate_headers() {
    let server = MockServer::start();
    let reset = chrono::Utc::now().timestamp() + 86_400;
    let m = server.mock(|when, then| {
        when.method(GET).path("/users/by/username/jack");
        then.status(200)
            .header("x-rate-limit-limit", "25")
            .header("x-rate-limit-remaining", "24")
            .header("x-rate-limit-reset", reset.to_string())
            .json_body(serde_json::json!({
                "data": {"id": "12", "username": "jack", "name": "Jack"}
            }));
    });
    let dir = tempfile::tempdir().unwrap();
    write_credentials(dir.path());

    cli(dir.path(), &server.base_url())
        .args(["user", "jack"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"username\": \"jack\""));
    m.assert();

    // The response headers are authoritative and override the speculative
    // decrement persisted before the call.
    let ledger: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("quota.json")).unwrap())
            .unwrap();
    let q = &ledger["GET /2/users/by/username"];
    assert_eq!(q["limit"], 25);
    assert_eq!(q["remaining"], 24);
    assert_eq!(q["reset_at"], reset);
}

#[test]
fn double_rejection_fails_after_exactly_two_attempts() {
    let server = MockServer::start();
    let m = server.mock(|when, then| {
        when.method(GET).path("/users/by/username/jack");
        // Reset already in the past, so the single retry happens immediately.
        then.status(429).header("x-rate-limit-reset", "0");
    });
    let dir = tempfile::tempdir().unwrap();
    write_credentials(dir.path());

    cli(dir.path(), &server.base_url())
        .args(["user", "jack"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("rate limit exceeded"));
    m.assert_hits(2);

    // The ledger holds the server's rejection.
    let ledger: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("quota.json")).unwrap())
            .unwrap();
    assert_eq!(ledger["GET /2/users/by/username"]["remaining"], 0);
}

#[test]
fn api_errors_propagate_without_quota_mutation() {
    let server = MockServer::start();
    let m = server.mock(|when, then| {
        when.method(GET).path("/users/by/username/jack");
        then.status(500).body("upstream down");
    });
    let dir = tempfile::tempdir().unwrap();
    write_credentials(dir.path());

    cli(dir.path(), &server.base_url())
        .args(["user", "jack"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("API error 500"));
    m.assert_hits(1);

    // Only the speculative reservation is recorded; no rejection.
    let ledger: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("quota.json")).unwrap())
            .unwrap();
    assert_eq!(ledger["GET /2/users/by/username"]["remaining"], 24);
}

#[test]
fn limits_command_prints_tracked_state() {
    let dir = tempfile::tempdir().unwrap();
    write_credentials(dir.path());
    let ledger = serde_json::json!({
        "GET /2/tweets/search/recent": {
            "limit": 1,
            "remaining": 0,
            "reset_at": 4_102_444_800i64,
            "last_updated": 4_102_444_000i64,
        }
    });
    std::fs::write(
        dir.path().join("quota.json"),
        serde_json::to_string(&ledger).unwrap(),
    )
    .unwrap();

    cli(dir.path(), "http://127.0.0.1:1")
        .arg("limits")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "GET /2/tweets/search/recent: 0/1 remaining",
        ));
}

#[test]
fn overlong_tweet_is_rejected_locally() {
    let dir = tempfile::tempdir().unwrap();
    write_credentials(dir.path());
    let text = "x".repeat(281);
    cli(dir.path(), "http://127.0.0.1:1")
        .args(["post", &text])
        .assert()
        .failure()
        .stderr(predicate::str::contains("280 character limit"));
    // No call was attempted, so no quota entry exists.
    assert!(!dir.path().join("quota.json").exists());
}

#[test]
fn reset_cache_clears_credentials() {
    let dir = tempfile::tempdir().unwrap();
    write_credentials(dir.path());
    cli(dir.path(), "http://127.0.0.1:1")
        .arg("reset-cache")
        .assert()
        .success();
    assert!(!dir.path().join("credentials.json").exists());
}
