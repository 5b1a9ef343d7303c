//! The single call-site contract every command goes through: consult the
//! quota tracker, wait out an exhausted window when needed, perform the
//! call, and feed the authoritative outcome back into the tracker.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use log::{info, warn};

use crate::error::{Error, Result};
use crate::http::CallOutcome;
use crate::quota::{Decision, QuotaTracker};

/// Run `action` (exactly one remote call per invocation) under quota
/// control for `key`.
///
/// Optimistic local tracking means most calls proceed without sleeping; the
/// server's explicit rejection is the backstop when local state is wrong
/// (stale ledger, clock skew, another client on the same credential). One
/// rejection earns one wait-and-retry; a second consecutive rejection is
/// surfaced as fatal so a misbehaving endpoint cannot cause a retry storm.
pub async fn invoke<T, F, Fut>(tracker: &QuotaTracker, key: &str, mut action: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<CallOutcome<T>>>,
{
    match tracker.check_and_reserve(key)? {
        Decision::Allowed => {}
        Decision::Blocked {
            wait_secs,
            reset_at,
        } => {
            info!(
                "Quota exhausted for {}; waiting {}s until reset",
                key, wait_secs
            );
            wait_for_reset(key, wait_secs).await?;
            // One re-check after the computed wait. Still blocked means the
            // wait was miscalculated; error out instead of sleeping again.
            if let Decision::Blocked { wait_secs: _, .. } = tracker.check_and_reserve(key)? {
                return Err(Error::RateLimitExceeded {
                    endpoint: key.to_string(),
                    reset_at,
                    waited_secs: wait_secs,
                });
            }
        }
    }

    let mut rejected_once = false;
    let mut waited_secs = 0u64;
    loop {
        // Non-rate-limit failures propagate here untouched; the tracker
        // keeps only the speculative reservation for this call.
        match action().await? {
            CallOutcome::Success { value, rate } => {
                if let Some(rate) = rate {
                    if let (Some(remaining), Some(reset_at)) = (rate.remaining, rate.reset_at) {
                        tracker.record_outcome(key, rate.limit, remaining, reset_at)?;
                    }
                }
                return Ok(value);
            }
            CallOutcome::RateLimited { reset_at } => {
                let now = Utc::now().timestamp();
                let reset_at = reset_at.unwrap_or(now);
                tracker.record_rejection(key, reset_at)?;
                if rejected_once {
                    return Err(Error::RateLimitExceeded {
                        endpoint: key.to_string(),
                        reset_at,
                        waited_secs,
                    });
                }
                rejected_once = true;
                waited_secs = (reset_at - now).max(0) as u64;
                warn!(
                    "Server rejected {} despite local bookkeeping; waiting {}s and retrying once",
                    key, waited_secs
                );
                wait_for_reset(key, waited_secs).await?;
            }
        }
    }
}

/// Bounded, interruptible sleep. Ctrl-C aborts the wait rather than holding
/// the process hostage; the speculative reservation already applied stays
/// valid either way.
async fn wait_for_reset(key: &str, secs: u64) -> Result<()> {
    if secs == 0 {
        return Ok(());
    }
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(secs)) => Ok(()),
        _ = tokio::signal::ctrl_c() => Err(Error::Interrupted {
            endpoint: key.to_string(),
        }),
    }
}
