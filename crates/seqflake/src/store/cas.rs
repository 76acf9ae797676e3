use crate::{Error, KvStore, Result, RetryPolicy, Swap};

/// Result of a successful [`cas_increment`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Increment {
    /// Value observed before the write.
    pub previous: i64,
    /// Value written; `previous + delta`.
    pub current: i64,
    /// Number of CAS rounds it took, starting at one.
    pub attempts: u32,
}

/// Atomically adds `delta` to the base-10 integer stored at `key`.
///
/// Each round reads `(value, version)`, then writes `value + delta`
/// conditioned on `version`. A lost race backs off per `policy` and tries
/// again; transport failures are retried the same way since a re-read
/// observes whatever a half-applied write left behind.
///
/// # Errors
///
/// - [`Error::NotFound`] if the key does not exist (never retried)
/// - [`Error::Malformed`] if the value is not an `i64` or the sum overflows
///   (never retried)
/// - [`Error::StoreUnavailable`] once `policy.attempts()` rounds failed
pub async fn cas_increment<S>(store: &S, key: &str, delta: i64, policy: &RetryPolicy) -> Result<Increment>
where
    S: KvStore,
{
    let attempts = policy.attempts();
    let mut last_failure = String::from("compare-and-swap conflict");

    for attempt in 1..=attempts {
        match try_increment(store, key, delta).await {
            Ok(Some((previous, current))) => {
                return Ok(Increment {
                    previous,
                    current,
                    attempts: attempt,
                });
            }
            Ok(None) => {
                tracing::debug!(key, attempt, "compare-and-swap lost a race, backing off");
                last_failure = String::from("compare-and-swap conflict");
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(key, attempt, "store call failed: {e}");
                last_failure = e.to_string();
            }
            Err(e) => return Err(e),
        }

        if attempt < attempts {
            policy.backoff().await;
        }
    }

    tracing::warn!(key, attempts, "giving up on compare-and-swap: {last_failure}");
    Err(Error::unavailable(format!(
        "`{key}` not updated after {attempts} attempts ({last_failure})"
    )))
}

/// One read-modify-CAS round. `Ok(None)` means the CAS lost a race.
async fn try_increment<S>(store: &S, key: &str, delta: i64) -> Result<Option<(i64, i64)>>
where
    S: KvStore,
{
    let Some(read) = store.get(key).await? else {
        return Err(Error::NotFound {
            key: key.to_owned(),
        });
    };

    let previous = parse_counter(key, &read.value)?;
    let current = previous.checked_add(delta).ok_or_else(|| Error::Malformed {
        key: key.to_owned(),
        reason: format!("{previous} + {delta} overflows"),
    })?;

    match store
        .compare_and_swap(key, &current.to_string(), read.version)
        .await?
    {
        Swap::Swapped => Ok(Some((previous, current))),
        Swap::Conflict => Ok(None),
    }
}

/// Parses a stored counter value.
pub fn parse_counter(key: &str, raw: &str) -> Result<i64> {
    raw.trim().parse::<i64>().map_err(|e| Error::Malformed {
        key: key.to_owned(),
        reason: format!("`{raw}` is not an integer ({e})"),
    })
}
