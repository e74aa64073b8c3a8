use std::{fmt::Display, future::Future, time::Duration};

use devapi::DevApiError;
use genai::GenError;

pub const MAX_ATTEMPTS: u32 = 3;
pub const BASE_DELAY: Duration = Duration::from_millis(500);

/// Whether an external-call failure is worth another attempt.
pub trait Recoverable {
    fn is_transient(&self) -> bool;
}

impl Recoverable for DevApiError {
    fn is_transient(&self) -> bool {
        DevApiError::is_transient(self)
    }
}

impl Recoverable for GenError {
    fn is_transient(&self) -> bool {
        GenError::is_transient(self)
    }
}

/// Runs `op` with up to [`MAX_ATTEMPTS`] attempts and exponential backoff.
///
/// Transient failures sleep and retry; permanent ones return immediately.
/// Every attempt's outcome goes through `log` so the session log records
/// the full history.
pub async fn retry_with_backoff<T, E, Fut, Op, Log>(
    label: &str,
    log: Log,
    mut op: Op,
) -> Result<T, E>
where
    E: Recoverable + Display,
    Fut: Future<Output = Result<T, E>>,
    Op: FnMut() -> Fut,
    Log: Fn(String),
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    log(format!("{label}: succeeded on attempt {attempt}"));
                }
                return Ok(value);
            }
            Err(err) if err.is_transient() && attempt < MAX_ATTEMPTS => {
                let delay = BASE_DELAY * 2u32.pow(attempt - 1);
                log(format!(
                    "{label}: attempt {attempt}/{MAX_ATTEMPTS} failed ({err}), retrying in {}ms",
                    delay.as_millis()
                ));
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                log(format!("{label}: attempt {attempt} failed ({err}), giving up"));
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    };

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn transient_failure_then_success_is_invisible() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, DevApiError> =
            retry_with_backoff("test", |_| {}, || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(DevApiError::Transient("429".to_string()))
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_aborts_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, DevApiError> =
            retry_with_backoff("test", |_| {}, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DevApiError::Permanent("401".to_string()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_exhaust_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let lines: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let result: Result<u32, DevApiError> = retry_with_backoff(
            "works.create",
            move |line| sink.lock().unwrap().push(line),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(DevApiError::Transient("timeout".to_string()))
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), MAX_ATTEMPTS as usize);
        assert!(lines.last().unwrap().contains("giving up"));
    }
}
