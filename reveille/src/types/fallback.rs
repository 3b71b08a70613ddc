//! Ordered fallback chains.
//!
//! Several collaborators have more than one way to get a job done: a
//! marker file can be unlinked or renamed aside; a wake time can come
//! from the push cache or from any of several status endpoints. [`first_success`] tries each strategy in order, stops at the
//! first one that works, and keeps every failure for the log when none do.

use std::fmt;
use std::future::Future;

/// Every strategy in a chain failed.
///
/// Failures are kept in the order the strategies were tried, labelled
/// with the strategy's `Display` form.
#[derive(Debug, thiserror::Error)]
#[error("{}", render(.failures))]
pub struct Exhausted<E: fmt::Debug + fmt::Display> {
    pub failures: Vec<(String, E)>,
}

fn render<E: fmt::Display>(failures: &[(String, E)]) -> String {
    if failures.is_empty() {
        return "no strategies to try".to_string();
    }
    let mut out = format!("all {} strategies failed", failures.len());
    for (name, err) in failures {
        out.push_str(&format!("; {name}: {err}"));
    }
    out
}

/// Try `attempt` on each strategy in order; the first `Ok` wins.
pub fn first_success<S, T, E>(
    strategies: &[S],
    mut attempt: impl FnMut(&S) -> Result<T, E>,
) -> Result<T, Exhausted<E>>
where
    S: fmt::Display,
    E: fmt::Debug + fmt::Display,
{
    let mut failures = Vec::new();
    for strategy in strategies {
        match attempt(strategy) {
            Ok(value) => return Ok(value),
            Err(e) => failures.push((strategy.to_string(), e)),
        }
    }
    Err(Exhausted { failures })
}

/// Async flavour of [`first_success`]. Strategies are awaited one at a
/// time; later strategies are never started once one succeeds.
pub async fn first_success_async<'a, S, T, E, F, Fut>(
    strategies: &'a [S],
    mut attempt: F,
) -> Result<T, Exhausted<E>>
where
    S: fmt::Display,
    E: fmt::Debug + fmt::Display,
    F: FnMut(&'a S) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut failures = Vec::new();
    for strategy in strategies {
        match attempt(strategy).await {
            Ok(value) => return Ok(value),
            Err(e) => failures.push((strategy.to_string(), e)),
        }
    }
    Err(Exhausted { failures })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_ok_wins_and_stops_the_chain() {
        let mut tried = Vec::new();
        let result: Result<u32, Exhausted<&str>> = first_success(&["a", "b", "c"], |s| {
            tried.push(*s);
            if *s == "b" { Ok(2) } else { Err("nope") }
        });

        assert_eq!(result.unwrap(), 2);
        assert_eq!(tried, ["a", "b"]);
    }

    #[test]
    fn exhausted_keeps_failures_in_order() {
        let result: Result<(), _> = first_success(&["unlink", "rename"], |s| Err(format!("{s} denied")));

        let err = result.unwrap_err();
        assert_eq!(err.failures.len(), 2);
        assert_eq!(err.failures[0].0, "unlink");
        assert_eq!(err.failures[1].1, "rename denied");
        assert_eq!(
            err.to_string(),
            "all 2 strategies failed; unlink: unlink denied; rename: rename denied"
        );
    }

    #[test]
    fn empty_chain_is_exhausted() {
        let strategies: [&str; 0] = [];
        let err = first_success(&strategies, |_| Ok::<(), &str>(())).unwrap_err();
        assert!(err.failures.is_empty());
        assert_eq!(err.to_string(), "no strategies to try");
    }

    #[tokio::test]
    async fn async_chain_skips_failures() {
        let result = first_success_async(&["down", "up"], |s| async move {
            if *s == "up" { Ok(*s) } else { Err("refused") }
        })
        .await;

        assert_eq!(result.unwrap(), "up");
    }
}
