use std::fmt::Display;
use std::future::Future;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub key: String,
    pub error: String,
}

/// Outcome of a fan-out where one item failing must not sink the rest.
#[derive(Debug, Clone, Serialize)]
pub struct PartialResults<T> {
    pub succeeded: Vec<T>,
    pub failures: Vec<TaskFailure>,
}

impl<T> PartialResults<T> {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

impl<T> Default for PartialResults<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// Run `task` for every item concurrently and split the results.
///
/// Successes keep input order. Failures are logged and reported by key.
pub async fn gather_partial<K, T, E, F, Fut>(
    items: impl IntoIterator<Item = K>,
    task: F,
) -> PartialResults<T>
where
    K: Display + Clone,
    E: Display,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let items: Vec<K> = items.into_iter().collect();
    let futures = items.iter().cloned().map(&task);
    let results = join_all(futures).await;

    let mut outcome = PartialResults::default();
    for (key, result) in items.into_iter().zip(results) {
        match result {
            Ok(value) => outcome.succeeded.push(value),
            Err(e) => {
                warn!("Task for {} failed: {}", key, e);
                outcome.failures.push(TaskFailure {
                    key: key.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failures_do_not_drop_successes() {
        let results = gather_partial(vec![1, 2, 3, 4], |n| async move {
            if n % 2 == 0 {
                Err(anyhow::anyhow!("even {}", n))
            } else {
                Ok(n * 10)
            }
        })
        .await;

        assert_eq!(results.succeeded, vec![10, 30]);
        assert_eq!(results.failures.len(), 2);
        assert_eq!(results.failures[0].key, "2");
        assert!(results.failures[1].error.contains("even 4"));
        assert!(!results.is_complete());
    }

    #[tokio::test]
    async fn empty_input_is_complete() {
        let results: PartialResults<i32> =
            gather_partial(Vec::<i32>::new(), |n| async move { Ok::<_, String>(n) }).await;
        assert!(results.succeeded.is_empty());
        assert!(results.is_complete());
    }
}
