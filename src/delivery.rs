use crate::error::EmitError;
use tokio::{
    task::JoinHandle,
    time::{timeout, Duration},
};

type DeliveryTask = JoinHandle<Result<(), EmitError>>;

/// Tracks the per-subscriber tasks spawned by one deferred emission.
///
/// [`len`](Self::len) is the snapshot size of that emission, i.e. the number
/// of subscribers the value was scheduled for. [`wait`](Self::wait) is the
/// completion point: it awaits every delivery in snapshot order and reports
/// whatever went wrong. Dropping the handler instead detaches the
/// deliveries; they still run to completion on the runtime.
#[derive(Default)]
pub struct DeliveryHandler {
    tasks: Vec<DeliveryTask>,
}

impl DeliveryHandler {
    pub(crate) fn new(tasks: Vec<DeliveryTask>) -> Self {
        Self { tasks }
    }

    /// Returns a handler with no deliveries. Waiting on it returns
    /// immediately with success.
    pub fn empty() -> Self {
        Self { tasks: Vec::new() }
    }

    /// The number of subscribers in the emission's snapshot.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if nothing was scheduled.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Waits for every delivery to finish.
    /// If `duration` is `None`, this waits indefinitely; otherwise each
    /// pending delivery gets at most `duration` to complete.
    /// Returns the snapshot size on full success, or
    /// [`EmitError::DeliveryFailed`] carrying every caught failure.
    pub async fn wait(self, duration: Option<Duration>) -> Result<usize, EmitError> {
        let n = self.tasks.len();
        let mut failures = Vec::new();

        for task in self.tasks {
            let joined = match duration {
                Some(limit) => match timeout(limit, task).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        failures.push(EmitError::WaitTimeout(limit));
                        continue;
                    }
                },
                None => task.await,
            };
            match joined {
                Ok(Ok(())) => (),
                Ok(Err(e)) => failures.push(e),
                Err(e) => failures.push(EmitError::Join(e)),
            }
        }

        if failures.is_empty() {
            Ok(n)
        } else {
            Err(EmitError::DeliveryFailed(failures))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_handler_wait() {
        let handler = DeliveryHandler::empty();
        assert!(handler.is_empty());
        let result = handler.wait(None).await;
        assert_eq!(result.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_wait_counts_successes() {
        let tasks = (0..3).map(|_| tokio::spawn(async { Ok(()) })).collect();
        let handler = DeliveryHandler::new(tasks);
        assert_eq!(handler.len(), 3);
        assert_eq!(handler.wait(None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_wait_aggregates_failures() {
        let ok = tokio::spawn(async { Ok(()) });
        let failing = tokio::spawn(async {
            Err(EmitError::Subscriber {
                name: Some("bad".to_string()),
                source: "boom".into(),
            })
        });
        let handler = DeliveryHandler::new(vec![ok, failing]);

        match handler.wait(None).await {
            Err(EmitError::DeliveryFailed(failures)) => {
                assert_eq!(failures.len(), 1);
                assert!(matches!(&failures[0], EmitError::Subscriber { name, .. }
                    if name.as_deref() == Some("bad")));
            }
            other => panic!("expected aggregated failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_wait_timeout() {
        let stuck = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        });
        let handler = DeliveryHandler::new(vec![stuck]);

        match handler.wait(Some(Duration::from_millis(50))).await {
            Err(EmitError::DeliveryFailed(failures)) => {
                assert!(matches!(failures[0], EmitError::WaitTimeout(_)));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
