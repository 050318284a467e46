//! Caller-controlled cancellation for pipeline steps.
//!
//! A [`Cancellation`] bundles an optional deadline and an optional manual
//! trigger. Every network or git step is awaited through
//! [`Cancellation::run`], so whichever fires first abandons the in-flight step.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::CancelReason;
use crate::error::Error;
use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    deadline: Option<Instant>,
    signal: Option<watch::Receiver<bool>>,
}

/// Trigger side of a [`Cancellation`].
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

impl Cancellation {
    /// Never cancels.
    pub fn none() -> Self {
        Self::default()
    }

    /// A cancellation that fires when the returned handle is triggered.
    pub fn manual() -> (CancelHandle, Self) {
        let (sender, receiver) = watch::channel(false);
        let cancellation = Self {
            deadline: None,
            signal: Some(receiver),
        };
        (CancelHandle { sender }, cancellation)
    }

    /// Also fire once `timeout` has elapsed from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Await `step`, abandoning it if the deadline passes or cancellation is requested.
    pub async fn run<T, F>(&self, step: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_requested() {
            return Err(Error::Cancelled {
                step,
                reason: CancelReason::Requested,
            });
        }

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        let requested = async {
            match self.signal.clone() {
                Some(mut signal) => {
                    // A dropped handle can no longer cancel.
                    if signal.wait_for(|cancelled| *cancelled).await.is_err() {
                        std::future::pending::<()>().await;
                    }
                }
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            result = fut => result,
            _ = deadline => Err(Error::Cancelled { step, reason: CancelReason::DeadlineExceeded }),
            _ = requested => Err(Error::Cancelled { step, reason: CancelReason::Requested }),
        }
    }

    fn is_requested(&self) -> bool {
        self.signal
            .as_ref()
            .is_some_and(|signal| *signal.borrow())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_none_passes_through() {
        let value = Cancellation::none()
            .run("step", async { Ok(42) })
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_abandons_step() {
        let cancellation = Cancellation::none().with_timeout(Duration::from_secs(5));
        let err = cancellation
            .run("repository lookup", async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Cancelled {
                step: "repository lookup",
                reason: CancelReason::DeadlineExceeded
            }
        ));
    }

    #[tokio::test]
    async fn test_manual_cancel_abandons_step() {
        let (handle, cancellation) = Cancellation::manual();
        let step = cancellation.run("push", async {
            std::future::pending::<()>().await;
            Ok(())
        });
        handle.cancel();
        let err = step.await.unwrap_err();
        assert!(matches!(
            err,
            Error::Cancelled {
                reason: CancelReason::Requested,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_already_cancelled_skips_step() {
        let (handle, cancellation) = Cancellation::manual();
        handle.cancel();
        let mut ran = false;
        let result = cancellation
            .run("clone", async {
                ran = true;
                Ok(())
            })
            .await;
        assert!(result.is_err());
        assert!(!ran);
    }

    #[tokio::test]
    async fn test_dropped_handle_never_cancels() {
        let (handle, cancellation) = Cancellation::manual();
        drop(handle);
        let value = cancellation.run("step", async { Ok("done") }).await.unwrap();
        assert_eq!(value, "done");
    }
}
