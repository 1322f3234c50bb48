use std::{future::Future, time::Duration};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{CancelReason, ClientError, Result};

/// Per-call cancellation and deadline settings.
///
/// Passing `None` (or the default) to an endpoint means the call is never
/// cancelled and has no deadline. Both signals also cover reading the
/// response body, including chunks pulled from a [`crate::ByteStream`]
/// after the endpoint has returned.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    cancellation: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the deadline to `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Drives `fut` to completion unless the token fires or the deadline
    /// passes first.
    pub(crate) async fn run<F>(&self, url: &str, fut: F) -> Result<F::Output>
    where
        F: Future,
    {
        let cancelled = async {
            match &self.cancellation {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(ClientError::Cancelled {
                url: url.to_string(),
                reason: CancelReason::Cancelled,
            }),
            _ = expired => Err(ClientError::Cancelled {
                url: url.to_string(),
                reason: CancelReason::DeadlineExceeded,
            }),
            output = fut => Ok(output),
        }
    }
}
