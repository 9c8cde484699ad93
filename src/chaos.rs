//! In-process outage injection.
//!
//! Reproduces what the external fault injector does to the dependency:
//! from an unknown moment and for an unknown duration, every attempt fails
//! at the connection level, then service resumes. The breaker sees these
//! failures exactly as it sees remote errors.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::error::CallError;
use crate::resilience::transport::{Request, Response, Transport};

/// Transport wrapper that can be switched into a hard outage.
#[derive(Debug, Clone)]
pub struct OutageSwitch<T> {
    inner: T,
    down: Arc<AtomicBool>,
}

impl<T: Transport> OutageSwitch<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            down: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn engage(&self) {
        if !self.down.swap(true, Ordering::SeqCst) {
            tracing::warn!("Outage injected: dependency unreachable");
        }
    }

    pub fn release(&self) {
        if self.down.swap(false, Ordering::SeqCst) {
            tracing::warn!("Outage lifted: dependency reachable again");
        }
    }

    pub fn is_down(&self) -> bool {
        self.down.load(Ordering::SeqCst)
    }
}

impl<T: Transport> Transport for OutageSwitch<T> {
    fn send(&self, request: &Request) -> impl Future<Output = Result<Response, CallError>> + Send {
        let down = self.is_down();
        let forwarded = (!down).then(|| self.inner.send(request));
        async move {
            match forwarded {
                Some(fut) => fut.await,
                None => Err(CallError::Connection {
                    reason: "connection refused (injected outage)".to_string(),
                }),
            }
        }
    }
}

/// When an outage starts and how long it lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutageSchedule {
    pub start_after: Duration,
    pub duration: Duration,
}

impl OutageSchedule {
    /// Run the outage on a background task.
    pub fn spawn<T>(self, switch: OutageSwitch<T>) -> JoinHandle<()>
    where
        T: Transport + Send + Sync + 'static,
    {
        tokio::spawn(async move {
            tokio::time::sleep(self.start_after).await;
            switch.engage();
            tokio::time::sleep(self.duration).await;
            switch.release();
        })
    }
}
