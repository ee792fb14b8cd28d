use std::fmt;
use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;

use super::{AsyncHandler, BoxFuture, HookName, Tap};
use crate::error::{BuildError, Result};

/// Parallel-fallible hook: all handlers are polled concurrently.
///
/// The first failure (in completion order) becomes the result. Handlers that
/// are already in flight still run to completion; nothing is force-cancelled.
pub struct AsyncParallelHook<T: ?Sized> {
    name: HookName,
    taps: Vec<Tap<AsyncHandler<T>>>,
}

impl<T: ?Sized> AsyncParallelHook<T> {
    pub fn new(name: HookName) -> Self {
        Self {
            name,
            taps: Vec::new(),
        }
    }

    /// Register a handler under a plugin name.
    pub fn tap<F>(&mut self, plugin: &str, handler: F)
    where
        F: for<'a> Fn(&'a T) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync + 'static,
    {
        self.taps.push(Tap::new(plugin, Arc::new(handler)));
    }

    /// Run all handlers concurrently and wait for every one of them.
    pub async fn call(&self, arg: &T) -> Result<()> {
        let mut pending: FuturesUnordered<_> = self
            .taps
            .iter()
            .map(|tap| async move { (tap.plugin(), (tap.handler())(arg).await) })
            .collect();

        let mut first_error = None;
        while let Some((plugin, result)) = pending.next().await {
            if let Err(e) = result
                && first_error.is_none()
            {
                crate::debug!("hook"; "{} failed in {}: {:#}", plugin, self.name, e);
                first_error = Some(BuildError::hook(self.name, plugin, e));
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    pub fn name(&self) -> HookName {
        self.name
    }

    pub fn taps(&self) -> &[Tap<AsyncHandler<T>>] {
        &self.taps
    }

    pub fn len(&self) -> usize {
        self.taps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    /// Same extension point with no handlers.
    pub(crate) fn cleared(&self) -> Self {
        Self::new(self.name)
    }
}

impl<T: ?Sized> Clone for AsyncParallelHook<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            taps: self.taps.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for AsyncParallelHook<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncParallelHook")
            .field("name", &self.name)
            .field("taps", &self.taps)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_parallel_handlers_overlap() {
        // Both handlers must be in flight at once for `peak` to reach 2.
        struct Gauge {
            active: AtomicUsize,
            peak: AtomicUsize,
        }

        let mut hook = AsyncParallelHook::<Gauge>::new(HookName::Make);
        for name in ["a", "b"] {
            hook.tap(name, |gauge| {
                Box::pin(async move {
                    let now = gauge.active.fetch_add(1, Ordering::SeqCst) + 1;
                    gauge.peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    gauge.active.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
            });
        }

        let gauge = Gauge {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        };
        hook.call(&gauge).await.unwrap();
        assert_eq!(gauge.peak.load(Ordering::SeqCst), 2);
        assert_eq!(gauge.active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_parallel_failure_lets_siblings_finish() {
        let mut hook = AsyncParallelHook::<AtomicUsize>::new(HookName::Make);
        hook.tap("fails-fast", |_| {
            Box::pin(async { Err(anyhow::anyhow!("entry missing")) })
        });
        hook.tap("slow", |finished| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        });

        let finished = AtomicUsize::new(0);
        let err = hook.call(&finished).await.unwrap_err();
        assert_eq!(err.hook_name(), Some(HookName::Make));
        assert!(format!("{err}").contains("fails-fast"));
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_parallel_empty_hook_succeeds() {
        let hook = AsyncParallelHook::<()>::new(HookName::Make);
        assert!(hook.call(&()).await.is_ok());
    }
}
