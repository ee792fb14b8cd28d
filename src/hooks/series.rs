use std::fmt;
use std::sync::Arc;

use super::{AsyncHandler, BoxFuture, Tap};
use crate::error::{BuildError, Result};
use crate::hooks::HookName;

/// Sequential-fallible hook: handlers run one after another and the first
/// failure aborts the chain.
pub struct AsyncSeriesHook<T: ?Sized> {
    name: HookName,
    taps: Vec<Tap<AsyncHandler<T>>>,
}

impl<T: ?Sized> AsyncSeriesHook<T> {
    pub fn new(name: HookName) -> Self {
        Self {
            name,
            taps: Vec::new(),
        }
    }

    /// Register a handler under a plugin name.
    ///
    /// ```ignore
    /// hooks.emit.tap("Banner", |compilation| Box::pin(async move {
    ///     compilation.emit_asset("banner.txt", "hi");
    ///     Ok(())
    /// }));
    /// ```
    pub fn tap<F>(&mut self, plugin: &str, handler: F)
    where
        F: for<'a> Fn(&'a T) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync + 'static,
    {
        self.taps.push(Tap::new(plugin, Arc::new(handler)));
    }

    /// Run handlers in registration order, stopping at the first failure.
    pub async fn call(&self, arg: &T) -> Result<()> {
        for tap in &self.taps {
            (tap.handler())(arg)
                .await
                .map_err(|e| BuildError::hook(self.name, tap.plugin(), e))?;
        }
        Ok(())
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

impl<T: ?Sized> Clone for AsyncSeriesHook<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            taps: self.taps.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for AsyncSeriesHook<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncSeriesHook")
            .field("name", &self.name)
            .field("taps", &self.taps)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[tokio::test]
    async fn test_series_runs_in_order() {
        let mut hook = AsyncSeriesHook::<Mutex<Vec<u8>>>::new(HookName::Emit);
        hook.tap("one", |log| {
            Box::pin(async move {
                log.lock().push(1);
                Ok(())
            })
        });
        hook.tap("two", |log| {
            Box::pin(async move {
                log.lock().push(2);
                Ok(())
            })
        });

        let log = Mutex::new(Vec::new());
        hook.call(&log).await.unwrap();
        assert_eq!(*log.lock(), [1, 2]);
    }

    #[tokio::test]
    async fn test_series_first_failure_aborts() {
        let mut hook = AsyncSeriesHook::<Mutex<Vec<u8>>>::new(HookName::AfterCompile);
        hook.tap("bad", |_| Box::pin(async { Err(anyhow::anyhow!("nope")) }));
        hook.tap("never", |log| {
            Box::pin(async move {
                log.lock().push(9);
                Ok(())
            })
        });

        let log = Mutex::new(Vec::new());
        let err = hook.call(&log).await.unwrap_err();
        assert_eq!(err.hook_name(), Some(HookName::AfterCompile));
        assert!(log.lock().is_empty());
    }
}
