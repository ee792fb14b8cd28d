use std::fmt;
use std::sync::Arc;

use super::Tap;

type SyncHandler<T> = dyn Fn(&mut T) + Send + Sync;

/// Fire-and-forget hook: every handler runs in registration order.
pub struct SyncHook<T: ?Sized> {
    taps: Vec<Tap<SyncHandler<T>>>,
}

impl<T: ?Sized> SyncHook<T> {
    pub fn new() -> Self {
        Self { taps: Vec::new() }
    }

    /// Register a handler under a plugin name.
    pub fn tap<F>(&mut self, plugin: &str, handler: F)
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        self.taps.push(Tap::new(plugin, Arc::new(handler)));
    }

    /// Invoke all handlers. Handlers have no failure channel.
    pub fn call(&self, arg: &mut T) {
        for tap in &self.taps {
            (tap.handler())(arg);
        }
    }

    pub fn taps(&self) -> &[Tap<SyncHandler<T>>] {
        &self.taps
    }

    pub fn len(&self) -> usize {
        self.taps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }
}

impl<T: ?Sized> Default for SyncHook<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Clone for SyncHook<T> {
    fn clone(&self) -> Self {
        Self {
            taps: self.taps.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for SyncHook<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.taps).finish()
    }
}
