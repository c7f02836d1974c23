//! Hierarchical cancellable execution contexts.
//!
//! A [`Scope`] is a node in a cancellation tree. Cancelling a node
//! broadcasts to every task awaiting it and then walks its live children,
//! so a parent is never observed as cancelled while a descendant created
//! before the cancel is still running unaware.

use crate::error::{BridgeError, BridgeResult};
use smallvec::SmallVec;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::Notify;

struct Node {
    name: String,
    cancelled: AtomicBool,
    notify: Notify,
    children: Mutex<SmallVec<[Weak<Node>; 4]>>,
}

impl Node {
    fn new(name: String, cancelled: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            cancelled: AtomicBool::new(cancelled),
            notify: Notify::new(),
            children: Mutex::new(SmallVec::new()),
        })
    }

    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.notify.notify_waiters();

        // Taken under the same lock `child` uses, so any child registered
        // after this point sees `cancelled == true` and is born cancelled.
        let children = {
            let mut children = self.children.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *children)
        };
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }
}

/// Cheaply clonable handle to one node of the cancellation tree.
#[derive(Clone)]
pub struct Scope {
    node: Arc<Node>,
}

impl Scope {
    /// Top-level scope, independent of every other scope.
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            node: Node::new(name.into(), false),
        }
    }

    /// Scope cancelled whenever `self` is. The parent does not wait on it.
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut children = self.node.children.lock().unwrap_or_else(|e| e.into_inner());
        let node = Node::new(name.into(), self.is_cancelled());
        children.retain(|c| c.strong_count() > 0);
        children.push(Arc::downgrade(&node));
        Self { node }
    }

    /// Cancels this scope and, transitively, every descendant. Idempotent.
    pub fn cancel(&self) {
        self.node.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.node.cancelled.load(Ordering::SeqCst)
    }

    pub fn name(&self) -> &str {
        &self.node.name
    }

    /// Resolves once the scope is cancelled.
    pub async fn cancelled(&self) {
        loop {
            // `notify_waiters` reaches a `Notified` from the moment it is
            // created, so checking the flag afterwards cannot miss a cancel.
            let notified = self.node.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Runs `fut` until it completes or the scope is cancelled.
    pub async fn run<F, T>(&self, fut: F) -> BridgeResult<T>
    where
        F: Future<Output = BridgeResult<T>>,
    {
        if self.is_cancelled() {
            return Err(BridgeError::Canceled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(BridgeError::Canceled),
            out = fut => out,
        }
    }

    /// Cancellable sleep.
    pub async fn sleep(&self, duration: Duration) -> BridgeResult<()> {
        self.run(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.node.name)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
