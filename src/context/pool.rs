//! Pool of reusable request contexts.
//!
//! # Design Decisions
//! - Explicit acquire/release; release is tied to `Drop` of the guard so a
//!   dropped request future (client gone, timeout) still releases
//! - Release runs cleanup hooks and resets every field before the context
//!   becomes visible to another request
//! - Bounded: contexts beyond `capacity` are simply dropped

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

use crate::context::RequestContext;

/// Bounded pool of [`RequestContext`]s.
#[derive(Debug)]
pub struct ContextPool {
    free: Mutex<Vec<RequestContext>>,
    capacity: usize,
}

impl ContextPool {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            free: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        })
    }

    /// Take a clean context, allocating one if the pool is empty.
    pub fn acquire(self: &Arc<Self>) -> PooledContext {
        let ctx = self
            .free
            .lock()
            .ok()
            .and_then(|mut free| free.pop())
            .unwrap_or_default();
        PooledContext {
            ctx: Some(ctx),
            pool: Arc::clone(self),
        }
    }

    /// Contexts currently idle in the pool.
    pub fn idle(&self) -> usize {
        self.free.lock().map(|free| free.len()).unwrap_or(0)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn release(&self, mut ctx: RequestContext) {
        ctx.reset();
        if let Ok(mut free) = self.free.lock() {
            if free.len() < self.capacity {
                free.push(ctx);
            }
        }
    }
}

/// A context on loan from a [`ContextPool`]. Returned on drop.
#[derive(Debug)]
pub struct PooledContext {
    ctx: Option<RequestContext>,
    pool: Arc<ContextPool>,
}

impl Deref for PooledContext {
    type Target = RequestContext;

    fn deref(&self) -> &RequestContext {
        self.ctx.as_ref().expect("context present until drop")
    }
}

impl DerefMut for PooledContext {
    fn deref_mut(&mut self) -> &mut RequestContext {
        self.ctx.as_mut().expect("context present until drop")
    }
}

impl Drop for PooledContext {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            self.pool.release(ctx);
        }
    }
}
