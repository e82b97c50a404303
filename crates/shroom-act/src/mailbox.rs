//! Bounded actor mailbox.
//!
//! Single reader (the actor host, drained during the owning actor's tick),
//! many writers (anything holding a [`MailboxHandle`]). The overflow policy
//! is per-mailbox: the default drops the oldest queued message and counts
//! the loss, so posters never fail and the channel survives; the rejecting
//! policy refuses new messages instead, which makes the async
//! [`MailboxHandle::post`] wait for space.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::sync::Notify;

/// What to do when a post finds the mailbox full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Drop the oldest queued message to make room. Posts always succeed.
    #[default]
    DropOldest,
    /// Refuse the new message; `try_post` hands it back, `post` waits.
    Reject,
}

struct Inner<M> {
    queue: Mutex<VecDeque<M>>,
    capacity: usize,
    policy: OverflowPolicy,
    dropped: AtomicU64,
    space: Notify,
}

impl<M> Inner<M> {
    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<M>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push under the policy; gives the message back when rejected.
    fn try_push(&self, msg: M) -> Result<(), M> {
        let mut queue = self.lock_queue();
        if queue.len() < self.capacity {
            queue.push_back(msg);
            return Ok(());
        }
        match self.policy {
            OverflowPolicy::DropOldest => {
                queue.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
                queue.push_back(msg);
                Ok(())
            },
            OverflowPolicy::Reject => Err(msg),
        }
    }
}

/// The reading side of a bounded mailbox.
pub struct Mailbox<M> {
    inner: Arc<Inner<M>>,
}

impl<M> Mailbox<M> {
    /// Create a mailbox holding at most `capacity` messages.
    #[must_use]
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(VecDeque::with_capacity(capacity)),
                capacity,
                policy,
                dropped: AtomicU64::new(0),
                space: Notify::new(),
            }),
        }
    }

    /// A cloneable posting handle.
    #[must_use]
    pub fn handle(&self) -> MailboxHandle<M> {
        MailboxHandle { inner: Arc::clone(&self.inner) }
    }

    /// Move every queued message into `out`, preserving order.
    pub fn drain_into(&self, out: &mut Vec<M>) {
        {
            let mut queue = self.inner.lock_queue();
            out.extend(queue.drain(..));
        }
        self.inner.space.notify_waiters();
    }

    /// Messages currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock_queue().len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Messages lost to the drop-oldest policy so far.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

impl<M> std::fmt::Debug for Mailbox<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailbox")
            .field("len", &self.len())
            .field("capacity", &self.inner.capacity)
            .field("dropped", &self.dropped())
            .finish()
    }
}

/// Cloneable posting side of a [`Mailbox`].
pub struct MailboxHandle<M> {
    inner: Arc<Inner<M>>,
}

impl<M> Clone for MailboxHandle<M> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<M> MailboxHandle<M> {
    /// Post without waiting.
    ///
    /// Hands the message back only under [`OverflowPolicy::Reject`] with a
    /// full queue, so callers can fall back to the blocking [`Self::post`];
    /// drop-oldest always accepts.
    pub fn try_post(&self, msg: M) -> Result<(), M> {
        self.inner.try_push(msg)
    }

    /// Post, waiting for space when the policy rejects.
    pub async fn post(&self, msg: M) {
        let mut msg = msg;
        loop {
            let notified = self.inner.space.notified();
            match self.inner.try_push(msg) {
                Ok(()) => return,
                Err(rejected) => msg = rejected,
            }
            notified.await;
        }
    }

    /// Messages lost to the drop-oldest policy so far.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

impl<M> std::fmt::Debug for MailboxHandle<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailboxHandle").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{Mailbox, OverflowPolicy};

    #[test]
    fn fifo_order_is_preserved() {
        let mailbox = Mailbox::new(8, OverflowPolicy::DropOldest);
        let handle = mailbox.handle();
        for i in 0..5 {
            assert!(handle.try_post(i).is_ok());
        }
        let mut out = Vec::new();
        mailbox.drain_into(&mut out);
        assert_eq!(out, vec![0, 1, 2, 3, 4]);
        assert!(mailbox.is_empty());
    }

    #[test]
    fn drop_oldest_counts_losses_and_never_fails() {
        let mailbox = Mailbox::new(2, OverflowPolicy::DropOldest);
        let handle = mailbox.handle();
        assert!(handle.try_post(1).is_ok());
        assert!(handle.try_post(2).is_ok());
        assert!(handle.try_post(3).is_ok());
        assert_eq!(mailbox.dropped(), 1);

        let mut out = Vec::new();
        mailbox.drain_into(&mut out);
        assert_eq!(out, vec![2, 3]);
    }

    #[test]
    fn reject_policy_refuses_when_full() {
        let mailbox = Mailbox::new(1, OverflowPolicy::Reject);
        let handle = mailbox.handle();
        assert!(handle.try_post(1).is_ok());
        assert_eq!(handle.try_post(2), Err(2));
        assert_eq!(mailbox.dropped(), 0);
    }

    #[tokio::test]
    async fn blocking_post_waits_for_drain() {
        let mailbox = Mailbox::new(1, OverflowPolicy::Reject);
        let handle = mailbox.handle();
        handle.post(1).await;

        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.post(2).await })
        };

        // Give the waiter a chance to park, then free a slot.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        let mut out = Vec::new();
        mailbox.drain_into(&mut out);
        assert_eq!(out, vec![1]);

        waiter.await.unwrap();
        let mut out = Vec::new();
        mailbox.drain_into(&mut out);
        assert_eq!(out, vec![2]);
    }
}
