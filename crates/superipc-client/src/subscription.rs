use std::sync::Arc;

use crate::bridge::{Bridge, Listener, ListenerId};

/// Uniquely-owned attachment of at most one listener to a reply stream.
///
/// Swapping listeners goes through [`Subscription::resubscribe`], which
/// detaches the old listener before attaching the new one. Dropping the
/// handle detaches whatever is attached.
pub struct Subscription<B: Bridge + ?Sized> {
    bridge: Arc<B>,
    stream: String,
    id: Option<ListenerId>,
}

impl<B: Bridge + ?Sized> Subscription<B> {
    /// Create a detached subscription for `stream`.
    pub fn new(bridge: Arc<B>, stream: impl Into<String>) -> Self {
        Self {
            bridge,
            stream: stream.into(),
            id: None,
        }
    }

    /// Replace the attached listener with `listener`.
    pub fn resubscribe(&mut self, listener: Listener) -> ListenerId {
        self.unsubscribe();
        let id = self.bridge.on(&self.stream, listener);
        self.id = Some(id);
        id
    }

    /// Detach the current listener, if any.
    pub fn unsubscribe(&mut self) -> bool {
        match self.id.take() {
            Some(id) => self.bridge.remove_listener(&self.stream, id),
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.id.is_some()
    }

    pub fn listener_id(&self) -> Option<ListenerId> {
        self.id
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn bridge(&self) -> &Arc<B> {
        &self.bridge
    }
}

impl<B: Bridge + ?Sized> Drop for Subscription<B> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl<B: Bridge + ?Sized> std::fmt::Debug for Subscription<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("stream", &self.stream)
            .field("id", &self.id)
            .finish()
    }
}
