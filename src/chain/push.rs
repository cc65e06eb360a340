// Push channels
//
// Address-scoped and bulk notifications arrive over named channels. A
// channel delivers nothing until it is joined. `ChannelHub` is the
// in-process implementation; a socket transport feeds it via `publish`.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub type PushHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Channel raised by a transport once it is connected
pub const CONNECT_CHANNEL: &str = "connect";

pub trait PushChannel: Send + Sync {
    /// Register a handler for `channel`
    fn on(&self, channel: &str, handler: PushHandler);

    /// Opt in to deliveries on `channel`
    fn join(&self, channel: &str);

    /// Whether the transport has already connected
    fn is_connected(&self) -> bool {
        false
    }
}

#[derive(Default)]
struct ChannelState {
    joined: bool,
    handlers: Vec<PushHandler>,
}

#[derive(Default)]
pub struct ChannelHub {
    channels: Mutex<HashMap<String, ChannelState>>,
    connected: AtomicBool,
}

impl ChannelHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `payload` to every handler of a joined channel
    ///
    /// Returns the number of handlers invoked. Handlers run after the
    /// internal lock is released, so they may register further channels.
    pub fn publish(&self, channel: &str, payload: &Value) -> usize {
        let handlers: Vec<PushHandler> = {
            let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
            match channels.get(channel) {
                Some(state) if state.joined => state.handlers.clone(),
                _ => Vec::new(),
            }
        };

        for handler in &handlers {
            handler(payload);
        }
        log::trace!("Published on '{}' to {} handler(s)", channel, handlers.len());
        handlers.len()
    }

    /// Mark the transport connected and raise `connect`
    pub fn set_connected(&self) {
        self.connected.store(true, Ordering::SeqCst);
        self.publish(CONNECT_CHANNEL, &Value::Null);
    }

    pub fn is_joined(&self, channel: &str) -> bool {
        let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels.get(channel).map(|s| s.joined).unwrap_or(false)
    }

    pub fn handler_count(&self, channel: &str) -> usize {
        let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels.get(channel).map(|s| s.handlers.len()).unwrap_or(0)
    }

    /// Names of every joined channel, sorted
    pub fn joined_channels(&self) -> Vec<String> {
        let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = channels
            .iter()
            .filter(|(_, state)| state.joined)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

impl PushChannel for ChannelHub {
    fn on(&self, channel: &str, handler: PushHandler) {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(channel.to_string())
            .or_default()
            .handlers
            .push(handler);
    }

    fn join(&self, channel: &str) {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels.entry(channel.to_string()).or_default().joined = true;
        log::debug!("Joined push channel '{}'", channel);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
