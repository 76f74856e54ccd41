//! Registry of active channel subscriptions.
//!
//! The registry is pure data: it records which topics the caller wants
//! active, independent of connection state. The connection loop replays the
//! snapshot as `subscribe` control frames on every successful open, which is
//! what makes subscriptions survive reconnects without caller involvement.

use std::time::Instant;

use dashmap::DashMap;

use crate::types::Channel;

/// Information about one active channel subscription.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    /// The subscribed topic
    pub channel: Channel,
    /// When the caller subscribed
    pub added_at: Instant,
}

/// The set of logical topics the caller wants active.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: DashMap<Channel, ChannelInfo>,
}

impl ChannelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a channel as active. Returns `false` when the channel was
    /// already present, in which case nothing changed.
    pub fn add(&self, channel: Channel) -> bool {
        let mut inserted = false;
        self.channels.entry(channel.clone()).or_insert_with(|| {
            inserted = true;
            ChannelInfo {
                channel,
                added_at: Instant::now(),
            }
        });
        inserted
    }

    /// Remove a channel from the active set. Returns `false` when it was not
    /// present.
    pub fn remove(&self, channel: &Channel) -> bool {
        self.channels.remove(channel).is_some()
    }

    #[must_use]
    pub fn contains(&self, channel: &Channel) -> bool {
        self.channels.contains_key(channel)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// The currently active channels, in no particular order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Channel> {
        self.channels.iter().map(|e| e.key().clone()).collect()
    }

    /// Details for every active subscription.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<ChannelInfo> {
        self.channels.iter().map(|e| e.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_remove_mutate_the_set() {
        let registry = ChannelRegistry::new();
        let channel = Channel::asset(42);

        assert!(registry.is_empty());
        assert!(registry.add(channel.clone()));
        assert!(registry.contains(&channel));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(&channel));
        assert!(!registry.contains(&channel));
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_add_is_a_noop() {
        let registry = ChannelRegistry::new();
        let channel = Channel::asset(42);

        assert!(registry.add(channel.clone()));
        assert!(!registry.add(channel));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_of_absent_channel_is_a_noop() {
        let registry = ChannelRegistry::new();
        assert!(!registry.remove(&Channel::asset(7)));
    }

    #[test]
    fn snapshot_contains_exactly_the_active_set() {
        let registry = ChannelRegistry::new();
        registry.add(Channel::asset(1));
        registry.add(Channel::asset(2));
        registry.add(Channel::user("u-3"));
        registry.remove(&Channel::asset(2));

        let mut snapshot = registry.snapshot();
        snapshot.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        assert_eq!(snapshot, vec![Channel::asset(1), Channel::user("u-3")]);
        assert_eq!(registry.subscriptions().len(), 2);
    }
}
