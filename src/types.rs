//! Core identifier types shared across the SDK.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A logical subscription topic multiplexed over the single live connection.
///
/// Channels are plain identifiers scoped by a namespace prefix, e.g.
/// `asset:42` for updates to a specific asset. They are data, not
/// connections: a channel can be added or removed regardless of whether a
/// transport is currently open.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Channel(String);

impl Channel {
    /// Create a channel from a raw topic identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Channel scoped to a single asset, e.g. `asset:42`.
    #[must_use]
    pub fn asset(id: impl fmt::Display) -> Self {
        Self(format!("asset:{id}"))
    }

    /// Channel carrying notifications addressed to a single user.
    #[must_use]
    pub fn user(id: impl fmt::Display) -> Self {
        Self(format!("user:{id}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Channel {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for Channel {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Type tag of a live-update frame.
///
/// The known variants cover every event the backend currently emits plus the
/// client-originated control frames; anything else round-trips through
/// [`EventType::Other`] so handlers can still be registered for the exact
/// tag. Using an enum instead of bare strings keeps typos in well-known
/// event names from silently creating dead registrations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    /// A new notification for the current user.
    NotificationNew,
    /// A comment was added to a subscribed asset.
    CommentAdded,
    /// A comment on a subscribed asset was edited.
    CommentUpdated,
    /// A comment on a subscribed asset was deleted.
    CommentDeleted,
    /// Metadata or content of a subscribed asset changed.
    AssetUpdated,
    /// A new version was uploaded for a subscribed asset.
    VersionAdded,
    /// Outbound control: subscribe to a channel.
    Subscribe,
    /// Outbound control: unsubscribe from a channel.
    Unsubscribe,
    /// Outbound control: keep-alive ping.
    Ping,
    /// Any tag the SDK does not recognize.
    Other(String),
}

impl EventType {
    /// Map a wire tag onto its event type.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "notification.new" => Self::NotificationNew,
            "comment_added" => Self::CommentAdded,
            "comment_updated" => Self::CommentUpdated,
            "comment_deleted" => Self::CommentDeleted,
            "asset_updated" => Self::AssetUpdated,
            "version_added" => Self::VersionAdded,
            "subscribe" => Self::Subscribe,
            "unsubscribe" => Self::Unsubscribe,
            "ping" => Self::Ping,
            other => Self::Other(other.to_owned()),
        }
    }

    /// The tag this event type carries on the wire.
    #[must_use]
    pub fn as_tag(&self) -> &str {
        match self {
            Self::NotificationNew => "notification.new",
            Self::CommentAdded => "comment_added",
            Self::CommentUpdated => "comment_updated",
            Self::CommentDeleted => "comment_deleted",
            Self::AssetUpdated => "asset_updated",
            Self::VersionAdded => "version_added",
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
            Self::Ping => "ping",
            Self::Other(tag) => tag,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl Serialize for EventType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_tag())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        Ok(Self::from_tag(&tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tags_round_trip() {
        for tag in [
            "notification.new",
            "comment_added",
            "comment_updated",
            "comment_deleted",
            "asset_updated",
            "version_added",
            "subscribe",
            "unsubscribe",
            "ping",
        ] {
            let event = EventType::from_tag(tag);
            assert!(
                !matches!(event, EventType::Other(_)),
                "{tag} should be a recognized tag"
            );
            assert_eq!(event.as_tag(), tag);
        }
    }

    #[test]
    fn unknown_tag_passes_through() {
        let event = EventType::from_tag("share_link_created");
        assert_eq!(event, EventType::Other("share_link_created".to_owned()));
        assert_eq!(event.as_tag(), "share_link_created");
    }

    #[test]
    fn event_type_serde_uses_wire_tag() {
        let json = serde_json::to_string(&EventType::NotificationNew).unwrap();
        assert_eq!(json, "\"notification.new\"");

        let parsed: EventType = serde_json::from_str("\"comment_added\"").unwrap();
        assert_eq!(parsed, EventType::CommentAdded);
    }

    #[test]
    fn channel_constructors_scope_by_namespace() {
        assert_eq!(Channel::asset(42).as_str(), "asset:42");
        assert_eq!(Channel::user("u-9").as_str(), "user:u-9");
        assert_eq!(Channel::from("asset:7").to_string(), "asset:7");
    }
}
