//! Event stream types
//!
//! [`Event`] is the typed form of one entry returned by the events endpoint.
//! [`StreamPosition`] is the cursor the stream advances through, and
//! [`EventPage`] is one fetched batch.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::constants::STREAM_POSITION_NOW;
use crate::errors::{NimbusError, Result};
use crate::impl_wire_name_conversions;

// ============================================================================
// Stream position
// ============================================================================

/// Opaque, monotonically advancing cursor into the event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StreamPosition {
    /// Sentinel asking the service for the current head of the stream.
    #[default]
    Now,
    /// Numeric watermark returned by the service.
    At(u64),
}

impl fmt::Display for StreamPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Now => f.write_str(STREAM_POSITION_NOW),
            Self::At(position) => write!(f, "{position}"),
        }
    }
}

impl std::str::FromStr for StreamPosition {
    type Err = NimbusError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case(STREAM_POSITION_NOW) {
            return Ok(Self::Now);
        }
        trimmed
            .parse::<u64>()
            .map(Self::At)
            .map_err(|e| NimbusError::Parse(format!("invalid stream position {s:?}: {e}")))
    }
}

impl Serialize for StreamPosition {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Now => serializer.serialize_str(STREAM_POSITION_NOW),
            Self::At(position) => serializer.serialize_u64(*position),
        }
    }
}

impl<'de> Deserialize<'de> for StreamPosition {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(position) => Ok(Self::At(position)),
            Raw::Text(text) => text.parse().map_err(|e: NimbusError| D::Error::custom(e)),
        }
    }
}

// ============================================================================
// Event type
// ============================================================================

/// Kind of change an event describes.
///
/// Names the service introduces later parse as [`EventType::Unknown`].
///
/// Variants are named after their wire spelling in the table below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(missing_docs)]
pub enum EventType {
    ItemCreate,
    ItemUpload,
    ItemMove,
    ItemCopy,
    ItemRename,
    ItemTrash,
    ItemUndeleteViaTrash,
    ItemDownload,
    ItemPreview,
    ItemSync,
    ItemUnsync,
    ItemSharedCreate,
    ItemSharedUnshare,
    ItemShared,
    CommentCreate,
    CommentDelete,
    TaskAssignmentCreate,
    LockCreate,
    LockDestroy,
    CollabAddCollaborator,
    CollabInviteCollaborator,
    CollabRemoveCollaborator,
    TagItemCreate,
    #[default]
    Unknown,
}

impl_wire_name_conversions!(EventType {
    ItemCreate => "ITEM_CREATE",
    ItemUpload => "ITEM_UPLOAD",
    ItemMove => "ITEM_MOVE",
    ItemCopy => "ITEM_COPY",
    ItemRename => "ITEM_RENAME",
    ItemTrash => "ITEM_TRASH",
    ItemUndeleteViaTrash => "ITEM_UNDELETE_VIA_TRASH",
    ItemDownload => "ITEM_DOWNLOAD",
    ItemPreview => "ITEM_PREVIEW",
    ItemSync => "ITEM_SYNC",
    ItemUnsync => "ITEM_UNSYNC",
    ItemSharedCreate => "ITEM_SHARED_CREATE",
    ItemSharedUnshare => "ITEM_SHARED_UNSHARE",
    ItemShared => "ITEM_SHARED",
    CommentCreate => "COMMENT_CREATE",
    CommentDelete => "COMMENT_DELETE",
    TaskAssignmentCreate => "TASK_ASSIGNMENT_CREATE",
    LockCreate => "LOCK_CREATE",
    LockDestroy => "LOCK_DESTROY",
    CollabAddCollaborator => "COLLAB_ADD_COLLABORATOR",
    CollabInviteCollaborator => "COLLAB_INVITE_COLLABORATOR",
    CollabRemoveCollaborator => "COLLAB_REMOVE_COLLABORATOR",
    TagItemCreate => "TAG_ITEM_CREATE",
    Unknown => "UNKNOWN",
});

impl EventType {
    /// Parses a wire name, mapping unrecognized names to `Unknown`.
    pub fn from_wire(name: &str) -> Self {
        name.parse().unwrap_or(Self::Unknown)
    }

    /// Whether the event brings a new item into existence.
    pub fn is_creation(&self) -> bool {
        matches!(self, Self::ItemCreate | Self::ItemCopy | Self::ItemUndeleteViaTrash)
    }

    /// Whether the event removes an item from view.
    pub fn is_removal(&self) -> bool {
        matches!(self, Self::ItemTrash)
    }
}

// ============================================================================
// Resource reference
// ============================================================================

/// Kind of resource an event points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ResourceKind {
    File,
    Folder,
    WebLink,
    User,
    Group,
    Comment,
    Collaboration,
    Task,
    Other,
}

impl_wire_name_conversions!(ResourceKind {
    File => "file",
    Folder => "folder",
    WebLink => "web_link",
    User => "user",
    Group => "group",
    Comment => "comment",
    Collaboration => "collaboration",
    Task => "task",
    Other => "other",
});

/// Reference to the domain resource an event concerns.
///
/// Only the identifying fields are typed; the full JSON is kept in `raw` for
/// the resource model layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRef {
    /// Kind of resource.
    pub kind: ResourceKind,
    /// Service identifier.
    pub id: String,
    /// Display name, when sent.
    pub name: Option<String>,
    /// Payload as received.
    pub raw: Value,
}

impl ResourceRef {
    /// Builds a reference from an event's `source` object.
    ///
    /// Returns `None` for `null`, non-objects, or objects without an `id`.
    pub fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let id = match object.get("id")? {
            Value::String(id) => id.clone(),
            Value::Number(id) => id.to_string(),
            _ => return None,
        };
        let kind = object
            .get("type")
            .and_then(Value::as_str)
            .and_then(|name| name.parse().ok())
            .unwrap_or(ResourceKind::Other);
        let name = object.get("name").and_then(Value::as_str).map(str::to_owned);

        Some(Self { kind, id, name, raw: value.clone() })
    }
}

// ============================================================================
// Event
// ============================================================================

/// One immutable event delivered by the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    id: String,
    event_type: EventType,
    created_at: Option<DateTime<FixedOffset>>,
    session_id: Option<String>,
    source: Option<ResourceRef>,
}

#[derive(Deserialize)]
struct EventEntry {
    event_id: String,
    #[serde(default)]
    event_type: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    source: Value,
}

impl Event {
    /// Creates an event directly, mostly useful for tests and fixtures.
    pub fn new(id: impl Into<String>, event_type: EventType) -> Self {
        Self { id: id.into(), event_type, created_at: None, session_id: None, source: None }
    }

    /// Attaches the resource the event refers to.
    #[must_use]
    pub fn with_source(mut self, source: ResourceRef) -> Self {
        self.source = Some(source);
        self
    }

    /// Parses one entry of the events endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`NimbusError::Parse`] if the entry is not an object or lacks a
    /// string `event_id`. Unparseable timestamps and unknown event types are
    /// tolerated.
    pub fn from_json(entry: &Value) -> Result<Self> {
        let entry = EventEntry::deserialize(entry)
            .map_err(|e| NimbusError::Parse(format!("invalid event entry: {e}")))?;

        if entry.event_id.is_empty() {
            return Err(NimbusError::Parse("event entry has an empty event_id".into()));
        }

        Ok(Self {
            id: entry.event_id,
            event_type: entry.event_type.as_deref().map(EventType::from_wire).unwrap_or_default(),
            created_at: entry
                .created_at
                .as_deref()
                .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok()),
            session_id: entry.session_id,
            source: ResourceRef::from_json(&entry.source),
        })
    }

    /// Service-assigned identifier, unique per event.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Event type.
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Creation time, if sent and well-formed.
    pub fn created_at(&self) -> Option<DateTime<FixedOffset>> {
        self.created_at
    }

    /// Session that caused the event.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Resource the event is about.
    pub fn source(&self) -> Option<&ResourceRef> {
        self.source.as_ref()
    }
}

// ============================================================================
// Event page
// ============================================================================

/// One batch returned by the events endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct EventPage {
    /// Position to fetch from next.
    pub next_stream_position: StreamPosition,
    /// Raw event entries.
    #[serde(default)]
    pub entries: Vec<Value>,
}
