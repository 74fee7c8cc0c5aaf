//! Chat message history
//!
//! One entity per chat session, keyed `(kind, session_id)`. The entity's
//! `messages` property holds `{"messages": [bytes, ...]}`, each element the
//! UTF-8 JSON encoding of one message.

use std::fmt;

use entidoc_core::{EntityStore, Key, PathSegment, PropertyMap, PropertyValue, StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::VERSION;

/// Property holding the encoded messages
pub const MESSAGES_PROPERTY: &str = "messages";

/// Who produced a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Human,
    Ai,
    System,
    Tool,
    Function,
    Chat,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Human => "human",
            Self::Ai => "ai",
            Self::System => "system",
            Self::Tool => "tool",
            Self::Function => "function",
            Self::Chat => "chat",
        };
        write!(f, "{}", s)
    }
}

/// Message body: plain text or a list of content blocks
///
/// Content blocks (text, image, tool use, ...) are kept as raw JSON so any
/// stored message decodes and is written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<Value>),
}

impl MessageContent {
    /// The text of a plain-text body
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Parts(_) => None,
        }
    }

    pub fn parts(&self) -> Option<&[Value]> {
        match self {
            Self::Text(_) => None,
            Self::Parts(parts) => Some(parts),
        }
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<Value>> for MessageContent {
    fn from(parts: Vec<Value>) -> Self {
        Self::Parts(parts)
    }
}

/// A single chat message
///
/// Fields other than `type` and `content` (additional kwargs, ids, tool
/// call data, ...) are kept in `additional` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: MessageContent,
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

impl ChatMessage {
    pub fn new(kind: MessageKind, content: impl Into<MessageContent>) -> Self {
        Self {
            kind,
            content: content.into(),
            additional: Map::new(),
        }
    }

    pub fn human(content: impl Into<MessageContent>) -> Self {
        Self::new(MessageKind::Human, content)
    }

    pub fn ai(content: impl Into<MessageContent>) -> Self {
        Self::new(MessageKind::Ai, content)
    }

    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self::new(MessageKind::System, content)
    }

    /// Attach an extra field, builder style
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.additional.insert(name.into(), value);
        self
    }
}

/// Encodes messages to and from their stored byte form
pub struct MessageConverter;

impl MessageConverter {
    pub fn encode_messages(messages: &[ChatMessage]) -> StoreResult<Vec<Vec<u8>>> {
        messages
            .iter()
            .map(|m| serde_json::to_vec(m).map_err(StoreError::from))
            .collect()
    }

    pub fn decode_messages<B: AsRef<[u8]>>(encoded: &[B]) -> StoreResult<Vec<ChatMessage>> {
        encoded
            .iter()
            .map(|bytes| serde_json::from_slice(bytes.as_ref()).map_err(StoreError::from))
            .collect()
    }

    /// Build the stored `messages` property value
    pub fn to_property(messages: &[ChatMessage]) -> StoreResult<PropertyValue> {
        let encoded = Self::encode_messages(messages)?
            .into_iter()
            .map(PropertyValue::Bytes)
            .collect::<Vec<_>>();

        let mut wrapper = PropertyMap::new();
        wrapper.insert(MESSAGES_PROPERTY.to_string(), PropertyValue::Array(encoded));
        Ok(PropertyValue::Map(wrapper))
    }

    /// Decode a stored `messages` property value
    ///
    /// Accepts the wrapped layout as well as a bare list of encoded messages.
    /// Elements may be bytes or strings.
    pub fn from_property(value: &PropertyValue) -> StoreResult<Vec<ChatMessage>> {
        let items = match value {
            PropertyValue::Map(wrapper) => match wrapper.get(MESSAGES_PROPERTY) {
                Some(PropertyValue::Array(items)) => items,
                Some(PropertyValue::Null) | None => return Ok(Vec::new()),
                Some(other) => {
                    return Err(StoreError::serialization(format!(
                        "expected message list, found {}",
                        other.type_name()
                    )))
                }
            },
            PropertyValue::Array(items) => items,
            PropertyValue::Null => return Ok(Vec::new()),
            other => {
                return Err(StoreError::serialization(format!(
                    "expected message list, found {}",
                    other.type_name()
                )))
            }
        };

        let encoded = items
            .iter()
            .map(|item| match item {
                PropertyValue::Bytes(bytes) => Ok(bytes.as_slice()),
                PropertyValue::String(text) => Ok(text.as_bytes()),
                other => Err(StoreError::serialization(format!(
                    "expected encoded message, found {}",
                    other.type_name()
                ))),
            })
            .collect::<StoreResult<Vec<&[u8]>>>()?;

        Self::decode_messages(&encoded)
    }
}

/// Messages of one chat session, persisted as a single entity
pub struct ChatMessageHistory<S> {
    store: S,
    session_id: String,
    key: Key,
    messages: Vec<ChatMessage>,
}

impl<S: EntityStore> ChatMessageHistory<S> {
    /// Open the history for `session_id` under the configured kind
    pub async fn new(store: &S, session_id: impl Into<String>) -> StoreResult<Self> {
        let kind = store.config().chat_history_kind.clone();
        Self::with_kind(store, &kind, session_id).await
    }

    /// Open the history for `session_id` under `kind`
    pub async fn with_kind(
        store: &S,
        kind: &str,
        session_id: impl Into<String>,
    ) -> StoreResult<Self> {
        let agent = format!("entidoc:chat_history/{}", VERSION);
        let store = store.with_config(store.config().with_user_agent(&agent));
        let session_id = session_id.into();
        let key = store.key(&[
            PathSegment::from(kind),
            PathSegment::from(session_id.as_str()),
        ])?;

        let mut history = Self {
            store,
            session_id,
            key,
            messages: Vec::new(),
        };
        history.load_messages().await?;
        Ok(history)
    }

    async fn load_messages(&mut self) -> StoreResult<()> {
        let Some(entity) = self.store.get(&self.key).await? else {
            debug!(key = %self.key, "No stored chat history");
            return Ok(());
        };
        if let Some(stored) = entity.get(MESSAGES_PROPERTY) {
            self.messages = MessageConverter::from_property(stored)?;
        }
        info!(
            session = %self.session_id,
            count = self.messages.len(),
            "Loaded chat history"
        );
        Ok(())
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Append `message` and persist the full history
    ///
    /// On failure the message is removed again so memory matches the store.
    pub async fn add_message(&mut self, message: ChatMessage) -> StoreResult<()> {
        self.messages.push(message);
        if let Err(err) = self.upsert_messages().await {
            self.messages.pop();
            warn!(session = %self.session_id, error = %err, "Failed to store chat message");
            return Err(err);
        }
        Ok(())
    }

    /// Append several messages with a single write
    pub async fn add_messages<I>(&mut self, messages: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = ChatMessage>,
    {
        let previous = self.messages.len();
        self.messages.extend(messages);
        if let Err(err) = self.upsert_messages().await {
            self.messages.truncate(previous);
            return Err(err);
        }
        Ok(())
    }

    async fn upsert_messages(&self) -> StoreResult<()> {
        let mut entity = self.store.entity(self.key.clone());
        entity.insert(MESSAGES_PROPERTY, MessageConverter::to_property(&self.messages)?);
        self.store.put(entity).await?;
        debug!(session = %self.session_id, count = self.messages.len(), "Stored chat history");
        Ok(())
    }

    /// Forget every message and delete the stored entity
    pub async fn clear(&mut self) -> StoreResult<()> {
        self.messages.clear();
        self.store.delete(&self.key).await?;
        debug!(session = %self.session_id, "Cleared chat history");
        Ok(())
    }
}
