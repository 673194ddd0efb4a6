use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    Direct,
    Group,
    Team,
    Project,
    Ticket,
    Organization,
    Account,
    Attachment,
    Custom,
}

impl RoomType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomType::Direct => "direct",
            RoomType::Group => "group",
            RoomType::Team => "team",
            RoomType::Project => "project",
            RoomType::Ticket => "ticket",
            RoomType::Organization => "organization",
            RoomType::Account => "account",
            RoomType::Attachment => "attachment",
            RoomType::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "direct" => RoomType::Direct,
            "team" => RoomType::Team,
            "project" => RoomType::Project,
            "ticket" => RoomType::Ticket,
            "organization" => RoomType::Organization,
            "account" => RoomType::Account,
            "attachment" => RoomType::Attachment,
            "custom" => RoomType::Custom,
            _ => RoomType::Group,
        }
    }
}

/// Binds a room to an external entity it was opened against (a ticket, a
/// project, an account). `None` for free-standing group rooms and all
/// direct-message rooms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Room {
    pub id: String,
    pub room_type: RoomType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_ref: Option<EntityRef>,
    pub name: String,
    pub description: String,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
    pub is_private: bool,
    pub is_archived: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_messages: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_message_age_hours: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RoomWithStats {
    #[serde(flatten)]
    pub room: Room,
    pub message_count: i64,
    pub last_activity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_sender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_preview: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Reply,
    Quote,
    System,
    File,
    Code,
    Poll,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Reply => "reply",
            MessageType::Quote => "quote",
            MessageType::System => "system",
            MessageType::File => "file",
            MessageType::Code => "code",
            MessageType::Poll => "poll",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "reply" => MessageType::Reply,
            "quote" => MessageType::Quote,
            "system" => MessageType::System,
            "file" => MessageType::File,
            "code" => MessageType::Code,
            "poll" => MessageType::Poll,
            _ => MessageType::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentFormat {
    Plain,
    Markdown,
    Html,
}

impl ContentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentFormat::Plain => "plain",
            ContentFormat::Markdown => "markdown",
            ContentFormat::Html => "html",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "markdown" => ContentFormat::Markdown,
            "html" => ContentFormat::Html,
            _ => ContentFormat::Plain,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Message {
    pub id: String,
    pub room_id: String,
    pub sender: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_type: Option<String>,
    pub content: String,
    pub content_format: ContentFormat,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub metadata: serde_json::Value,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<String>,
    /// Parent message when this is a threaded reply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// A message quoted inline (distinct from a thread reply).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quoted_id: Option<String>,
    pub seq: i64,
    pub is_pinned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinned_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinned_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EditHistoryEntry {
    pub id: String,
    pub message_id: String,
    pub edit_number: i64,
    pub content: String,
    pub content_format: ContentFormat,
    pub metadata: serde_json::Value,
    pub edited_by: String,
    pub edited_at: String,
}

/// A message-level attachment. The binary lives in the attachment store;
/// `storage_ref` is that service's `reference_id`, resolved on demand via
/// the attachment client rather than duplicated here.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Attachment {
    pub id: String,
    pub message_id: String,
    pub storage_ref: String,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct AttachMessageFile {
    pub storage_ref: String,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoom {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub room_type: Option<RoomType>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub entity_ref: Option<EntityRef>,
    #[serde(default)]
    pub max_messages: Option<i64>,
    #[serde(default)]
    pub max_message_age_hours: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoom {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub max_messages: Option<Option<i64>>,
    #[serde(default)]
    pub max_message_age_hours: Option<Option<i64>>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessage {
    pub content: String,
    #[serde(default)]
    pub content_format: Option<ContentFormat>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub quoted_id: Option<String>,
    #[serde(default)]
    pub sender_type: Option<String>,
    #[serde(default)]
    pub attachments: Vec<AttachMessageFile>,
    /// Explicit type override for shapes that can't be inferred from the
    /// other fields (`code`, `poll`). Inferred from `parent_id`/`quoted_id`/
    /// `attachments` when omitted.
    #[serde(default)]
    pub message_type: Option<MessageType>,
}

#[derive(Debug, Deserialize)]
pub struct EditMessage {
    pub content: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

// --- Participants ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Owner,
    Admin,
    Moderator,
    Member,
    Guest,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Owner => "owner",
            ParticipantRole::Admin => "admin",
            ParticipantRole::Moderator => "moderator",
            ParticipantRole::Member => "member",
            ParticipantRole::Guest => "guest",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "owner" => ParticipantRole::Owner,
            "admin" => ParticipantRole::Admin,
            "moderator" => ParticipantRole::Moderator,
            "guest" => ParticipantRole::Guest,
            _ => ParticipantRole::Member,
        }
    }

    pub(crate) fn rank(self) -> u8 {
        match self {
            ParticipantRole::Guest => 0,
            ParticipantRole::Member => 1,
            ParticipantRole::Moderator => 2,
            ParticipantRole::Admin => 3,
            ParticipantRole::Owner => 4,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Participant {
    pub room_id: String,
    pub sender: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_type: Option<String>,
    pub role: ParticipantRole,
    pub is_muted: bool,
    pub message_count: i64,
    pub first_seen: String,
    pub last_seen: String,
}

// --- Search ---

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SearchResult {
    pub message_id: String,
    pub room_id: String,
    pub room_name: String,
    pub sender: String,
    pub content: String,
    pub created_at: String,
    pub seq: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub count: usize,
    pub query: String,
}

// --- Presence ---

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PresenceEntry {
    pub sender: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_type: Option<String>,
    pub connected_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoomPresenceResponse {
    pub room_id: String,
    pub online: Vec<PresenceEntry>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GlobalPresenceResponse {
    pub rooms: std::collections::HashMap<String, Vec<PresenceEntry>>,
    pub total_online: usize,
}

#[derive(Debug, Deserialize)]
pub struct TypingNotification {
    pub sender: String,
}

// --- Webhooks ---

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Webhook {
    pub id: String,
    pub room_id: String,
    pub url: String,
    pub events: String,
    pub created_by: String,
    pub created_at: String,
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateWebhook {
    pub url: String,
    #[serde(default = "default_webhook_events")]
    pub events: String,
    #[serde(default)]
    pub secret: Option<String>,
}

fn default_webhook_events() -> String {
    "*".to_string()
}

#[derive(Debug, Deserialize)]
pub struct UpdateWebhook {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub events: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct IncomingWebhook {
    pub id: String,
    pub room_id: String,
    pub name: String,
    pub token: String,
    pub created_by: String,
    pub created_at: String,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateIncomingWebhook {
    pub name: String,
    pub created_by: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateIncomingWebhook {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct IncomingWebhookMessage {
    pub content: String,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub sender_type: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WebhookDelivery {
    pub event: String,
    pub room_id: String,
    pub room_name: String,
    pub data: serde_json::Value,
    pub timestamp: String,
}

// --- Read Positions ---

#[derive(Debug, Deserialize)]
pub struct UpdateReadPosition {
    pub last_read_seq: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReadPosition {
    pub room_id: String,
    pub sender: String,
    pub last_read_seq: i64,
    pub updated_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UnreadInfo {
    pub room_id: String,
    pub room_name: String,
    pub unread_count: i64,
    pub last_read_seq: i64,
    pub latest_seq: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadResponse {
    pub sender: String,
    pub rooms: Vec<UnreadInfo>,
    pub total_unread: i64,
}

// --- Reactions ---

#[derive(Debug, Deserialize)]
pub struct AddReaction {
    pub emoji: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Reaction {
    pub id: String,
    pub message_id: String,
    pub room_id: String,
    pub sender: String,
    pub emoji: String,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReactionSummary {
    pub emoji: String,
    pub count: i64,
    pub senders: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReactionsResponse {
    pub message_id: String,
    pub reactions: Vec<ReactionSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoomReactionsResponse {
    pub room_id: String,
    pub reactions: std::collections::HashMap<String, Vec<ReactionSummary>>,
}

