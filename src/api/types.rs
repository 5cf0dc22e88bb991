//! Wire types mirrored from the platform API's JSON responses.
//!
//! The server's response contracts were never fully pinned down — several
//! endpoints return numbers-as-strings, optional wrappers, or one of many
//! historical field names. The rule here is: each tolerated shape gets a
//! discriminated serde type plus a single normalization point, so call
//! sites only ever see the canonical form.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Response from `GET /api/me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Me {
    pub role: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(rename = "clientId", default)]
    pub client_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Tenant record
// ---------------------------------------------------------------------------

/// A file attached to a client's knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Nested knowledge sub-document some server versions return.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeInfo {
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "opt_u32_lenient"
    )]
    pub version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// A tenant record as returned by `/api/clients` endpoints.
///
/// Everything defaults so that partial records from older server versions
/// still parse. Field names follow the wire format, including the
/// upper-case token fields the server has always used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientRecord {
    #[serde(rename = "clientId", skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub name: String,
    pub email: String,
    pub quota: u64,
    pub used: u64,
    pub active: bool,
    #[serde(rename = "lastActive", skip_serializing_if = "Option::is_none")]
    pub last_active: Option<String>,
    #[serde(rename = "humanRequests")]
    pub human_requests: u64,
    #[serde(rename = "tourRequests")]
    pub tour_requests: u64,
    pub files: Vec<FileEntry>,
    // Channel wiring
    #[serde(
        rename = "pageId",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "opt_string_lenient"
    )]
    pub page_id: Option<String>,
    #[serde(rename = "PAGE_NAME", skip_serializing_if = "Option::is_none")]
    pub page_name: Option<String>,
    #[serde(rename = "igId", skip_serializing_if = "Option::is_none")]
    pub ig_id: Option<String>,
    #[serde(rename = "igBusinessId", skip_serializing_if = "Option::is_none")]
    pub ig_business_id: Option<String>,
    #[serde(rename = "igUsername", skip_serializing_if = "Option::is_none")]
    pub ig_username: Option<String>,
    #[serde(rename = "PAGE_ACCESS_TOKEN", skip_serializing_if = "Option::is_none")]
    pub page_access_token: Option<String>,
    #[serde(rename = "VERIFY_TOKEN", skip_serializing_if = "Option::is_none")]
    pub verify_token: Option<String>,
    // Bot configuration
    #[serde(rename = "systemPrompt", skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faqs: Option<String>,
    #[serde(rename = "businessName", skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    // Knowledge gate fields (all historical spellings)
    #[serde(rename = "botBuilt", skip_serializing_if = "Option::is_none")]
    pub bot_built: Option<bool>,
    #[serde(rename = "knowledgeReady", skip_serializing_if = "Option::is_none")]
    pub knowledge_ready: Option<bool>,
    #[serde(
        rename = "knowledgeVersion",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "opt_u32_lenient"
    )]
    pub knowledge_version: Option<u32>,
    #[serde(rename = "knowledgeStatus", skip_serializing_if = "Option::is_none")]
    pub knowledge_status: Option<String>,
    #[serde(rename = "botStatus", skip_serializing_if = "Option::is_none")]
    pub bot_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub knowledge: Option<KnowledgeInfo>,
}

impl ClientRecord {
    /// Remaining quota, clamped at zero for display.
    pub fn remaining(&self) -> u64 {
        self.quota.saturating_sub(self.used)
    }
}

/// Save responses arrive either bare or wrapped in `{ "client": ... }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SavedClient {
    Wrapped { client: ClientRecord },
    Bare(ClientRecord),
}

impl SavedClient {
    pub fn into_inner(self) -> ClientRecord {
        match self {
            Self::Wrapped { client } => client,
            Self::Bare(client) => client,
        }
    }
}

// ---------------------------------------------------------------------------
// Conversations
// ---------------------------------------------------------------------------

/// A single message inside a conversation history. Old records can miss
/// either field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

/// A conversation record from `/api/conversations`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conversation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub psid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub history: Vec<Message>,
    #[serde(rename = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Conversation {
    /// Best available user identifier, in the order the server populates
    /// them per channel: web user, Meta user id, Messenger PSID.
    pub fn display_user(&self) -> &str {
        self.user
            .as_deref()
            .or(self.user_id.as_deref())
            .or(self.psid.as_deref())
            .unwrap_or("Unknown user")
    }
}

// ---------------------------------------------------------------------------
// Usage stats
// ---------------------------------------------------------------------------

/// Usage snapshot from `GET /api/stats` (admin) or `/api/stats/:clientId`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StatsSnapshot {
    #[serde(rename = "totalClients")]
    pub total_clients: u64,
    pub used: u64,
    pub quota: u64,
    pub clients: Vec<ClientRecord>,
    #[serde(rename = "totalHumanRequests")]
    pub total_human_requests: u64,
    #[serde(rename = "totalTourRequests")]
    pub total_tour_requests: u64,
    #[serde(rename = "totalorderRequests")]
    pub total_order_requests: u64,
}

impl StatsSnapshot {
    /// Remaining quota, clamped at zero for display.
    pub fn remaining(&self) -> u64 {
        self.quota.saturating_sub(self.used)
    }
}

/// One time bucket of the activity chart. `_id` is the bucket key: an hour
/// (daily), a 1=Sun..7=Sat weekday (weekly) or a day-of-month (monthly).
#[derive(Debug, Clone, Deserialize)]
pub struct ChartBucket {
    #[serde(rename = "_id")]
    pub id: i64,
    #[serde(default)]
    pub count: u64,
}

/// The chart endpoint returns either a bare bucket array or
/// `{ "chartResults": [...] }` depending on server version.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ChartResponse {
    Wrapped {
        #[serde(rename = "chartResults", default)]
        chart_results: Vec<ChartBucket>,
    },
    Bare(Vec<ChartBucket>),
}

impl ChartResponse {
    pub fn into_buckets(self) -> Vec<ChartBucket> {
        match self {
            Self::Wrapped { chart_results } => chart_results,
            Self::Bare(buckets) => buckets,
        }
    }
}

// ---------------------------------------------------------------------------
// Health / webhook / channel status
// ---------------------------------------------------------------------------

/// A warning from `GET /api/clients/:id/health`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HealthWarning {
    pub code: String,
    pub severity: String,
    pub message: String,
}

/// Health report for a client.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HealthReport {
    pub status: String,
    pub warnings: Vec<HealthWarning>,
}

impl Default for HealthReport {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            warnings: Vec::new(),
        }
    }
}

/// Snapshot from `GET /api/webhooks/status/:id`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebhookStatus {
    #[serde(rename = "webhookSubscribed")]
    pub subscribed: bool,
    #[serde(rename = "webhookFields")]
    pub fields: Vec<String>,
    #[serde(rename = "webhookSubscribedAt")]
    pub subscribed_at: Option<String>,
    #[serde(rename = "lastWebhookAt")]
    pub last_webhook_at: Option<String>,
    #[serde(rename = "lastWebhookType")]
    pub last_webhook_type: Option<String>,
}

/// Snapshot from `GET /api/whatsapp/status`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WhatsAppStatus {
    pub ok: bool,
    pub connected: bool,
    #[serde(rename = "wabaId")]
    pub waba_id: Option<String>,
    #[serde(rename = "phoneNumberId")]
    pub phone_number_id: Option<String>,
    #[serde(rename = "displayPhone")]
    pub display_phone: Option<String>,
}

/// Instagram profile fields from `/instagram/review/profile`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IgProfile {
    pub username: String,
    pub name: String,
    pub biography: String,
    pub followers_count: u64,
    pub media_count: u64,
}

/// One media entry from `/instagram/review/media`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IgMedia {
    pub id: String,
    pub media_type: String,
    pub caption: Option<String>,
    pub permalink: Option<String>,
}

/// Raw shape of the dedicated `GET /api/knowledge/status` endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KnowledgeStatusRaw {
    #[serde(deserialize_with = "opt_u32_lenient")]
    pub version: Option<u32>,
    #[serde(rename = "knowledgeVersion", deserialize_with = "opt_u32_lenient")]
    pub knowledge_version: Option<u32>,
    pub status: Option<String>,
    #[serde(rename = "knowledgeStatus")]
    pub knowledge_status: Option<String>,
    pub ready: Option<bool>,
}

// ---------------------------------------------------------------------------
// Generic acknowledgements
// ---------------------------------------------------------------------------

/// Tolerant acknowledgement body.
///
/// Mutating endpoints signal success with any of `ok: true`,
/// `success: true`, or `status: "ok"`; all three are treated as
/// equivalent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Ack {
    pub ok: Option<bool>,
    pub success: Option<bool>,
    pub status: Option<String>,
    pub error: Option<serde_json::Value>,
}

impl Ack {
    pub fn accepted(&self) -> bool {
        self.ok == Some(true) || self.success == Some(true) || self.status.as_deref() == Some("ok")
    }
}

/// `{ ok, data, error }` wrapper used by the channel-review endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub ok: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl<T> Envelope<T> {
    /// Unwrap the payload, turning `ok: false` or a missing `data` field
    /// into an error carrying the server's error value.
    pub fn into_data(self) -> anyhow::Result<T> {
        if !self.ok {
            let detail = self
                .error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no error detail".to_string());
            anyhow::bail!("server reported failure: {detail}");
        }
        self.data
            .ok_or_else(|| anyhow::anyhow!("server response had ok=true but no data"))
    }
}

// ---------------------------------------------------------------------------
// Lenient field deserializers
// ---------------------------------------------------------------------------

/// Accept a string, number, or null where the canonical type is a string.
/// The admin form posts `pageId` as a number while other paths store it as
/// a string.
fn opt_string_lenient<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(other) => {
            return Err(de::Error::custom(format!(
                "expected string or number, got {other}"
            )));
        }
    })
}

/// Accept a number, numeric string, or null where the canonical type is a
/// version counter.
fn opt_u32_lenient<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::Number(n)) => n.as_u64().map(|v| v as u32),
        Some(serde_json::Value::String(s)) => s.trim().parse::<u32>().ok(),
        Some(other) => {
            return Err(de::Error::custom(format!(
                "expected number or numeric string, got {other}"
            )));
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_record_parses_numeric_page_id() {
        let json = r#"{"clientId":"c1","name":"Acme","pageId":12345}"#;
        let rec: ClientRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.page_id.as_deref(), Some("12345"));
    }

    #[test]
    fn client_record_parses_string_page_id() {
        let json = r#"{"clientId":"c1","name":"Acme","pageId":"12345"}"#;
        let rec: ClientRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.page_id.as_deref(), Some("12345"));
    }

    #[test]
    fn knowledge_version_accepts_string() {
        let json = r#"{"knowledgeVersion":"2"}"#;
        let rec: ClientRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.knowledge_version, Some(2));
    }

    #[test]
    fn remaining_never_underflows() {
        let rec = ClientRecord {
            quota: 100,
            used: 250,
            ..Default::default()
        };
        assert_eq!(rec.remaining(), 0);
    }

    #[test]
    fn saved_client_unwraps_both_shapes() {
        let wrapped: SavedClient =
            serde_json::from_str(r#"{"client":{"clientId":"c1","name":"A"}}"#).unwrap();
        assert_eq!(wrapped.into_inner().client_id.as_deref(), Some("c1"));

        let bare: SavedClient = serde_json::from_str(r#"{"clientId":"c2","name":"B"}"#).unwrap();
        assert_eq!(bare.into_inner().client_id.as_deref(), Some("c2"));
    }

    #[test]
    fn chart_response_unwraps_both_shapes() {
        let wrapped: ChartResponse =
            serde_json::from_str(r#"{"chartResults":[{"_id":4,"count":10}]}"#).unwrap();
        assert_eq!(wrapped.into_buckets().len(), 1);

        let bare: ChartResponse = serde_json::from_str(r#"[{"_id":13,"count":2}]"#).unwrap();
        let buckets = bare.into_buckets();
        assert_eq!(buckets[0].id, 13);
    }

    #[test]
    fn display_user_falls_through_identifiers() {
        let mut convo = Conversation::default();
        assert_eq!(convo.display_user(), "Unknown user");

        convo.psid = Some("psid-1".to_string());
        assert_eq!(convo.display_user(), "psid-1");

        convo.user_id = Some("uid-1".to_string());
        assert_eq!(convo.display_user(), "uid-1");

        convo.user = Some("alice".to_string());
        assert_eq!(convo.display_user(), "alice");
    }

    #[test]
    fn history_entry_missing_role_or_content_still_parses() {
        let json = r#"{
            "source": "web",
            "history": [
                {"content": "hi"},
                {"role": "assistant"},
                {"role": "user", "content": "bye"}
            ]
        }"#;
        let convo: Conversation = serde_json::from_str(json).unwrap();
        assert_eq!(convo.history.len(), 3);
        assert_eq!(convo.history[0].role, "");
        assert_eq!(convo.history[1].content, "");
    }

    #[test]
    fn ack_accepts_all_historical_success_shapes() {
        let shapes = [
            r#"{"ok":true}"#,
            r#"{"success":true}"#,
            r#"{"status":"ok"}"#,
        ];
        for json in shapes {
            let ack: Ack = serde_json::from_str(json).unwrap();
            assert!(ack.accepted(), "should accept {json}");
        }

        let rejected: Ack = serde_json::from_str(r#"{"error":"nope"}"#).unwrap();
        assert!(!rejected.accepted());
    }

    #[test]
    fn envelope_surfaces_server_error() {
        let env: Envelope<IgProfile> =
            serde_json::from_str(r#"{"ok":false,"error":{"code":190}}"#).unwrap();
        let err = env.into_data().unwrap_err();
        assert!(err.to_string().contains("190"));
    }
}
