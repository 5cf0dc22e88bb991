//! Knowledge-base gate and build submission.
//!
//! Channel connections are locked until a client's knowledge base has been
//! built at least once. The server has grown several shapes for reporting
//! that state; everything funnels through [`KnowledgeGate`] so the rest of
//! the tool asks one question: `gate.ready`.

use std::fs;
use std::path::PathBuf;

use anyhow::{Result, bail};
use serde_json::json;

use crate::api::types::{Ack, ClientRecord, KnowledgeStatusRaw};
use crate::api::{ApiClient, multipart::MultipartForm, urlencode};

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// Canonical knowledge-base state.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeGate {
    pub version: u32,
    /// Server status string, or `"ready"`/`"empty"` synthesized from the
    /// boolean signals, or `"unknown"` when nothing could be fetched.
    pub status: String,
    pub ready: bool,
}

impl KnowledgeGate {
    /// Gate used when every status fetch failed. Fails closed.
    pub fn unknown() -> Self {
        Self {
            version: 0,
            status: "unknown".to_string(),
            ready: false,
        }
    }
}

/// Normalize the gate from a full client record.
///
/// Readiness is the OR of every historical signal: `botBuilt`,
/// `knowledgeReady`, a `"ready"` status, or a version of at least 1.
pub fn gate_from_client(record: &ClientRecord) -> KnowledgeGate {
    let version = record
        .knowledge_version
        .or(record.knowledge.as_ref().and_then(|k| k.version))
        .unwrap_or(0);

    let status = record
        .knowledge_status
        .as_deref()
        .or(record
            .knowledge
            .as_ref()
            .and_then(|k| k.status.as_deref()))
        .or(record.bot_status.as_deref())
        .unwrap_or("")
        .trim()
        .to_string();

    let ready = record.bot_built == Some(true)
        || record.knowledge_ready == Some(true)
        || status == "ready"
        || version >= 1;

    KnowledgeGate {
        version,
        status: resolve_status(status, ready),
        ready,
    }
}

/// Normalize the gate from the dedicated status endpoint's shape.
pub fn gate_from_status(raw: &KnowledgeStatusRaw) -> KnowledgeGate {
    let version = raw.version.or(raw.knowledge_version).unwrap_or(0);

    let status = raw
        .status
        .as_deref()
        .or(raw.knowledge_status.as_deref())
        .unwrap_or("")
        .trim()
        .to_string();

    let ready = status == "ready" || version >= 1 || raw.ready == Some(true);

    KnowledgeGate {
        version,
        status: resolve_status(status, ready),
        ready,
    }
}

fn resolve_status(status: String, ready: bool) -> String {
    if status.is_empty() {
        if ready { "ready" } else { "empty" }.to_string()
    } else {
        status
    }
}

/// Fetch the gate, preferring the client record and falling back to the
/// dedicated status endpoint. Never fails: if both fetches error, the
/// gate is unknown and not ready.
pub fn fetch_gate(api: &ApiClient, client_id: &str, bot_type: &str) -> KnowledgeGate {
    let record_path = format!("/api/clients/{}", urlencode(client_id));
    if let Ok(record) = api.get_json::<ClientRecord>(&record_path) {
        return gate_from_client(&record);
    }

    let status_path = format!(
        "/api/knowledge/status?clientId={}&botType={}",
        urlencode(client_id),
        urlencode(bot_type)
    );
    if let Ok(raw) = api.get_json::<KnowledgeStatusRaw>(&status_path) {
        return gate_from_status(&raw);
    }

    KnowledgeGate::unknown()
}

// ---------------------------------------------------------------------------
// Build submission
// ---------------------------------------------------------------------------

/// Structured business-profile form for `inputType: "form"` builds.
#[derive(Debug, Clone, Default)]
pub struct BuildForm {
    pub business_name: String,
    pub business_type: String,
    pub city_area: String,
    pub hours: String,
    pub phone_whatsapp: String,
    pub services: String,
    pub faqs: String,
    pub listings_summary: String,
    pub payment_plans: String,
    pub policies: String,
}

impl BuildForm {
    fn fields(&self) -> [&str; 10] {
        [
            &self.business_name,
            &self.business_type,
            &self.city_area,
            &self.hours,
            &self.phone_whatsapp,
            &self.services,
            &self.faqs,
            &self.listings_summary,
            &self.payment_plans,
            &self.policies,
        ]
    }

    /// True when every field is blank; such a form is rejected locally.
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|f| f.trim().is_empty())
    }

    fn to_data(&self) -> serde_json::Value {
        json!({
            "businessName": self.business_name,
            "businessType": self.business_type,
            "cityArea": self.city_area,
            "hours": self.hours,
            "phoneWhatsapp": self.phone_whatsapp,
            "services": self.services,
            "faqs": self.faqs,
            "listingsSummary": self.listings_summary,
            "paymentPlans": self.payment_plans,
            "policies": self.policies,
        })
    }
}

/// The three build input modes.
#[derive(Debug, Clone)]
pub enum BuildInput {
    Form(BuildForm),
    Text { section: String, text: String },
    File { section: String, path: PathBuf },
}

/// Submit a knowledge build, falling back to the legacy rebuild endpoint
/// when the primary endpoint fails or does not acknowledge success.
pub fn submit_build(
    api: &ApiClient,
    client_id: &str,
    bot_type: &str,
    input: &BuildInput,
) -> Result<()> {
    let mut ok = false;
    let mut last_detail = String::new();

    match input {
        BuildInput::Form(form) => {
            if form.is_empty() {
                bail!("fill at least one form field to build the bot");
            }
            let payload = json!({
                "clientId": client_id,
                "botType": bot_type,
                "inputType": "form",
                "data": form.to_data(),
            });
            ok = try_primary(api, "/api/knowledge/build", payload, &mut last_detail);
        }
        BuildInput::Text { section, text } => {
            if text.trim().is_empty() {
                bail!("paste text is empty");
            }
            let payload = json!({
                "clientId": client_id,
                "botType": bot_type,
                "inputType": "text",
                "section": section,
                "text": text,
            });
            ok = try_primary(api, "/api/knowledge/build", payload, &mut last_detail);
        }
        BuildInput::File { section, path } => {
            let data = fs::read(path)
                .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", path.display()))?;
            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("knowledge.txt");

            let mut form = MultipartForm::new();
            form.text("clientId", client_id)
                .text("section", section)
                .text("botType", bot_type)
                .file("file", filename, "text/plain", &data);

            match api.post_multipart::<Ack>("/api/knowledge/upload", form) {
                Ok(ack) if ack.accepted() => ok = true,
                Ok(ack) => last_detail = format!("{ack:?}"),
                Err(err) => last_detail = err.to_string(),
            }
        }
    }

    if !ok {
        ok = try_rebuild_fallback(api, client_id, bot_type, &mut last_detail)?;
    }

    if !ok {
        bail!("knowledge build failed. Last server response: {last_detail}");
    }

    Ok(())
}

fn try_primary(
    api: &ApiClient,
    path: &str,
    payload: serde_json::Value,
    last_detail: &mut String,
) -> bool {
    match api.post_json::<Ack>(path, &payload) {
        Ok(ack) if ack.accepted() => true,
        Ok(ack) => {
            *last_detail = format!("{ack:?}");
            false
        }
        Err(err) => {
            *last_detail = err.to_string();
            false
        }
    }
}

/// `POST /api/knowledge/rebuild/:id`. An HTTP-OK response with no explicit
/// `ok`/`success` field counts as success (legacy endpoint contract).
fn try_rebuild_fallback(
    api: &ApiClient,
    client_id: &str,
    bot_type: &str,
    last_detail: &mut String,
) -> Result<bool> {
    let path = format!("/api/knowledge/rebuild/{}", urlencode(client_id));
    let payload = json!({ "botType": bot_type });

    match api.post_json::<Ack>(&path, &payload) {
        Ok(ack) => {
            let ok = ack.ok.or(ack.success).unwrap_or(true);
            if !ok {
                *last_detail = format!("{ack:?}");
            }
            Ok(ok)
        }
        Err(err) => {
            *last_detail = err.to_string();
            Ok(false)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_ready_from_version() {
        let record = ClientRecord {
            knowledge_version: Some(2),
            ..Default::default()
        };
        let gate = gate_from_client(&record);
        assert!(gate.ready);
        assert_eq!(gate.version, 2);
        assert_eq!(gate.status, "ready");
    }

    #[test]
    fn gate_ready_from_bot_built_flag() {
        let record = ClientRecord {
            bot_built: Some(true),
            ..Default::default()
        };
        assert!(gate_from_client(&record).ready);
    }

    #[test]
    fn gate_ready_from_status_string() {
        let record = ClientRecord {
            knowledge_status: Some("  ready ".to_string()),
            ..Default::default()
        };
        let gate = gate_from_client(&record);
        assert!(gate.ready);
        assert_eq!(gate.status, "ready");
    }

    #[test]
    fn gate_prefers_nested_knowledge_fields_as_fallback() {
        let record = ClientRecord {
            knowledge: Some(crate::api::types::KnowledgeInfo {
                version: Some(1),
                status: None,
            }),
            ..Default::default()
        };
        let gate = gate_from_client(&record);
        assert!(gate.ready);
        assert_eq!(gate.version, 1);
    }

    #[test]
    fn gate_empty_when_nothing_signals_readiness() {
        let gate = gate_from_client(&ClientRecord::default());
        assert!(!gate.ready);
        assert_eq!(gate.version, 0);
        assert_eq!(gate.status, "empty");
    }

    #[test]
    fn status_endpoint_gate_honors_ready_flag() {
        let raw = KnowledgeStatusRaw {
            ready: Some(true),
            ..Default::default()
        };
        assert!(gate_from_status(&raw).ready);
    }

    #[test]
    fn status_endpoint_gate_keeps_nonready_status_string() {
        let raw = KnowledgeStatusRaw {
            status: Some("building".to_string()),
            ..Default::default()
        };
        let gate = gate_from_status(&raw);
        assert!(!gate.ready);
        assert_eq!(gate.status, "building");
    }

    #[test]
    fn unknown_gate_fails_closed() {
        let gate = KnowledgeGate::unknown();
        assert!(!gate.ready);
        assert_eq!(gate.status, "unknown");
    }

    #[test]
    fn blank_form_is_empty() {
        let form = BuildForm {
            services: "   ".to_string(),
            ..Default::default()
        };
        assert!(form.is_empty());

        let form = BuildForm {
            services: "tours".to_string(),
            ..Default::default()
        };
        assert!(!form.is_empty());
    }

    #[test]
    fn form_data_uses_wire_field_names() {
        let form = BuildForm {
            business_name: "Acme".to_string(),
            listings_summary: "3 listings".to_string(),
            ..Default::default()
        };
        let data = form.to_data();
        assert_eq!(data["businessName"], "Acme");
        assert_eq!(data["listingsSummary"], "3 listings");
        assert_eq!(data["paymentPlans"], "");
    }
}
