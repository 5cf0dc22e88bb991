//! Webhook payload inspection helpers.

use serde_json::Value;

/// Extract a messages-only view from a raw webhook payload.
///
/// WhatsApp payloads carry messages at `entry[].changes[].value.messages[]`;
/// Messenger payloads carry events at `entry[].messaging[]`. Returns the
/// collected WhatsApp messages if any exist, otherwise the Messenger
/// events, otherwise `None` (caller shows the full payload).
pub fn extract_messages(payload: &Value) -> Option<Value> {
    // Some status responses nest the payload under `lastWebhookPayload`.
    let raw = payload.get("lastWebhookPayload").unwrap_or(payload);

    let entries = raw.get("entry").and_then(Value::as_array)?;

    let mut whatsapp = Vec::new();
    let mut messenger = Vec::new();

    for entry in entries {
        if let Some(changes) = entry.get("changes").and_then(Value::as_array) {
            for change in changes {
                if let Some(messages) = change
                    .pointer("/value/messages")
                    .and_then(Value::as_array)
                {
                    whatsapp.extend(messages.iter().cloned());
                }
            }
        }
        if let Some(events) = entry.get("messaging").and_then(Value::as_array) {
            messenger.extend(events.iter().cloned());
        }
    }

    if !whatsapp.is_empty() {
        Some(Value::Array(whatsapp))
    } else if !messenger.is_empty() {
        Some(Value::Array(messenger))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_whatsapp_messages() {
        let payload = json!({
            "entry": [{
                "changes": [{
                    "value": { "messages": [{ "from": "123", "text": { "body": "hi" } }] }
                }]
            }]
        });
        let messages = extract_messages(&payload).unwrap();
        assert_eq!(messages.as_array().unwrap().len(), 1);
        assert_eq!(messages[0]["from"], "123");
    }

    #[test]
    fn extracts_messenger_events_when_no_whatsapp_messages() {
        let payload = json!({
            "entry": [
                { "messaging": [{ "sender": { "id": "psid-1" } }] },
                { "messaging": [{ "sender": { "id": "psid-2" } }] }
            ]
        });
        let events = extract_messages(&payload).unwrap();
        assert_eq!(events.as_array().unwrap().len(), 2);
    }

    #[test]
    fn unwraps_nested_last_webhook_payload() {
        let payload = json!({
            "lastWebhookPayload": {
                "entry": [{ "messaging": [{ "sender": { "id": "x" } }] }]
            }
        });
        assert!(extract_messages(&payload).is_some());
    }

    #[test]
    fn returns_none_for_unrecognized_shapes() {
        assert!(extract_messages(&json!({})).is_none());
        assert!(extract_messages(&json!({ "entry": [] })).is_none());
        assert!(extract_messages(&json!({ "entry": [{ "changes": [] }] })).is_none());
    }
}
