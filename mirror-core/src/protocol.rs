//! Streaming protocol messages exchanged with the Manifold websocket
//!
//! Outgoing requests carry a transaction id (`txid`) allocated per
//! connection; the server acknowledges them best-effort. Broadcasts arrive
//! untagged by txid.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The single topic the mirror subscribes to
pub const UPDATED_CONTRACT_TOPIC: &str = "global/updated-contract";

/// Inbound frame type carrying topic events
pub const BROADCAST_TYPE: &str = "broadcast";

/// Inbound frame type acknowledging a request
pub const ACK_TYPE: &str = "ack";

// ============================================================================
// Client -> Server Messages
// ============================================================================

/// Messages sent from the mirror to the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to broadcast topics
    Subscribe { txid: u64, topics: Vec<String> },
    /// Keepalive
    Ping { txid: u64 },
}

impl ClientMessage {
    /// Subscribe request for [`UPDATED_CONTRACT_TOPIC`]
    pub fn subscribe_updated_contracts(txid: u64) -> Self {
        ClientMessage::Subscribe {
            txid,
            topics: vec![UPDATED_CONTRACT_TOPIC.to_string()],
        }
    }

    pub fn ping(txid: u64) -> Self {
        ClientMessage::Ping { txid }
    }
}

// ============================================================================
// Server -> Client Messages
// ============================================================================

/// Loosely typed inbound frame
///
/// Every field is optional so that any JSON object decodes; classification
/// happens after decoding.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "type")]
    pub msg_type: Option<String>,
    pub topic: Option<String>,
    pub txid: Option<u64>,
    pub success: Option<bool>,
    pub data: Option<Value>,
}

impl InboundFrame {
    pub fn is_broadcast(&self) -> bool {
        self.msg_type.as_deref() == Some(BROADCAST_TYPE)
    }

    pub fn is_ack(&self) -> bool {
        self.msg_type.as_deref() == Some(ACK_TYPE)
    }
}

/// Payload of a `global/updated-contract` broadcast
///
/// Absent fields mean "unchanged".
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ContractUpdate {
    pub id: Option<String>,
    pub question: Option<String>,
    pub probability: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_wire_format() {
        let json = serde_json::to_value(ClientMessage::subscribe_updated_contracts(7)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "subscribe",
                "txid": 7,
                "topics": ["global/updated-contract"]
            })
        );
    }

    #[test]
    fn test_ping_wire_format() {
        let json = serde_json::to_value(ClientMessage::ping(3)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "ping", "txid": 3}));
    }

    #[test]
    fn test_inbound_broadcast() {
        let text = r#"{"type":"broadcast","topic":"global/updated-contract","data":{"id":"abc","probability":0.7}}"#;
        let frame: InboundFrame = serde_json::from_str(text).unwrap();
        assert!(frame.is_broadcast());
        assert_eq!(frame.topic.as_deref(), Some(UPDATED_CONTRACT_TOPIC));

        let update: ContractUpdate = serde_json::from_value(frame.data.unwrap()).unwrap();
        assert_eq!(update.id.as_deref(), Some("abc"));
        assert_eq!(update.question, None);
        assert_eq!(update.probability, Some(0.7));
    }

    #[test]
    fn test_inbound_without_type_still_decodes() {
        let frame: InboundFrame = serde_json::from_str(r#"{"hello":"world"}"#).unwrap();
        assert!(!frame.is_broadcast());
        assert!(!frame.is_ack());
    }
}
