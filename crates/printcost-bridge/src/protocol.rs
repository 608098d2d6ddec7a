//! # Bridge Protocol Messages
//!
//! Message types exchanged between the host admin view and the embedded
//! calculator view.
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Bridge Protocol Messages                           │
//! │                                                                         │
//! │  INITIALIZATION                                                         │
//! │  ──────────────                                                         │
//! │  HOST     ───► INIT { offerIds, apiBase, sessionToken, iblockIds }      │
//! │                                                                         │
//! │  WHILE READY (embedded → host, token required)                          │
//! │  ─────────────────────────────────────────────                          │
//! │  EMBEDDED ───► CALC_REMOVE_OFFER { offerId }                            │
//! │  HOST     ───► OFFERS_UPDATED { offerIds }                              │
//! │  EMBEDDED ───► CALC_OPEN_OFFER { offerId }      (host navigates)        │
//! │  EMBEDDED ───► CALC_ERROR { kind, message, stageId }                    │
//! │                                                                         │
//! │  COMPLETION (embedded → host, session closes)                           │
//! │  ────────────────────────────────────────────                           │
//! │  EMBEDDED ───► CALC_RESULT { offerIds, total, breakdowns }              │
//! │  EMBEDDED ───► CALC_SAVE_CONFIG { offerIds, presetId, customFields }    │
//! │  EMBEDDED ───► CALC_CLOSE {}                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! Embedded → host frames are envelopes carrying the issued token:
//! ```json
//! { "type": "CALC_RESULT", "payload": { ... }, "sessionToken": "..." }
//! ```
//! Host → embedded frames use serde's adjacently tagged enum:
//! ```json
//! { "type": "INIT", "payload": { "offerIds": [42], ... } }
//! ```

use std::fmt;
use std::str::FromStr;

use printcost_core::{
    CalculationFailure, CostBreakdown, CustomFieldValues, ErrorKind, Money, SaveOfferConfig,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::BridgeSettings;
use crate::error::{BridgeError, BridgeResult};

// =============================================================================
// Session Token
// =============================================================================

/// Random token issued per embedding instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generates a fresh token (UUID v4).
    pub fn generate() -> Self {
        SessionToken(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a token presented on a message is this one.
    pub fn matches(&self, presented: Option<&str>) -> bool {
        presented == Some(self.0.as_str())
    }
}

impl From<String> for SessionToken {
    fn from(value: String) -> Self {
        SessionToken(value)
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Message Types
// =============================================================================

/// Type tag of an embedded → host message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    CalcResult,
    CalcSaveConfig,
    CalcError,
    CalcRemoveOffer,
    CalcOpenOffer,
    CalcClose,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::CalcResult => "CALC_RESULT",
            MessageType::CalcSaveConfig => "CALC_SAVE_CONFIG",
            MessageType::CalcError => "CALC_ERROR",
            MessageType::CalcRemoveOffer => "CALC_REMOVE_OFFER",
            MessageType::CalcOpenOffer => "CALC_OPEN_OFFER",
            MessageType::CalcClose => "CALC_CLOSE",
        }
    }

    /// Whether this message ends the session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MessageType::CalcResult | MessageType::CalcSaveConfig | MessageType::CalcClose
        )
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CALC_RESULT" => Ok(MessageType::CalcResult),
            "CALC_SAVE_CONFIG" => Ok(MessageType::CalcSaveConfig),
            "CALC_ERROR" => Ok(MessageType::CalcError),
            "CALC_REMOVE_OFFER" => Ok(MessageType::CalcRemoveOffer),
            "CALC_OPEN_OFFER" => Ok(MessageType::CalcOpenOffer),
            "CALC_CLOSE" => Ok(MessageType::CalcClose),
            other => Err(BridgeError::MalformedFrame(format!(
                "unknown message type '{}'",
                other
            ))),
        }
    }
}

// =============================================================================
// Host → Embedded
// =============================================================================

/// Catalog block identifiers on the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IblockIds {
    pub materials: i64,
    pub operations: i64,
    pub equipment: i64,
    pub details: i64,
    pub calculators: i64,
    pub configurations: i64,
}

/// Initialization issued by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitPayload {
    pub offer_ids: Vec<i64>,
    pub api_base: String,
    pub session_token: String,
    pub iblock_ids: IblockIds,
}

impl InitPayload {
    /// Checks offer ids, token and `apiBase`.
    pub fn validate(&self, settings: &BridgeSettings) -> BridgeResult<()> {
        validate_offer_ids(&self.offer_ids)?;

        if self.session_token.trim().is_empty() {
            return Err(BridgeError::InvalidInit("sessionToken is empty".into()));
        }

        settings.check_api_base(&self.api_base)?;
        Ok(())
    }
}

fn validate_offer_ids(offer_ids: &[i64]) -> BridgeResult<()> {
    if offer_ids.is_empty() {
        return Err(BridgeError::InvalidInit("offerIds is empty".into()));
    }
    if let Some(bad) = offer_ids.iter().find(|id| **id <= 0) {
        return Err(BridgeError::InvalidInit(format!("offer id {} is not positive", bad)));
    }
    Ok(())
}

/// Offer list after the host applied a removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffersUpdatedPayload {
    pub offer_ids: Vec<i64>,
}

/// All host → embedded messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostMessage {
    Init(InitPayload),
    OffersUpdated(OffersUpdatedPayload),
}

impl HostMessage {
    pub fn to_json(&self) -> BridgeResult<String> {
        serde_json::to_string(self).map_err(|e| BridgeError::SerializationFailed(e.to_string()))
    }

    pub fn from_json(frame: &str) -> BridgeResult<Self> {
        serde_json::from_str(frame).map_err(|e| BridgeError::MalformedFrame(e.to_string()))
    }
}

// =============================================================================
// Embedded → Host Payloads
// =============================================================================

/// Computed total for the offers covered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalcResultPayload {
    pub offer_ids: Vec<i64>,
    pub total: Money,
    #[serde(default)]
    pub breakdowns: Vec<CostBreakdown>,
}

/// Configuration the embedded view has persisted for the offers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveConfigPayload {
    pub offer_ids: Vec<i64>,
    pub preset_id: String,
    #[serde(default)]
    pub custom_fields: CustomFieldValues,
}

impl SaveConfigPayload {
    /// The per-offer save request this payload stands for.
    pub fn to_save_request(&self) -> SaveOfferConfig {
        SaveOfferConfig {
            preset_id: self.preset_id.clone(),
            custom_fields: self.custom_fields.clone(),
        }
    }
}

/// Calculation failure surfaced to the host UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalcErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default)]
    pub stage_id: Option<String>,
}

impl From<&CalculationFailure> for CalcErrorPayload {
    fn from(failure: &CalculationFailure) -> Self {
        CalcErrorPayload {
            kind: failure.kind,
            message: failure.message.clone(),
            stage_id: failure.stage_id.clone(),
        }
    }
}

/// Offer targeted by a remove or open request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferPayload {
    pub offer_id: i64,
}

/// Typed embedded → host message.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddedMessage {
    Result(CalcResultPayload),
    SaveConfig(SaveConfigPayload),
    Error(CalcErrorPayload),
    RemoveOffer(OfferPayload),
    OpenOffer(OfferPayload),
    Close,
}

impl EmbeddedMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            EmbeddedMessage::Result(_) => MessageType::CalcResult,
            EmbeddedMessage::SaveConfig(_) => MessageType::CalcSaveConfig,
            EmbeddedMessage::Error(_) => MessageType::CalcError,
            EmbeddedMessage::RemoveOffer(_) => MessageType::CalcRemoveOffer,
            EmbeddedMessage::OpenOffer(_) => MessageType::CalcOpenOffer,
            EmbeddedMessage::Close => MessageType::CalcClose,
        }
    }

    /// Wraps the message in an envelope carrying `token`.
    pub fn into_envelope(self, token: &SessionToken) -> BridgeResult<Envelope> {
        let message_type = self.message_type();
        let payload = match self {
            EmbeddedMessage::Result(p) => to_payload(&p)?,
            EmbeddedMessage::SaveConfig(p) => to_payload(&p)?,
            EmbeddedMessage::Error(p) => to_payload(&p)?,
            EmbeddedMessage::RemoveOffer(p) | EmbeddedMessage::OpenOffer(p) => to_payload(&p)?,
            EmbeddedMessage::Close => Value::Object(serde_json::Map::new()),
        };

        Ok(Envelope {
            message_type: message_type.as_str().to_string(),
            payload,
            session_token: Some(token.as_str().to_string()),
        })
    }
}

fn to_payload<T: Serialize>(payload: &T) -> BridgeResult<Value> {
    serde_json::to_value(payload).map_err(|e| BridgeError::SerializationFailed(e.to_string()))
}

fn from_payload<T: DeserializeOwned>(message_type: MessageType, payload: Value) -> BridgeResult<T> {
    serde_json::from_value(payload)
        .map_err(|e| BridgeError::MalformedFrame(format!("{} payload: {}", message_type, e)))
}

// =============================================================================
// Envelope
// =============================================================================

/// Embedded → host wire frame.
///
/// The type stays a string here so frames of unknown type still parse far
/// enough to be logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub session_token: Option<String>,
}

impl Envelope {
    pub fn to_json(&self) -> BridgeResult<String> {
        serde_json::to_string(self).map_err(|e| BridgeError::SerializationFailed(e.to_string()))
    }

    pub fn from_json(frame: &str) -> BridgeResult<Self> {
        serde_json::from_str(frame).map_err(|e| BridgeError::MalformedFrame(e.to_string()))
    }

    /// Decodes the typed message. Does not look at the token.
    pub fn decode(self) -> BridgeResult<EmbeddedMessage> {
        let message_type: MessageType = self.message_type.parse()?;
        let payload = self.payload;

        Ok(match message_type {
            MessageType::CalcResult => EmbeddedMessage::Result(from_payload(message_type, payload)?),
            MessageType::CalcSaveConfig => {
                EmbeddedMessage::SaveConfig(from_payload(message_type, payload)?)
            }
            MessageType::CalcError => EmbeddedMessage::Error(from_payload(message_type, payload)?),
            MessageType::CalcRemoveOffer => {
                EmbeddedMessage::RemoveOffer(from_payload(message_type, payload)?)
            }
            MessageType::CalcOpenOffer => {
                EmbeddedMessage::OpenOffer(from_payload(message_type, payload)?)
            }
            MessageType::CalcClose => EmbeddedMessage::Close,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use printcost_core::Currency;
    use rust_decimal::Decimal;

    fn iblocks() -> IblockIds {
        IblockIds {
            materials: 11,
            operations: 12,
            equipment: 13,
            details: 14,
            calculators: 15,
            configurations: 16,
        }
    }

    #[test]
    fn test_init_wire_shape() {
        let init = HostMessage::Init(InitPayload {
            offer_ids: vec![42, 43],
            api_base: "https://shop.example/api".into(),
            session_token: "t-1".into(),
            iblock_ids: iblocks(),
        });
        let value: Value = serde_json::from_str(&init.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "INIT");
        assert_eq!(value["payload"]["offerIds"][1], 43);
        assert_eq!(value["payload"]["sessionToken"], "t-1");
        assert_eq!(value["payload"]["iblockIds"]["configurations"], 16);
    }

    #[test]
    fn test_offers_updated_tag() {
        let json = HostMessage::OffersUpdated(OffersUpdatedPayload { offer_ids: vec![1] })
            .to_json()
            .unwrap();
        assert!(json.contains("\"OFFERS_UPDATED\""));
    }

    #[test]
    fn test_init_validation() {
        let settings = BridgeSettings::default();
        let mut init = InitPayload {
            offer_ids: vec![42],
            api_base: "https://shop.example/api".into(),
            session_token: "t-1".into(),
            iblock_ids: iblocks(),
        };
        assert!(init.validate(&settings).is_ok());

        init.offer_ids = vec![];
        assert!(matches!(init.validate(&settings), Err(BridgeError::InvalidInit(_))));

        init.offer_ids = vec![42];
        init.api_base = "api/v1".into();
        assert!(matches!(init.validate(&settings), Err(BridgeError::InvalidUrl(_))));
    }

    #[test]
    fn test_envelope_carries_token_and_type() {
        let token = SessionToken::from("abc".to_string());
        let envelope = EmbeddedMessage::OpenOffer(OfferPayload { offer_id: 7 })
            .into_envelope(&token)
            .unwrap();
        let value: Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "CALC_OPEN_OFFER");
        assert_eq!(value["sessionToken"], "abc");
        assert_eq!(value["payload"]["offerId"], 7);
    }

    #[test]
    fn test_decode_result() {
        let frame = r#"{"type":"CALC_RESULT","sessionToken":"abc",
            "payload":{"offerIds":[42],"total":{"amount":"6237.00","currency":"RUB"}}}"#;
        let message = Envelope::from_json(frame).unwrap().decode().unwrap();
        match message {
            EmbeddedMessage::Result(result) => {
                assert_eq!(result.offer_ids, vec![42]);
                assert_eq!(result.total.amount(), Decimal::new(623700, 2));
                assert_eq!(result.total.currency(), &Currency::new("RUB").unwrap());
                assert!(result.breakdowns.is_empty());
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_decode_close_without_payload() {
        let message = Envelope::from_json(r#"{"type":"CALC_CLOSE","sessionToken":"abc"}"#)
            .unwrap()
            .decode()
            .unwrap();
        assert_eq!(message, EmbeddedMessage::Close);
    }

    #[test]
    fn test_decode_rejects_unknown_type_and_bad_payload() {
        let unknown = Envelope::from_json(r#"{"type":"CALC_EXPLODE","payload":{}}"#).unwrap();
        assert!(matches!(unknown.decode(), Err(BridgeError::MalformedFrame(_))));

        let bad = Envelope::from_json(r#"{"type":"CALC_REMOVE_OFFER","payload":{"offer":1}}"#)
            .unwrap();
        assert!(matches!(bad.decode(), Err(BridgeError::MalformedFrame(_))));
    }

    #[test]
    fn test_error_payload_from_failure() {
        let failure = CalculationFailure {
            kind: ErrorKind::AmbiguousMatch,
            stage_id: Some("print".into()),
            variant_id: None,
            message: "Ambiguous".into(),
        };
        let payload = CalcErrorPayload::from(&failure);
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["kind"], "AMBIGUOUS_MATCH");
        assert_eq!(value["stageId"], "print");
    }

    #[test]
    fn test_token_matching() {
        let token = SessionToken::generate();
        assert!(token.matches(Some(token.as_str())));
        assert!(!token.matches(None));
        assert!(!token.matches(Some("other")));
        assert_ne!(SessionToken::generate(), token);
    }
}
