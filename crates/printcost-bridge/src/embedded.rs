//! # Embedded Calculator
//!
//! Embedded-view side of the bridge: waits for INIT, runs calculations
//! through a [`CalculationBackend`] and reports back with the issued token.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  wait_for_init()  ◄── INIT { offerIds, apiBase, sessionToken, .. }      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  calculate(inputs)                                                      │
//! │       │  for each offer: backend.calculate_offer(id, input)             │
//! │       │                                                                 │
//! │       ├── all ok  ──► CALC_RESULT { offerIds, total, breakdowns }       │
//! │       └── failure ──► CALC_ERROR  { kind, message, stageId }            │
//! │                       (never a zeroed or partial result)                │
//! │                                                                         │
//! │  save_config(..)  ──► backend.save_offer_config per offer               │
//! │                   ──► CALC_SAVE_CONFIG                                  │
//! │                                                                         │
//! │  Nothing is sent before INIT, nothing after a terminal message.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::future::Future;

use printcost_core::{
    CalculationFailure, CostBreakdown, CustomFieldValues, ErrorKind, Money, OfferCalculation,
    SaveOfferConfig,
};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::BridgeSettings;
use crate::error::{BridgeError, BridgeResult};
use crate::protocol::{
    CalcErrorPayload, CalcResultPayload, EmbeddedMessage, HostMessage, IblockIds, OfferPayload,
    SaveConfigPayload, SessionToken,
};
use crate::transport::FramePort;

// =============================================================================
// Backend Trait
// =============================================================================

/// Where the embedded view gets its numbers from.
///
/// Implemented by the calculation service; failures use the same
/// serialized shape the HTTP API returns.
pub trait CalculationBackend: Send + Sync {
    /// Calculates one offer using its saved config and the given format/run.
    fn calculate_offer(
        &self,
        offer_id: i64,
        input: &OfferCalculation,
    ) -> impl Future<Output = Result<CostBreakdown, CalculationFailure>> + Send;

    /// Persists the calculator config for one offer.
    fn save_offer_config(
        &self,
        offer_id: i64,
        config: &SaveOfferConfig,
    ) -> impl Future<Output = Result<(), CalculationFailure>> + Send;
}

/// Result of an operation that reports to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery<T> {
    /// The success message was sent.
    Delivered(T),
    /// A CALC_ERROR was sent instead.
    Failed(CalculationFailure),
}

// =============================================================================
// Embedded Session
// =============================================================================

/// State received with INIT.
#[derive(Debug, Clone)]
pub struct EmbeddedSession {
    pub token: SessionToken,
    pub offer_ids: Vec<i64>,
    pub api_base: Url,
    pub iblock_ids: IblockIds,
}

/// Embedded calculator bound to one host session.
pub struct EmbeddedCalculator<B> {
    port: FramePort,
    backend: B,
    settings: BridgeSettings,
    session: Option<EmbeddedSession>,
    finished: bool,
}

impl<B: CalculationBackend> EmbeddedCalculator<B> {
    pub fn new(port: FramePort, backend: B, settings: BridgeSettings) -> Self {
        EmbeddedCalculator {
            port,
            backend,
            settings,
            session: None,
            finished: false,
        }
    }

    pub fn session(&self) -> Option<&EmbeddedSession> {
        self.session.as_ref()
    }

    /// Offers currently in the session (empty before INIT).
    pub fn offer_ids(&self) -> &[i64] {
        self.session.as_ref().map(|s| s.offer_ids.as_slice()).unwrap_or(&[])
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    // =========================================================================
    // Inbound
    // =========================================================================

    /// Receives host frames until INIT arrives.
    pub async fn wait_for_init(&mut self) -> BridgeResult<&EmbeddedSession> {
        while self.session.is_none() {
            self.receive().await?;
        }
        self.session.as_ref().ok_or(BridgeError::NotInitialized)
    }

    /// Receives and applies one host frame.
    pub async fn receive(&mut self) -> BridgeResult<()> {
        let frame = self
            .port
            .recv()
            .await
            .ok_or_else(|| BridgeError::ChannelClosed("host went away".into()))?;
        self.handle_host_frame(&frame)
    }

    /// Applies one host frame.
    pub fn handle_host_frame(&mut self, frame: &str) -> BridgeResult<()> {
        match HostMessage::from_json(frame)? {
            HostMessage::Init(init) => {
                if self.session.is_some() {
                    return Err(BridgeError::UnexpectedMessage {
                        message_type: "INIT".into(),
                        state: "ready".into(),
                    });
                }
                init.validate(&self.settings)?;
                let api_base = self.settings.check_api_base(&init.api_base)?;

                info!(offers = ?init.offer_ids, api_base = %api_base, "Calculator initialized");
                self.session = Some(EmbeddedSession {
                    token: SessionToken::from(init.session_token),
                    offer_ids: init.offer_ids,
                    api_base,
                    iblock_ids: init.iblock_ids,
                });
            }
            HostMessage::OffersUpdated(update) => {
                let session = self.session.as_mut().ok_or(BridgeError::NotInitialized)?;
                debug!(offers = ?update.offer_ids, "Offer list updated by host");
                session.offer_ids = update.offer_ids;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Outbound
    // =========================================================================

    async fn send(&mut self, message: EmbeddedMessage) -> BridgeResult<()> {
        let session = self.session.as_ref().ok_or(BridgeError::NotInitialized)?;
        if self.finished {
            return Err(BridgeError::SessionClosed);
        }

        let message_type = message.message_type();
        let frame = message.into_envelope(&session.token)?.to_json()?;
        self.port.send(frame).await?;

        if message_type.is_terminal() {
            self.finished = true;
        }
        Ok(())
    }

    fn ensure_open(&self) -> BridgeResult<()> {
        if self.session.is_none() {
            return Err(BridgeError::NotInitialized);
        }
        if self.finished {
            return Err(BridgeError::SessionClosed);
        }
        Ok(())
    }

    /// Calculates every offer in the session and reports the outcome.
    ///
    /// `inputs` maps offer id to its format and run. The first failure is
    /// reported as CALC_ERROR and the session stays open.
    pub async fn calculate(
        &mut self,
        inputs: &BTreeMap<i64, OfferCalculation>,
    ) -> BridgeResult<Delivery<CalcResultPayload>> {
        self.ensure_open()?;
        let offer_ids = self.offer_ids().to_vec();

        match self.calculate_all(&offer_ids, inputs).await {
            Ok((total, breakdowns)) => {
                let result = CalcResultPayload {
                    offer_ids,
                    total,
                    breakdowns,
                };
                info!(offers = ?result.offer_ids, total = %result.total, "Reporting calculation result");
                self.send(EmbeddedMessage::Result(result.clone())).await?;
                Ok(Delivery::Delivered(result))
            }
            Err(failure) => {
                self.report_failure(&failure).await?;
                Ok(Delivery::Failed(failure))
            }
        }
    }

    async fn calculate_all(
        &self,
        offer_ids: &[i64],
        inputs: &BTreeMap<i64, OfferCalculation>,
    ) -> Result<(Money, Vec<CostBreakdown>), CalculationFailure> {
        if offer_ids.is_empty() {
            return Err(invalid_input("No offers left to calculate"));
        }

        let mut breakdowns = Vec::with_capacity(offer_ids.len());
        let mut total: Option<Money> = None;

        for offer_id in offer_ids {
            let input = inputs
                .get(offer_id)
                .ok_or_else(|| invalid_input(format!("No format or run given for offer {}", offer_id)))?;

            let breakdown = self.backend.calculate_offer(*offer_id, input).await?;

            total = Some(match total {
                None => breakdown.total.clone(),
                Some(sum) => sum.checked_add(&breakdown.total).map_err(|e| CalculationFailure {
                    kind: e.kind(),
                    stage_id: None,
                    variant_id: None,
                    message: format!("offer {}: {}", offer_id, e),
                })?,
            });
            breakdowns.push(breakdown);
        }

        let total = total.ok_or_else(|| invalid_input("No offers left to calculate"))?;
        Ok((total, breakdowns))
    }

    /// Saves the config for every offer, then reports CALC_SAVE_CONFIG.
    pub async fn save_config(
        &mut self,
        preset_id: &str,
        custom_fields: CustomFieldValues,
    ) -> BridgeResult<Delivery<SaveConfigPayload>> {
        self.ensure_open()?;

        let payload = SaveConfigPayload {
            offer_ids: self.offer_ids().to_vec(),
            preset_id: preset_id.to_string(),
            custom_fields,
        };
        let request = payload.to_save_request();

        for offer_id in &payload.offer_ids {
            if let Err(failure) = self.backend.save_offer_config(*offer_id, &request).await {
                self.report_failure(&failure).await?;
                return Ok(Delivery::Failed(failure));
            }
        }

        info!(offers = ?payload.offer_ids, preset_id = %payload.preset_id, "Reporting saved config");
        self.send(EmbeddedMessage::SaveConfig(payload.clone())).await?;
        Ok(Delivery::Delivered(payload))
    }

    /// Sends CALC_ERROR for a failure.
    pub async fn report_failure(&mut self, failure: &CalculationFailure) -> BridgeResult<()> {
        warn!(
            kind = %failure.kind,
            stage_id = ?failure.stage_id,
            message = %failure.message,
            "Reporting calculation failure"
        );
        self.send(EmbeddedMessage::Error(CalcErrorPayload::from(failure)))
            .await
    }

    /// Asks the host to drop an offer from the session.
    ///
    /// The local list changes only when OFFERS_UPDATED arrives.
    pub async fn remove_offer(&mut self, offer_id: i64) -> BridgeResult<()> {
        self.send(EmbeddedMessage::RemoveOffer(OfferPayload { offer_id }))
            .await
    }

    /// Asks the host to navigate to an offer.
    pub async fn open_offer(&mut self, offer_id: i64) -> BridgeResult<()> {
        self.send(EmbeddedMessage::OpenOffer(OfferPayload { offer_id }))
            .await
    }

    /// User closed the calculator without a result.
    pub async fn close(&mut self) -> BridgeResult<()> {
        self.send(EmbeddedMessage::Close).await
    }
}

fn invalid_input(message: impl Into<String>) -> CalculationFailure {
    CalculationFailure {
        kind: ErrorKind::InvalidInput,
        stage_id: None,
        variant_id: None,
        message: message.into(),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{BridgeHost, HostEventSink, HostOptions, NoOpSink, SessionState};
    use crate::protocol::{Envelope, InitPayload};
    use crate::transport::frame_pair;
    use printcost_core::{Currency, FieldValue};
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    fn rub(amount: Decimal) -> Money {
        Money::new(amount, Currency::new("RUB").unwrap())
    }

    fn breakdown(total: Decimal) -> CostBreakdown {
        CostBreakdown {
            preset_id: "flyer".into(),
            items: Vec::new(),
            currency: Currency::new("RUB").unwrap(),
            subtotal: rub(total),
            total: rub(total),
        }
    }

    #[derive(Default)]
    struct FixedBackend {
        results: HashMap<i64, Result<CostBreakdown, CalculationFailure>>,
        saved: Mutex<Vec<(i64, SaveOfferConfig)>>,
    }

    impl CalculationBackend for FixedBackend {
        async fn calculate_offer(
            &self,
            offer_id: i64,
            _input: &OfferCalculation,
        ) -> Result<CostBreakdown, CalculationFailure> {
            self.results
                .get(&offer_id)
                .cloned()
                .unwrap_or_else(|| Err(invalid_input("unknown offer")))
        }

        async fn save_offer_config(
            &self,
            offer_id: i64,
            config: &SaveOfferConfig,
        ) -> Result<(), CalculationFailure> {
            self.saved.lock().unwrap().push((offer_id, config.clone()));
            Ok(())
        }
    }

    fn inputs(offer_ids: &[i64]) -> BTreeMap<i64, OfferCalculation> {
        offer_ids
            .iter()
            .map(|id| {
                (
                    *id,
                    OfferCalculation {
                        format_code: "210x297".into(),
                        volume: 500,
                        custom_fields: CustomFieldValues::new(),
                        target_currency: None,
                    },
                )
            })
            .collect()
    }

    fn options() -> HostOptions {
        HostOptions {
            offer_ids: vec![42, 43],
            api_base: "https://shop.example/api".into(),
            iblock_ids: IblockIds {
                materials: 1,
                operations: 2,
                equipment: 3,
                details: 4,
                calculators: 5,
                configurations: 6,
            },
        }
    }

    #[derive(Default)]
    struct Results(Mutex<Vec<CalcResultPayload>>, Mutex<Vec<CalcErrorPayload>>);

    impl HostEventSink for Results {
        fn on_result(&self, result: &CalcResultPayload) {
            self.0.lock().unwrap().push(result.clone());
        }
        fn on_config_saved(&self, _config: &SaveConfigPayload) {}
        fn on_error(&self, error: &CalcErrorPayload) {
            self.1.lock().unwrap().push(error.clone());
        }
        fn on_offers_changed(&self, _offer_ids: &[i64]) {}
        fn on_open_offer(&self, _offer_id: i64) {}
        fn on_session_end(&self, _state: SessionState) {}
    }

    #[tokio::test]
    async fn test_refuses_to_send_before_init() {
        let (_host, port) = frame_pair(4);
        let mut calculator =
            EmbeddedCalculator::new(port, FixedBackend::default(), BridgeSettings::default());

        assert!(matches!(calculator.close().await, Err(BridgeError::NotInitialized)));
        assert!(matches!(
            calculator.calculate(&inputs(&[42])).await,
            Err(BridgeError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_result_flows_to_host_and_closes() {
        let settings = BridgeSettings::default();
        let (host_port, port) = frame_pair(settings.channel_capacity);
        let sink = Arc::new(Results::default());
        let host = BridgeHost::spawn(options(), &settings, host_port, sink.clone())
            .await
            .unwrap();

        let backend = FixedBackend {
            results: HashMap::from([
                (42, Ok(breakdown(Decimal::new(623700, 2)))),
                (43, Ok(breakdown(Decimal::new(125000, 2)))),
            ]),
            ..Default::default()
        };
        let mut calculator = EmbeddedCalculator::new(port, backend, settings);
        calculator.wait_for_init().await.unwrap();

        let delivery = calculator.calculate(&inputs(&[42, 43])).await.unwrap();
        let Delivery::Delivered(result) = delivery else {
            panic!("expected a delivered result");
        };
        assert_eq!(result.total.amount(), Decimal::new(748700, 2));
        assert_eq!(result.breakdowns.len(), 2);

        assert_eq!(host.finished().await.unwrap(), SessionState::Closed);
        assert_eq!(sink.0.lock().unwrap().len(), 1);
        assert!(calculator.is_finished());
        assert!(matches!(calculator.close().await, Err(BridgeError::SessionClosed)));
    }

    #[tokio::test]
    async fn test_failure_reported_as_calc_error_and_session_stays_open() {
        let settings = BridgeSettings::default();
        let (host_port, port) = frame_pair(settings.channel_capacity);
        let sink = Arc::new(Results::default());
        let host = BridgeHost::spawn(options(), &settings, host_port, sink.clone())
            .await
            .unwrap();

        let failure = CalculationFailure {
            kind: ErrorKind::AmbiguousMatch,
            stage_id: Some("print".into()),
            variant_id: None,
            message: "Ambiguous match between variants [\"print-0\", \"print-1\"]".into(),
        };
        let backend = FixedBackend {
            results: HashMap::from([
                (42, Ok(breakdown(Decimal::from(100)))),
                (43, Err(failure.clone())),
            ]),
            ..Default::default()
        };
        let mut calculator = EmbeddedCalculator::new(port, backend, settings);
        calculator.wait_for_init().await.unwrap();

        let delivery = calculator.calculate(&inputs(&[42, 43])).await.unwrap();
        assert_eq!(delivery, Delivery::Failed(failure));
        assert!(!calculator.is_finished());

        calculator.close().await.unwrap();
        assert_eq!(host.finished().await.unwrap(), SessionState::Closed);

        assert!(sink.0.lock().unwrap().is_empty());
        let errors = sink.1.lock().unwrap().clone();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::AmbiguousMatch);
        assert_eq!(errors[0].stage_id.as_deref(), Some("print"));
    }

    #[tokio::test]
    async fn test_missing_input_reported_not_zeroed() {
        let settings = BridgeSettings::default();
        let (host_port, port) = frame_pair(settings.channel_capacity);
        let _host = BridgeHost::spawn(options(), &settings, host_port, Arc::new(NoOpSink))
            .await
            .unwrap();

        let mut calculator = EmbeddedCalculator::new(port, FixedBackend::default(), settings);
        calculator.wait_for_init().await.unwrap();

        let delivery = calculator.calculate(&inputs(&[42])).await.unwrap();
        match delivery {
            Delivery::Failed(failure) => assert_eq!(failure.kind, ErrorKind::InvalidInput),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_remove_offer_updates_after_host_echo() {
        let settings = BridgeSettings::default();
        let (host_port, port) = frame_pair(settings.channel_capacity);
        let _host = BridgeHost::spawn(options(), &settings, host_port, Arc::new(NoOpSink))
            .await
            .unwrap();

        let mut calculator = EmbeddedCalculator::new(port, FixedBackend::default(), settings);
        calculator.wait_for_init().await.unwrap();
        assert_eq!(calculator.offer_ids(), &[42, 43]);

        calculator.remove_offer(42).await.unwrap();
        assert_eq!(calculator.offer_ids(), &[42, 43]);

        calculator.receive().await.unwrap();
        assert_eq!(calculator.offer_ids(), &[43]);
    }

    #[tokio::test]
    async fn test_save_config_persists_each_offer_then_reports() {
        let settings = BridgeSettings::default();
        let (host_port, port) = frame_pair(settings.channel_capacity);
        let host = BridgeHost::spawn(options(), &settings, host_port, Arc::new(NoOpSink))
            .await
            .unwrap();

        let mut calculator = EmbeddedCalculator::new(port, FixedBackend::default(), settings);
        calculator.wait_for_init().await.unwrap();

        let fields = CustomFieldValues::from([("lamination".to_string(), FieldValue::Bool(true))]);
        let delivery = calculator.save_config("flyer", fields).await.unwrap();
        assert!(matches!(delivery, Delivery::Delivered(_)));

        let saved = calculator.backend.saved.lock().unwrap().clone();
        assert_eq!(saved.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec![42, 43]);
        assert_eq!(host.finished().await.unwrap(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_outbound_frames_carry_issued_token() {
        let (mut host, port) = frame_pair(4);
        let mut calculator =
            EmbeddedCalculator::new(port, FixedBackend::default(), BridgeSettings::default());

        let init = HostMessage::Init(InitPayload {
            offer_ids: vec![42],
            api_base: "https://shop.example/api".into(),
            session_token: "issued-token".into(),
            iblock_ids: options().iblock_ids,
        });
        calculator.handle_host_frame(&init.to_json().unwrap()).unwrap();

        calculator.open_offer(42).await.unwrap();
        let envelope = Envelope::from_json(&host.recv().await.unwrap()).unwrap();
        assert_eq!(envelope.session_token.as_deref(), Some("issued-token"));
        assert_eq!(envelope.message_type, "CALC_OPEN_OFFER");
    }

    #[tokio::test]
    async fn test_init_with_bad_api_base_rejected() {
        let (_host, port) = frame_pair(4);
        let mut calculator =
            EmbeddedCalculator::new(port, FixedBackend::default(), BridgeSettings::default());

        let init = HostMessage::Init(InitPayload {
            offer_ids: vec![42],
            api_base: "javascript:alert(1)".into(),
            session_token: "t".into(),
            iblock_ids: options().iblock_ids,
        });
        assert!(calculator.handle_host_frame(&init.to_json().unwrap()).is_err());
        assert!(calculator.session().is_none());
    }
}
