//! Emulated scanner session for running without hardware

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::RwLock;
use sick_core::ParameterRegistry;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{
    AcquisitionStop, CommandSender, DeviceSession, InitOutcome, SessionConfig, SessionError,
    SopasRequest, StepOutcome, NEW_IP_ADDRESS,
};
use crate::dialect::Dialect;
use crate::profile::SharedParser;
use crate::sopas;

/// Time between two synthetic scans
pub const EMULATED_SCAN_INTERVAL: Duration = Duration::from_millis(40);

/// Session that produces synthetic scan telegrams
pub struct EmulatedSession {
    dialect: Dialect,
    parser: SharedParser,
    stop: AcquisitionStop,
    commands: CommandSender,
    requests: mpsc::Receiver<SopasRequest>,
    /// Canned replies (command -> reply), checked before the generic rule
    responses: RwLock<HashMap<String, String>>,
    scan_interval: Duration,
    streaming: bool,
    counter: u32,
}

impl EmulatedSession {
    pub fn new(config: &SessionConfig, parser: SharedParser) -> Self {
        let (commands, requests) = CommandSender::channel();
        Self {
            dialect: config.dialect,
            parser,
            stop: AcquisitionStop::new(),
            commands,
            requests,
            responses: RwLock::new(Self::default_responses()),
            scan_interval: EMULATED_SCAN_INTERVAL,
            streaming: false,
            counter: 0,
        }
    }

    /// Override the scan interval
    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    /// Add a canned reply for a command
    pub fn add_response(&self, command: impl Into<String>, reply: impl Into<String>) {
        self.responses.write().insert(command.into(), reply.into());
    }

    fn default_responses() -> HashMap<String, String> {
        let mut responses = HashMap::new();
        responses.insert(
            sopas::DEVICE_IDENT.to_string(),
            "sRA DeviceIdent 10 Emulated V1.0".to_string(),
        );
        responses.insert(
            "sRN SCdevicestate".to_string(),
            "sRA SCdevicestate 1".to_string(),
        );
        responses
    }

    fn reply_for(&self, command: &str) -> Result<Bytes, SessionError> {
        if let Some(reply) = self.responses.read().get(command) {
            return Ok(Bytes::from(reply.clone()));
        }
        sopas::positive_reply(command)
            .map(Bytes::from)
            .ok_or_else(|| SessionError::DeviceRejected {
                command: command.to_string(),
                reply: "sFA 1".to_string(),
            })
    }

    /// Scan telegram: command text followed by a counter
    fn synthesize_scan(&mut self) -> Bytes {
        self.counter = self.counter.wrapping_add(1);
        let mut buf = BytesMut::with_capacity(32);
        buf.put_slice(b"sSN LMDscandata ");
        buf.put_u32(self.counter);
        buf.freeze()
    }

    fn answer(&mut self, request: SopasRequest) {
        let result = self.reply_for(&request.command);
        debug!(command = %request.command, ok = result.is_ok(), "Emulated reply");
        match request.command.as_str() {
            sopas::START_SCAN_DATA => self.streaming = true,
            sopas::STOP_SCAN_DATA => self.streaming = false,
            _ => {}
        }
        let _ = request.reply.send(result);
    }
}

#[async_trait]
impl DeviceSession for EmulatedSession {
    async fn initialize(&mut self, registry: &ParameterRegistry) -> InitOutcome {
        info!(dialect = %self.dialect, "Emulating scanner");
        if let Some(ip) = registry.get_string(NEW_IP_ADDRESS).filter(|ip| !ip.is_empty()) {
            info!(%ip, "Emulated IP address change");
            return InitOutcome::Ready;
        }
        self.streaming = true;
        InitOutcome::Ready
    }

    async fn run_step(&mut self) -> StepOutcome {
        if self.stop.is_requested() {
            self.streaming = false;
            return StepOutcome::Continue;
        }

        let stop = self.stop.clone();
        tokio::select! {
            _ = stop.stopped() => {
                self.streaming = false;
            }
            Some(request) = self.requests.recv() => self.answer(request),
            _ = tokio::time::sleep(self.scan_interval), if self.streaming => {
                let telegram = self.synthesize_scan();
                self.parser.lock().parse_telegram(&telegram);
            }
        }
        StepOutcome::Continue
    }

    fn acquisition_stop(&self) -> AcquisitionStop {
        self.stop.clone()
    }

    fn commands(&self) -> CommandSender {
        self.commands.clone()
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn close(&mut self) {
        self.streaming = false;
        info!("Emulated scanner session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ScanParser;

    fn emulated() -> (EmulatedSession, SharedParser) {
        let parser = ScanParser::new("sick_lms_5xx").unwrap().into_shared();
        let config = SessionConfig {
            host: None,
            port: 2112,
            timeout: Duration::from_secs(1),
            dialect: Dialect::Ascii,
            emulate: true,
        };
        let session = EmulatedSession::new(&config, parser.clone())
            .with_scan_interval(Duration::from_millis(1));
        (session, parser)
    }

    #[tokio::test]
    async fn test_emulated_produces_scans() {
        let (mut session, parser) = emulated();
        assert_eq!(
            session.initialize(&ParameterRegistry::new()).await,
            InitOutcome::Ready
        );
        for _ in 0..3 {
            assert_eq!(session.run_step().await, StepOutcome::Continue);
        }
        assert_eq!(parser.lock().scans(), 3);
    }

    #[tokio::test]
    async fn test_emulated_replies() {
        let (mut session, _) = emulated();
        session.add_response("sRN LocationName", "sRA LocationName 4 lab1");
        session.initialize(&ParameterRegistry::new()).await;

        let sender = session.commands();
        let pending = tokio::spawn(async move {
            let a = sender
                .request("sRN LocationName", Duration::from_secs(1))
                .await;
            let b = sender.request("bogus", Duration::from_secs(1)).await;
            let c = sender
                .request(sopas::STOP_SCAN_DATA, Duration::from_secs(1))
                .await;
            (a, b, c)
        });
        // Once streaming stops, a step only returns on a request
        while !pending.is_finished() {
            let _ = tokio::time::timeout(Duration::from_millis(20), session.run_step()).await;
        }

        let (a, b, c) = pending.await.unwrap();
        assert_eq!(&a.unwrap()[..], b"sRA LocationName 4 lab1");
        assert!(matches!(b, Err(SessionError::DeviceRejected { .. })));
        assert_eq!(&c.unwrap()[..], b"sEA LMDscandata 0");
        assert!(!session.streaming);
    }

    #[tokio::test]
    async fn test_stop_request_halts_streaming() {
        let (mut session, parser) = emulated();
        session.initialize(&ParameterRegistry::new()).await;
        session.acquisition_stop().stop();
        assert_eq!(session.run_step().await, StepOutcome::Continue);
        assert!(!session.streaming);
        assert_eq!(parser.lock().scans(), 0);
    }
}
