//! TCP scanner session
//!
//! Speaks CoLa-A or CoLa-B over a single TCP connection. Every blocking
//! operation is bounded by the session timeout (`timelimit`).

use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use sick_core::ParameterRegistry;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{
    AcquisitionStop, CommandSender, DeviceSession, InitOutcome, SessionConfig, SessionError,
    SopasRequest, StepOutcome, NEW_IP_ADDRESS,
};
use crate::cola::{self, FrameDecoder};
use crate::dialect::Dialect;
use crate::profile::{reply_text, SharedParser, Telegram};
use crate::sopas;

/// Connected stream plus its framing state
struct Link {
    stream: TcpStream,
    decoder: FrameDecoder,
    timeout: Duration,
}

impl Link {
    async fn write_command(&mut self, command: &str) -> Result<(), SessionError> {
        let frame = cola::encode(self.decoder.dialect(), command.as_bytes());
        debug!(command, frame = %hex::encode(&frame), "Sending telegram");
        self.stream
            .write_all(&frame)
            .await
            .map_err(|e| SessionError::SendFailed(e.to_string()))
    }

    /// Next framed payload; cancel safe
    async fn read_frame(&mut self) -> Result<Bytes, SessionError> {
        let mut chunk = [0u8; 4096];
        loop {
            match self.decoder.next_frame() {
                Ok(Some(frame)) => return Ok(frame),
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "Dropping corrupt telegram");
                    continue;
                }
            }

            let n = tokio::time::timeout(self.timeout, self.stream.read(&mut chunk))
                .await
                .map_err(|_| {
                    SessionError::Timeout(format!("no data within {} ms", self.timeout.as_millis()))
                })?
                .map_err(|e| SessionError::ReceiveFailed(e.to_string()))?;
            if n == 0 {
                return Err(SessionError::ConnectionClosed);
            }
            self.decoder.push(&chunk[..n]);
        }
    }
}

/// Session talking to a real scanner over TCP
pub struct TcpSession {
    host: String,
    port: u16,
    timeout: Duration,
    dialect: Dialect,
    parser: SharedParser,
    link: Option<Link>,
    stop: AcquisitionStop,
    commands: CommandSender,
    requests: mpsc::Receiver<SopasRequest>,
    streaming: bool,
}

impl TcpSession {
    pub fn new(host: &str, config: &SessionConfig, parser: SharedParser) -> Self {
        let (commands, requests) = CommandSender::channel();
        Self {
            host: host.to_string(),
            port: config.port,
            timeout: config.timeout,
            dialect: config.dialect,
            parser,
            link: None,
            stop: AcquisitionStop::new(),
            commands,
            requests,
            streaming: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    async fn connect(&mut self) -> Result<(), SessionError> {
        let addr = format!("{}:{}", self.host, self.port);
        info!(%addr, dialect = %self.dialect, "Connecting to scanner");

        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| SessionError::Timeout(format!("connecting to {}", addr)))?
            .map_err(|e| SessionError::ConnectionFailed(format!("{}: {}", addr, e)))?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Cannot disable Nagle");
        }

        self.link = Some(Link {
            stream,
            decoder: FrameDecoder::new(self.dialect),
            timeout: self.timeout,
        });
        info!(%addr, "Connected to scanner");
        Ok(())
    }

    /// Send `command` and wait for its reply, feeding scan telegrams that
    /// arrive in between to the parser
    async fn transact(&mut self, command: &str) -> Result<Bytes, SessionError> {
        let link = self.link.as_mut().ok_or(SessionError::NotConnected)?;
        link.write_command(command).await?;

        loop {
            let frame = link.read_frame().await?;
            if sopas::is_scan_data(&frame) {
                self.parser.lock().parse_telegram(&frame);
                continue;
            }
            let reply = reply_text(&frame);
            debug!(command, %reply, "Received reply");
            if sopas::is_error_reply(&frame) {
                return Err(SessionError::DeviceRejected {
                    command: command.to_string(),
                    reply,
                });
            }
            return Ok(frame);
        }
    }

    async fn change_ip(&mut self, new_ip: &str) -> Result<(), SessionError> {
        let ip: Ipv4Addr = new_ip
            .trim()
            .parse()
            .map_err(|_| SessionError::InvalidConfig(format!("invalid new_IP_address '{}'", new_ip)))?;

        info!(%ip, "Changing scanner IP address");
        self.transact(sopas::SET_ACCESS_MODE).await?;
        self.transact(&sopas::set_ip_command(ip)).await?;
        self.transact(sopas::WRITE_ALL).await?;
        self.transact(sopas::RUN).await?;
        info!(%ip, "IP address written, restart the node with the new address");
        Ok(())
    }

    async fn stop_streaming(&mut self) {
        if !self.streaming {
            return;
        }
        self.streaming = false;
        match self.transact(sopas::STOP_SCAN_DATA).await {
            Ok(_) => info!("Scan data stopped"),
            Err(e) => warn!(error = %e, "Cannot stop scan data"),
        }
    }

    async fn answer(&mut self, request: SopasRequest) -> StepOutcome {
        let result = self.transact(&request.command).await;
        let _ = request.reply.send(result.clone());
        match result {
            Ok(_) | Err(SessionError::DeviceRejected { .. }) => StepOutcome::Continue,
            Err(e) => StepOutcome::Failed(e),
        }
    }
}

enum Event {
    Stop,
    Request(SopasRequest),
    Frame(Result<Bytes, SessionError>),
}

#[async_trait]
impl DeviceSession for TcpSession {
    async fn initialize(&mut self, registry: &ParameterRegistry) -> InitOutcome {
        self.streaming = false;
        if let Err(e) = self.connect().await {
            warn!(error = %e, "Scanner connection failed");
            return InitOutcome::Retry(e);
        }

        match self.transact(sopas::DEVICE_IDENT).await {
            Ok(reply) => info!(ident = %reply_text(&reply), "Scanner identified"),
            Err(e) => return InitOutcome::from_error(e),
        }

        let new_ip = registry.get_string(NEW_IP_ADDRESS).unwrap_or_default();
        if !new_ip.is_empty() {
            return match self.change_ip(&new_ip).await {
                Ok(()) => InitOutcome::Ready,
                Err(e) => InitOutcome::from_error(e),
            };
        }

        if let Err(e) = self.transact(sopas::START_SCAN_DATA).await {
            return InitOutcome::from_error(e);
        }
        self.streaming = true;
        info!(dialect = %self.dialect, "Scan data started");
        InitOutcome::Ready
    }

    async fn run_step(&mut self) -> StepOutcome {
        if self.stop.is_requested() {
            self.stop_streaming().await;
            return StepOutcome::Continue;
        }
        let Some(link) = self.link.as_mut() else {
            return StepOutcome::Failed(SessionError::NotConnected);
        };

        let stop = self.stop.clone();
        let event = tokio::select! {
            _ = stop.stopped() => Event::Stop,
            Some(request) = self.requests.recv() => Event::Request(request),
            frame = link.read_frame() => Event::Frame(frame),
        };

        match event {
            Event::Stop => {
                self.stop_streaming().await;
                StepOutcome::Continue
            }
            Event::Request(request) => self.answer(request).await,
            Event::Frame(Ok(frame)) => {
                if let Telegram::Reply(reply) = self.parser.lock().parse_telegram(&frame) {
                    debug!(%reply, "Unsolicited telegram");
                }
                StepOutcome::Continue
            }
            Event::Frame(Err(e)) => {
                warn!(error = %e, "Acquisition failed");
                StepOutcome::Failed(e)
            }
        }
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
        if self.link.is_none() {
            return;
        }
        self.stop_streaming().await;
        if let Some(mut link) = self.link.take() {
            let _ = link.stream.shutdown().await;
        }
        info!(host = %self.host, port = self.port, "Scanner session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ScanParser;
    use tokio::net::TcpListener;

    async fn read_payload(stream: &mut TcpStream, decoder: &mut FrameDecoder) -> Option<Bytes> {
        let mut chunk = [0u8; 1024];
        loop {
            if let Some(frame) = decoder.next_frame().unwrap() {
                return Some(frame);
            }
            let n = stream.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            decoder.push(&chunk[..n]);
        }
    }

    /// Answers every command positively and sends one scan telegram after
    /// scan data is enabled
    async fn serve_one(listener: TcpListener, dialect: Dialect) {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut decoder = FrameDecoder::new(dialect);
        while let Some(payload) = read_payload(&mut stream, &mut decoder).await {
            let command = String::from_utf8_lossy(&payload).to_string();
            let reply = sopas::positive_reply(&command).unwrap_or_else(|| "sFA 1".to_string());
            stream
                .write_all(&cola::encode(dialect, reply.as_bytes()))
                .await
                .unwrap();
            if command == sopas::START_SCAN_DATA {
                stream
                    .write_all(&cola::encode(dialect, b"sSN LMDscandata 1 0"))
                    .await
                    .unwrap();
            }
        }
    }

    fn session(port: u16, dialect: Dialect) -> (TcpSession, SharedParser) {
        let parser = ScanParser::new("sick_tim_5xx").unwrap().into_shared();
        let config = SessionConfig {
            host: Some("127.0.0.1".to_string()),
            port,
            timeout: Duration::from_secs(2),
            dialect,
            emulate: false,
        };
        (TcpSession::new("127.0.0.1", &config, parser.clone()), parser)
    }

    #[tokio::test]
    async fn test_initialize_and_stream() {
        for dialect in [Dialect::Ascii, Dialect::Binary] {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let port = listener.local_addr().unwrap().port();
            let server = tokio::spawn(serve_one(listener, dialect));

            let (mut session, parser) = session(port, dialect);
            let registry = ParameterRegistry::new();
            assert_eq!(session.initialize(&registry).await, InitOutcome::Ready);
            assert_eq!(session.run_step().await, StepOutcome::Continue);
            assert_eq!(parser.lock().scans(), 1);

            session.close().await;
            assert!(!session.is_connected());
            server.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_initialize_refused_is_retry() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (mut session, _) = session(port, Dialect::Binary);
        let outcome = session.initialize(&ParameterRegistry::new()).await;
        assert!(matches!(outcome, InitOutcome::Retry(_)));
    }

    #[tokio::test]
    async fn test_invalid_new_ip_is_fatal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(serve_one(listener, Dialect::Ascii));

        let registry = ParameterRegistry::new();
        registry.set(NEW_IP_ADDRESS, "not-an-ip").unwrap();
        let (mut session, _) = session(port, Dialect::Ascii);
        let outcome = session.initialize(&registry).await;
        assert!(matches!(
            outcome,
            InitOutcome::Fatal(SessionError::InvalidConfig(_))
        ));

        session.close().await;
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_command_through_sender() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(serve_one(listener, Dialect::Ascii));

        let (mut session, _) = session(port, Dialect::Ascii);
        assert_eq!(
            session.initialize(&ParameterRegistry::new()).await,
            InitOutcome::Ready
        );
        // Consume the scan telegram first
        assert_eq!(session.run_step().await, StepOutcome::Continue);

        let sender = session.commands();
        let request = tokio::spawn(async move {
            sender
                .request("sRN SCdevicestate", Duration::from_secs(2))
                .await
        });
        assert_eq!(session.run_step().await, StepOutcome::Continue);
        let reply = request.await.unwrap().unwrap();
        assert_eq!(&reply[..], b"sRA SCdevicestate");

        session.close().await;
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_ends_streaming() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(serve_one(listener, Dialect::Binary));

        let (mut session, _) = session(port, Dialect::Binary);
        assert_eq!(
            session.initialize(&ParameterRegistry::new()).await,
            InitOutcome::Ready
        );
        session.acquisition_stop().stop();
        assert_eq!(session.run_step().await, StepOutcome::Continue);
        assert!(!session.streaming);

        session.close().await;
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_peer_close_fails_step() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut decoder = FrameDecoder::new(Dialect::Ascii);
            // Answer ident and scan start, then hang up
            for _ in 0..2 {
                let payload = read_payload(&mut stream, &mut decoder).await.unwrap();
                let reply = sopas::positive_reply(&String::from_utf8_lossy(&payload)).unwrap();
                stream
                    .write_all(&cola::encode(Dialect::Ascii, reply.as_bytes()))
                    .await
                    .unwrap();
            }
        });

        let (mut session, _) = session(port, Dialect::Ascii);
        assert_eq!(
            session.initialize(&ParameterRegistry::new()).await,
            InitOutcome::Ready
        );
        server.await.unwrap();

        assert_eq!(
            session.run_step().await,
            StepOutcome::Failed(SessionError::ConnectionClosed)
        );
    }
}
