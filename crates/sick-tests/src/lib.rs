//! End-to-end test support for the SICK scanner node
//!
//! [`FakeScanner`] is an in-process scanner on a local TCP port speaking
//! CoLa-A or CoLa-B. It answers SOPAS commands positively, streams scan
//! telegrams once scan data is enabled and can be told to drop
//! connections to exercise the reconnect and finalize paths.
//!
//! # Test Structure
//!
//! - `lifecycle_e2e_test.rs` - reconnect, failure and interrupt paths
//! - `services_e2e_test.rs` - HTTP services against a live session
//! - `launch_e2e_test.rs` - configuration injection through `run_node`

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use sick_core::ParameterRegistry;
use sick_scan::{cola, sopas, Dialect, FrameDecoder};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Behaviour of a [`FakeScanner`]
#[derive(Debug, Clone)]
pub struct FakeScannerOptions {
    pub dialect: Dialect,
    /// Close the first N connections right after accepting them
    pub refuse_first: usize,
    /// Scan telegrams sent after `sEN LMDscandata 1`
    pub scans: usize,
    /// Close the connection once the scans are out
    pub close_after_scans: bool,
    /// Canned replies checked before the positive default
    pub responses: HashMap<String, String>,
}

impl Default for FakeScannerOptions {
    fn default() -> Self {
        Self {
            dialect: Dialect::Binary,
            refuse_first: 0,
            scans: 1,
            close_after_scans: false,
            responses: HashMap::new(),
        }
    }
}

/// In-process scanner on `127.0.0.1`
pub struct FakeScanner {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    commands: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl FakeScanner {
    pub async fn start(options: FakeScannerOptions) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let connections = Arc::new(AtomicUsize::new(0));
        let commands = Arc::new(Mutex::new(Vec::new()));

        let handle = {
            let connections = connections.clone();
            let commands = commands.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let index = connections.fetch_add(1, Ordering::SeqCst);
                    if index < options.refuse_first {
                        drop(stream);
                        continue;
                    }
                    let options = options.clone();
                    let commands = commands.clone();
                    tokio::spawn(serve(stream, options, commands));
                }
            })
        };

        Ok(Self {
            addr,
            connections,
            commands,
            handle,
        })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Accepted connections, refused ones included
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Commands received so far, in order
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }

    /// Registry pointing the node at this scanner
    pub fn registry(&self, extra: &[(&str, &str)]) -> Arc<ParameterRegistry> {
        let registry = ParameterRegistry::new();
        for (key, value) in self.args(extra).iter().filter_map(|a| a.split_once(":=")) {
            registry
                .set(key, value)
                .unwrap_or_else(|e| panic!("cannot set {key}: {e}"));
        }
        Arc::new(registry)
    }

    /// `tag:=value` tokens pointing the node at this scanner
    pub fn args(&self, extra: &[(&str, &str)]) -> Vec<String> {
        let mut args = vec![
            "scanner_type:=sick_tim_5xx".to_string(),
            "hostname:=127.0.0.1".to_string(),
            format!("port:={}", self.port()),
            "timelimit:=2".to_string(),
            "reconnect_delay_ms:=10".to_string(),
        ];
        args.extend(extra.iter().map(|(k, v)| format!("{}:={}", k, v)));
        args
    }
}

impl Drop for FakeScanner {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(mut stream: TcpStream, options: FakeScannerOptions, commands: Arc<Mutex<Vec<String>>>) {
    let mut decoder = FrameDecoder::new(options.dialect);
    while let Some(payload) = read_payload(&mut stream, &mut decoder).await {
        let command = String::from_utf8_lossy(&payload).into_owned();
        commands.lock().push(command.clone());

        let reply = options
            .responses
            .get(&command)
            .cloned()
            .or_else(|| sopas::positive_reply(&command))
            .unwrap_or_else(|| "sFA 1".to_string());
        if send(&mut stream, options.dialect, reply.as_bytes()).await.is_err() {
            return;
        }

        if command == sopas::START_SCAN_DATA {
            for n in 0..options.scans {
                let scan = format!("sSN LMDscandata 1 {}", n);
                if send(&mut stream, options.dialect, scan.as_bytes()).await.is_err() {
                    return;
                }
            }
            if options.close_after_scans {
                tokio::time::sleep(Duration::from_millis(20)).await;
                return;
            }
        }
    }
}

async fn send(stream: &mut TcpStream, dialect: Dialect, payload: &[u8]) -> std::io::Result<()> {
    let frame: Bytes = cola::encode(dialect, payload);
    stream.write_all(&frame).await
}

async fn read_payload(stream: &mut TcpStream, decoder: &mut FrameDecoder) -> Option<Bytes> {
    let mut chunk = [0u8; 1024];
    loop {
        if let Ok(Some(frame)) = decoder.next_frame() {
            return Some(frame);
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        decoder.push(&chunk[..n]);
    }
}
