// Blocking TCP listener for the simulator feed.
//
// Runs on its own OS thread: accept one client, greet it, reassemble
// `$`-terminated frames and hand each payload to the dispatch queue.
// Nothing here touches playback state.

use crate::dispatch::Dispatcher;
use crate::framing::{FrameReassembler, DEFAULT_MARKERS, DEFAULT_MAX_MESSAGE_BYTES};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::io::{self, Read, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;


/// Listener configuration (`[ingest]` section)
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Sent to every client right after accept
    #[serde(default = "default_greeting")]
    pub greeting: String,
    #[serde(default = "default_recv_buffer_bytes")]
    pub recv_buffer_bytes: usize,
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
    #[serde(default = "default_markers")]
    pub markers: Vec<String>,
}

fn default_bind_addr() -> String {
    "127.0.0.1:1101".to_string()
}

fn default_greeting() -> String {
    "I will send key".to_string()
}

fn default_recv_buffer_bytes() -> usize {
    4096
}

fn default_max_message_bytes() -> usize {
    DEFAULT_MAX_MESSAGE_BYTES
}

fn default_markers() -> Vec<String> {
    DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            greeting: default_greeting(),
            recv_buffer_bytes: default_recv_buffer_bytes(),
            max_message_bytes: default_max_message_bytes(),
            markers: default_markers(),
        }
    }
}

/// Socket-level failure inside one client session.
#[derive(Debug)]
pub enum ConnectionError {
    Accept(io::Error),
    Greeting(io::Error),
    Receive(io::Error),
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::Accept(e) => write!(f, "accept failed: {}", e),
            ConnectionError::Greeting(e) => write!(f, "failed to send greeting: {}", e),
            ConnectionError::Receive(e) => write!(f, "receive failed: {}", e),
        }
    }
}

impl std::error::Error for ConnectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConnectionError::Accept(e)
            | ConnectionError::Greeting(e)
            | ConnectionError::Receive(e) => Some(e),
        }
    }
}

/// How a session ended without a socket fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    PeerClosed,
    Stopped,
    DispatchClosed,
}

/// State shared between the listener thread and its handle.
#[derive(Default)]
struct Shared {
    stop: AtomicBool,
    /// Clone of the connected client, so shutdown can unblock `read`.
    active: Mutex<Option<TcpStream>>,
}

impl Shared {
    fn stopping(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn set_active(&self, stream: Option<TcpStream>) {
        match self.active.lock() {
            Ok(mut guard) => *guard = stream,
            Err(poisoned) => *poisoned.into_inner() = stream,
        }
    }

    fn close_active(&self) {
        let stream = match self.active.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(stream) = stream {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

/// A bound, not yet running, ingest listener.
pub struct IngestListener {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: IngestConfig,
}

impl IngestListener {
    /// Bind the configured address. Port 0 picks a free port.
    pub fn bind(config: IngestConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr.as_str())
            .with_context(|| format!("Failed to bind ingest listener on {}", config.bind_addr))?;
        let local_addr = listener
            .local_addr()
            .context("Failed to read ingest listener address")?;
        Ok(Self {
            listener,
            local_addr,
            config,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Start the listener thread.
    ///
    /// Every extracted payload becomes one action on `dispatcher` that calls
    /// `handler` with the consumer's state.
    pub fn spawn<C, F>(self, dispatcher: Dispatcher<C>, handler: F) -> Result<ListenerHandle>
    where
        C: 'static,
        F: Fn(&mut C, String) + Clone + Send + 'static,
    {
        let shared = Arc::new(Shared::default());
        let local_addr = self.local_addr;
        let thread_shared = Arc::clone(&shared);

        let thread = thread::Builder::new()
            .name("ingest-listener".to_string())
            .spawn(move || self.run(&thread_shared, &dispatcher, &handler))
            .context("Failed to start ingest listener thread")?;

        Ok(ListenerHandle {
            local_addr,
            shared,
            thread: Some(thread),
        })
    }

    fn run<C, F>(self, shared: &Shared, dispatcher: &Dispatcher<C>, handler: &F)
    where
        C: 'static,
        F: Fn(&mut C, String) + Clone + Send + 'static,
    {
        info!(addr = %self.local_addr, "Ingest listener bound");

        loop {
            if shared.stopping() {
                break;
            }
            if dispatcher.is_closed() {
                warn!("Dispatch queue closed, ingest listener exiting");
                break;
            }

            debug!(addr = %self.local_addr, "Waiting for simulator connection");
            let (stream, peer) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(e) => {
                    if shared.stopping() {
                        break;
                    }
                    error!(error = %ConnectionError::Accept(e), "Ingest accept failed");
                    thread::sleep(Duration::from_millis(50));
                    continue;
                }
            };

            if shared.stopping() {
                break;
            }

            let session_id = Uuid::now_v7();
            info!(session_id = %session_id, peer = %peer, "Simulator connected");

            match stream.try_clone() {
                Ok(clone) => shared.set_active(Some(clone)),
                Err(e) => warn!(session_id = %session_id, error = %e, "Failed to clone client socket"),
            }

            let outcome = self.serve(stream, session_id, shared, dispatcher, handler);
            shared.set_active(None);

            match outcome {
                Ok(SessionEnd::PeerClosed) => {
                    info!(session_id = %session_id, "Simulator disconnected");
                }
                Ok(SessionEnd::Stopped) => break,
                Ok(SessionEnd::DispatchClosed) => {
                    warn!(session_id = %session_id, "Dispatch queue closed, ingest listener exiting");
                    break;
                }
                Err(e) => {
                    if shared.stopping() {
                        break;
                    }
                    warn!(session_id = %session_id, error = %e, "Simulator session failed");
                }
            }
        }

        info!(addr = %self.local_addr, "Ingest listener stopped");
    }

    fn serve<C, F>(
        &self,
        mut stream: TcpStream,
        session_id: Uuid,
        shared: &Shared,
        dispatcher: &Dispatcher<C>,
        handler: &F,
    ) -> Result<SessionEnd, ConnectionError>
    where
        C: 'static,
        F: Fn(&mut C, String) + Clone + Send + 'static,
    {
        // Shutdown may have raced the registration of this socket.
        if shared.stopping() {
            return Ok(SessionEnd::Stopped);
        }

        stream
            .write_all(self.config.greeting.as_bytes())
            .map_err(ConnectionError::Greeting)?;

        let mut reassembler =
            FrameReassembler::new(&self.config.markers, self.config.max_message_bytes);
        let mut buf = vec![0u8; self.config.recv_buffer_bytes.max(1)];

        loop {
            let n = match stream.read(&mut buf) {
                Ok(0) => {
                    if reassembler.buffered() > 0 {
                        debug!(
                            session_id = %session_id,
                            bytes = reassembler.buffered(),
                            "Discarding partial message"
                        );
                    }
                    return Ok(if shared.stopping() {
                        SessionEnd::Stopped
                    } else {
                        SessionEnd::PeerClosed
                    });
                }
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ConnectionError::Receive(e)),
            };
            debug!(session_id = %session_id, bytes = n, "Received chunk");

            let mut next = reassembler.feed(&buf[..n]);
            loop {
                match next {
                    Ok(Some(payload)) => {
                        info!(session_id = %session_id, bytes = payload.len(), "Received traffic data");
                        let handler = handler.clone();
                        if dispatcher.enqueue(move |state| handler(state, payload)).is_err() {
                            return Ok(SessionEnd::DispatchClosed);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "Discarding malformed message");
                    }
                }
                next = reassembler.extract();
            }
        }
    }
}

/// Owner of a running listener thread. Dropping it stops the thread.
pub struct ListenerHandle {
    local_addr: SocketAddr,
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, drop the current client and wait for the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let thread = match self.thread.take() {
            Some(thread) => thread,
            None => return,
        };

        self.shared.stop.store(true, Ordering::SeqCst);
        self.shared.close_active();

        // accept() has no cancellation; wake it with a throwaway connection.
        let wake = wake_addr(self.local_addr);
        if let Err(e) = TcpStream::connect_timeout(&wake, Duration::from_secs(1)) {
            debug!(addr = %wake, error = %e, "Wake-up connection failed");
        }

        if thread.join().is_err() {
            error!("Ingest listener thread panicked");
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn wake_addr(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), addr.port())
        }
        _ => addr,
    }
}
