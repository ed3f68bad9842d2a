//! Connection management and the receive dispatcher.
//!
//! One [`Connection`] per server endpoint. The write half of the socket and
//! the request-ID counter live behind the same lock, so IDs are allocated in
//! the order requests hit the wire and request lines reach the server in ID
//! order. The read half is owned exclusively by the receive loop, which
//! peels one response at a time and hands the reader to the matching call's
//! decoder.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Mutex};

use lyskom_protocol::{CallNo, STATUS_ERROR, STATUS_OK};

use crate::call::ResponseHandler;
use crate::error::ClientError;

type BoxedReader = BufReader<Box<dyn AsyncRead + Send + Unpin>>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server address, `host:port`. Also the registry key.
    pub address: String,
    /// Timeout for establishing the TCP connection.
    pub connect_timeout: Duration,
}

impl ConnectionConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Write-path state: the socket's write half and the request counter,
/// deliberately behind one lock.
struct WriteState {
    writer: Option<BoxedWriter>,
    next_id: u32,
}

/// A connection to a LysKOM server.
pub struct Connection {
    /// Write half plus ID counter, serialized together.
    write: Mutex<WriteState>,
    /// Outstanding calls by request ID. An ID is present here exactly while
    /// its call is pending; the dispatcher removes entries atomically.
    pending: Mutex<HashMap<u32, ResponseHandler>>,
    /// Read half, taken by the dispatcher when `read_loop` starts.
    reader: Mutex<Option<BoxedReader>>,
    connected: AtomicBool,
    shutdown: broadcast::Sender<()>,
    /// Peer label for logging.
    peer: String,
}

impl Connection {
    /// Dials the configured TCP endpoint.
    pub async fn connect(config: ConnectionConfig) -> Result<Self, ClientError> {
        tracing::debug!(address = %config.address, "connecting");
        let stream = tokio::time::timeout(
            config.connect_timeout,
            TcpStream::connect(&config.address),
        )
        .await
        .map_err(|_| ClientError::Timeout)??;
        stream.set_nodelay(true).ok();

        let (read_half, write_half) = stream.into_split();
        Ok(Self::from_halves(
            Box::new(read_half),
            Box::new(write_half),
            config.address,
        ))
    }

    /// Builds a connection over an already-established bidirectional byte
    /// stream. This is how alternative dialers and tests plug in.
    pub fn from_stream<S>(stream: S, peer: impl Into<String>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        Self::from_halves(Box::new(read_half), Box::new(write_half), peer.into())
    }

    fn from_halves(read_half: Box<dyn AsyncRead + Send + Unpin>, writer: BoxedWriter, peer: String) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            write: Mutex::new(WriteState {
                writer: Some(writer),
                next_id: 1,
            }),
            pending: Mutex::new(HashMap::new()),
            reader: Mutex::new(Some(BufReader::new(read_half))),
            connected: AtomicBool::new(true),
            shutdown,
            peer,
        }
    }

    /// Registers a completion handler, allocates the next request ID and
    /// writes the request line. Returns the allocated ID. Write errors
    /// propagate to the caller after the handler is deregistered, so a
    /// failed submission leaves no dangling table entry.
    pub(crate) async fn submit(
        &self,
        call: CallNo,
        args: &str,
        handler: ResponseHandler,
    ) -> Result<u32, ClientError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ClientError::NotConnected);
        }

        let mut state = self.write.lock().await;
        let id = state.next_id;
        state.next_id = state.next_id.wrapping_add(1);
        self.pending.lock().await.insert(id, handler);

        let mut line = String::with_capacity(args.len() + 16);
        let _ = write!(line, "{} {}", id, call.number());
        line.push_str(args);
        line.push('\n');

        let result = async {
            let writer = state.writer.as_mut().ok_or(ClientError::NotConnected)?;
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await?;
            Ok::<_, ClientError>(())
        }
        .await;

        if let Err(e) = result {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        tracing::debug!(id, call = call.number(), peer = %self.peer, "request sent");
        Ok(id)
    }

    /// Runs the receive dispatcher. Call this once, from a dedicated task;
    /// it owns the read half until the connection dies or the shutdown
    /// signal fires.
    ///
    /// Protocol errors (`%` responses) resolve their one call and leave the
    /// stream running. Stream-fatal conditions (I/O errors, EOF, an unknown
    /// request ID, a status byte that is neither `=` nor `%`) stop dispatch
    /// and resolve every pending call with the failure. A shutdown abandons
    /// pending calls without a result.
    pub async fn read_loop(&self) -> Result<(), ClientError> {
        let mut reader = self
            .reader
            .lock()
            .await
            .take()
            .ok_or(ClientError::NotConnected)?;
        let mut shutdown = self.shutdown.subscribe();

        let result = self.dispatch(&mut reader, &mut shutdown).await;
        self.connected.store(false, Ordering::SeqCst);

        match &result {
            Ok(()) => {
                // Shutdown: abandoned sinks resolve as ConnectionClosed
                // when their senders drop.
                let mut pending = self.pending.lock().await;
                if !pending.is_empty() {
                    tracing::warn!(
                        count = pending.len(),
                        peer = %self.peer,
                        "shutdown with calls still pending"
                    );
                }
                pending.clear();
            }
            Err(e) => self.fail_pending(e).await,
        }
        result
    }

    async fn dispatch(
        &self,
        reader: &mut BoxedReader,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), ClientError> {
        loop {
            let status = tokio::select! {
                _ = shutdown.recv() => {
                    tracing::debug!(peer = %self.peer, "dispatcher shutting down");
                    return Ok(());
                }
                byte = reader.read_u8() => match byte {
                    Ok(b) => b,
                    Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                        return Err(ClientError::ConnectionClosed);
                    }
                    Err(e) => return Err(e.into()),
                },
            };

            if status != STATUS_OK && status != STATUS_ERROR {
                tracing::error!(status, peer = %self.peer, "unexpected response status byte");
                return Err(ClientError::Desync(format!(
                    "unexpected status byte 0x{status:02x}"
                )));
            }

            let id = lyskom_protocol::wire::read_u32(reader).await?;
            let handler = match self.pending.lock().await.remove(&id) {
                Some(handler) => handler,
                None => {
                    // Without the call's decoder there is no way to know how
                    // many bytes this response occupies.
                    tracing::error!(id, peer = %self.peer, "response for unknown request");
                    return Err(ClientError::UnknownRequest(id));
                }
            };

            tracing::debug!(id, ok = (status == STATUS_OK), peer = %self.peer, "dispatching response");
            if status == STATUS_OK {
                handler.ok(reader).await?;
            } else {
                handler.error(reader).await?;
            }
        }
    }

    /// Resolves every pending call with a failure derived from `cause`.
    async fn fail_pending(&self, cause: &ClientError) {
        let mut pending = self.pending.lock().await;
        if pending.is_empty() {
            return;
        }
        tracing::warn!(
            count = pending.len(),
            error = %cause,
            peer = %self.peer,
            "failing all pending calls"
        );
        for (_, handler) in pending.drain() {
            let err = match cause {
                ClientError::ConnectionClosed => ClientError::ConnectionClosed,
                other => ClientError::Desync(other.to_string()),
            };
            handler.send_err(err);
        }
    }

    /// Fires the shutdown signal. The dispatcher exits at the next frame
    /// boundary; pending calls are abandoned.
    pub fn shutdown(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.shutdown.send(());
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// The peer label (the server address for dialed connections).
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Number of calls currently awaiting a response.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}
