use crate::{ComError, Transport};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_websockets::{Message, ServerBuilder, WebSocketStream};

type WsSink = futures_util::stream::SplitSink<WebSocketStream<TcpStream>, Message>;

/// Text sent to a client that connects while another one is being served.
pub const BUSY_MESSAGE: &str = "stream busy";

/// How long a new connection gets to finish the websocket upgrade.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Accepts websocket clients, serving at most one at a time.
///
/// A background task accepts TCP connections and runs each handshake in
/// its own task, so a peer that never completes the upgrade holds up
/// nobody. Finished transports are queued for [`WsListener::accept`].
pub struct WsListener {
    local_addr: SocketAddr,
    occupied: Arc<AtomicBool>,
    incoming: Mutex<mpsc::Receiver<WsTransport>>,
    accept_task: JoinHandle<()>,
}

impl WsListener {
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, ComError> {
        Self::bind_with_timeout(addr, HANDSHAKE_TIMEOUT).await
    }

    pub async fn bind_with_timeout(addr: impl ToSocketAddrs, handshake_timeout: Duration) -> Result<Self, ComError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let occupied = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel(1);

        let accept_task = tokio::spawn(accept_loop(listener, tx, occupied.clone(), handshake_timeout));
        Ok(Self {
            local_addr,
            occupied,
            incoming: Mutex::new(rx),
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// True while an accepted transport is alive.
    pub fn is_occupied(&self) -> bool {
        self.occupied.load(Ordering::Acquire)
    }

    /// Wait for the next client whose handshake completed.
    ///
    /// Cancel-safe: a transport is never lost when this future is dropped.
    /// While an earlier transport is still alive, newcomers get
    /// [`BUSY_MESSAGE`] and a close frame instead.
    pub async fn accept(&self) -> Result<WsTransport, ComError> {
        let mut incoming = self.incoming.lock().await;
        incoming.recv().await.ok_or(ComError::ConnectionClosed)
    }
}

impl Drop for WsListener {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    tx: mpsc::Sender<WsTransport>,
    occupied: Arc<AtomicBool>,
    handshake_timeout: Duration,
) {
    loop {
        let (tcp_stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                log::warn!("stream accept failed: {e}");
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };

        let tx = tx.clone();
        let occupied = occupied.clone();
        tokio::spawn(async move {
            let mut ws_stream =
                match tokio::time::timeout(handshake_timeout, ServerBuilder::new().accept(tcp_stream)).await {
                    Ok(Ok((_request, ws_stream))) => ws_stream,
                    Ok(Err(e)) => {
                        log::warn!("websocket handshake failed for {peer}: {e}");
                        return;
                    }
                    Err(_) => {
                        log::warn!("websocket handshake timed out for {peer}");
                        return;
                    }
                };

            if occupied.swap(true, Ordering::AcqRel) {
                log::warn!("rejecting {peer}: a stream client is already connected");
                let _ = ws_stream.send(Message::text(BUSY_MESSAGE.to_string())).await;
                let _ = ws_stream.close().await;
                return;
            }

            log::info!("stream client {peer} connected");
            // a send error drops the transport, which frees the slot again
            let _ = tx.send(WsTransport::new(ws_stream, peer, occupied)).await;
        });
    }
}

/// The websocket connection of the single stream client.
///
/// A background task drains incoming messages and flags the transport
/// closed when the peer sends a close frame, errors, or goes away.
pub struct WsTransport {
    peer: SocketAddr,
    writer: WsSink,
    closed_rx: watch::Receiver<bool>,
    send_failed: bool,
    reader_task: JoinHandle<()>,
    occupied: Arc<AtomicBool>,
}

impl WsTransport {
    fn new(ws_stream: WebSocketStream<TcpStream>, peer: SocketAddr, occupied: Arc<AtomicBool>) -> Self {
        let (writer, mut reader) = ws_stream.split();
        let (closed_tx, closed_rx) = watch::channel(false);

        let reader_task = tokio::spawn(async move {
            loop {
                match reader.next().await {
                    Some(Ok(msg)) if msg.is_close() => {
                        log::debug!("{peer} sent close");
                        break;
                    }
                    Some(Ok(msg)) => {
                        if let Some(text) = msg.as_text() {
                            log::debug!("ignoring text from {peer}: {text:?}");
                        }
                    }
                    Some(Err(e)) => {
                        log::warn!("stream client {peer} error: {e}");
                        break;
                    }
                    None => break,
                }
            }
            let _ = closed_tx.send(true);
        });

        Self {
            peer,
            writer,
            closed_rx,
            send_failed: false,
            reader_task,
            occupied,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Send a close frame and release the client slot.
    pub async fn shutdown(mut self) {
        if !self.is_closed() {
            let _ = self.writer.close().await;
        }
    }

    async fn send_message(&mut self, msg: Message) -> Result<(), ComError> {
        if self.is_closed() {
            return Err(ComError::ConnectionClosed);
        }
        if let Err(e) = self.writer.send(msg).await {
            log::debug!("send to {} failed: {e}", self.peer);
            self.send_failed = true;
            return Err(ComError::ConnectionClosed);
        }
        Ok(())
    }
}

impl Transport for WsTransport {
    async fn send_text(&mut self, text: &str) -> Result<(), ComError> {
        self.send_message(Message::text(text.to_string())).await
    }

    async fn send_binary(&mut self, payload: Vec<u8>) -> Result<(), ComError> {
        self.send_message(Message::binary(payload)).await
    }

    async fn closed(&mut self) {
        if self.send_failed {
            return;
        }
        // Err means the reader task is gone, which also means closed
        let _ = self.closed_rx.wait_for(|closed| *closed).await;
    }

    fn is_closed(&self) -> bool {
        self.send_failed || *self.closed_rx.borrow()
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.reader_task.abort();
        self.occupied.store(false, Ordering::Release);
        log::info!("stream client {} released", self.peer);
    }
}
