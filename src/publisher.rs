// UDP side channel for forwarding the current emotion

use crate::config::PublisherConfig;
use crate::error::{MoodCamError, Result};
use crate::models::Emotion;
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, error, info, warn};

/// Largest datagram the receive side accepts
const RECV_BUFFER_SIZE: usize = 1024;

/// Destination for per-frame emotion labels
pub trait ResultPublisher {
    fn publish(&mut self, label: Emotion) -> Result<()>;
}

/// Background reader for inbound datagrams
struct Listener {
    last_received: Arc<Mutex<Option<String>>>,
    events: broadcast::Sender<String>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Listener {
    fn spawn(socket: UdpSocket) -> Self {
        let last_received = Arc::new(Mutex::new(None));
        let (events, _) = broadcast::channel(32);
        let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();

        let last = last_received.clone();
        let sender = events.clone();
        let handle = std::thread::spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_io()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    error!("Failed to start receive runtime: {}", e);
                    return;
                }
            };

            rt.block_on(async move {
                let socket = match tokio::net::UdpSocket::from_std(socket) {
                    Ok(socket) => socket,
                    Err(e) => {
                        error!("Failed to register receive socket: {}", e);
                        return;
                    }
                };

                let mut buf = [0u8; RECV_BUFFER_SIZE];
                loop {
                    tokio::select! {
                        _ = &mut shutdown_rx => break,
                        received = socket.recv_from(&mut buf) => match received {
                            Ok((len, from)) => {
                                let text = String::from_utf8_lossy(&buf[..len]).into_owned();
                                debug!("Received {:?} from {}", text, from);
                                let _ = sender.send(text.clone());
                                if let Ok(mut slot) = last.lock() {
                                    *slot = Some(text);
                                }
                            }
                            Err(e) => warn!("Receive failed: {}", e),
                        },
                    }
                }
            });
        });

        Self {
            last_received,
            events,
            shutdown: Some(shutdown),
            handle: Some(handle),
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Receive thread panicked");
            }
        }
    }
}

/// Fire-and-forget UDP publisher.
///
/// Binds the receive port and sends from it to the transmit port; a send that
/// would block or that nobody listens for is dropped.
pub struct UdpPublisher {
    socket: UdpSocket,
    peer: SocketAddr,
    listener: Option<Listener>,
}

impl UdpPublisher {
    pub fn bind(config: &PublisherConfig) -> Result<Self> {
        let local = SocketAddr::new(config.ip, config.rx_port);
        let socket = UdpSocket::bind(local).map_err(|e| {
            MoodCamError::Publish(format!("Failed to bind UDP socket on {local}: {e}"))
        })?;
        socket.set_nonblocking(true).map_err(|e| {
            MoodCamError::Publish(format!("Failed to make UDP socket non-blocking: {e}"))
        })?;

        let listener = if config.enable_rx {
            let receive_socket = socket.try_clone().map_err(|e| {
                MoodCamError::Publish(format!("Failed to clone UDP socket for receiving: {e}"))
            })?;
            Some(Listener::spawn(receive_socket))
        } else {
            None
        };

        let peer = SocketAddr::new(config.ip, config.tx_port);
        info!(
            "UDP publisher bound to {}, sending to {} (receive {})",
            socket.local_addr()?,
            peer,
            if config.enable_rx { "on" } else { "off" }
        );

        Ok(Self {
            socket,
            peer,
            listener,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Sends raw text as one datagram
    pub fn send_text(&self, text: &str) -> Result<()> {
        match self.socket.send_to(text.as_bytes(), self.peer) {
            Ok(_) => Ok(()),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::ConnectionRefused
                ) =>
            {
                debug!("Dropped datagram to {}: {}", self.peer, e);
                Ok(())
            }
            Err(e) => Err(MoodCamError::Publish(format!(
                "Failed to send to {}: {e}",
                self.peer
            ))),
        }
    }

    /// Latest inbound message, if the receive side is enabled and got one
    pub fn last_received(&self) -> Option<String> {
        self.listener
            .as_ref()
            .and_then(|l| l.last_received.lock().ok().and_then(|slot| slot.clone()))
    }

    /// Stream of inbound messages; `None` when receiving is disabled
    pub fn subscribe(&self) -> Option<broadcast::Receiver<String>> {
        self.listener.as_ref().map(|l| l.events.subscribe())
    }
}

impl ResultPublisher for UdpPublisher {
    fn publish(&mut self, label: Emotion) -> Result<()> {
        self.send_text(label.as_str())
    }
}
