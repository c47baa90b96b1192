//! Connection dialing for reconciliation sessions.
//!
//! A session needs nothing more than an ordered, reliable byte stream. The
//! [`Connector`] trait hides where that stream comes from: TCP in
//! production, in-process pipes in tests.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::error::{ReconError, Result};

/// Opens connections to reconciliation partners.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Connector: Send + Sync {
    /// The byte stream handed to a session.
    type Conn: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Connect to the partner at `addr`.
    async fn connect(&self, addr: &str) -> Result<Self::Conn>;
}

/// Dials partners over TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    dial_timeout: Duration,
}

impl TcpConnector {
    pub fn new(dial_timeout: Duration) -> Self {
        Self { dial_timeout }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Conn = TcpStream;

    async fn connect(&self, addr: &str) -> Result<TcpStream> {
        match tokio::time::timeout(self.dial_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                stream.set_nodelay(true)?;
                Ok(stream)
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(ReconError::Timeout(format!(
                "dialing {} took longer than {}ms",
                addr,
                self.dial_timeout.as_millis()
            ))),
        }
    }
}

/// An in-process network for testing.
///
/// Each connection is a `tokio::io::duplex` pipe; the far end is delivered
/// to whichever listener registered the dialed address.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::io::DuplexStream;
    use tokio::sync::{mpsc, RwLock};

    /// Pipe buffer size per direction.
    const PIPE_CAPACITY: usize = 256 * 1024;

    /// Shared registry of listening addresses.
    #[derive(Default)]
    pub struct MemoryNetwork {
        listeners: RwLock<HashMap<String, mpsc::Sender<DuplexStream>>>,
    }

    impl MemoryNetwork {
        /// Create a new memory network.
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Start accepting connections dialed to `addr`.
        ///
        /// Replaces any earlier listener on the same address.
        pub async fn listen(self: &Arc<Self>, addr: &str) -> MemoryListener {
            let (tx, rx) = mpsc::channel(16);
            self.listeners.write().await.insert(addr.to_string(), tx);
            MemoryListener {
                addr: addr.to_string(),
                receiver: rx,
            }
        }

        /// A connector dialing into this network.
        pub fn connector(self: &Arc<Self>) -> MemoryConnector {
            MemoryConnector {
                network: Arc::clone(self),
            }
        }
    }

    /// Accepting end of an in-memory address.
    pub struct MemoryListener {
        addr: String,
        receiver: mpsc::Receiver<DuplexStream>,
    }

    impl MemoryListener {
        pub fn addr(&self) -> &str {
            &self.addr
        }

        /// Wait for the next inbound connection.
        pub async fn accept(&mut self) -> Result<DuplexStream> {
            self.receiver.recv().await.ok_or_else(|| {
                ReconError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotConnected,
                    "memory network dropped",
                ))
            })
        }
    }

    /// Connector over a [`MemoryNetwork`].
    #[derive(Clone)]
    pub struct MemoryConnector {
        network: Arc<MemoryNetwork>,
    }

    #[async_trait]
    impl Connector for MemoryConnector {
        type Conn = DuplexStream;

        async fn connect(&self, addr: &str) -> Result<DuplexStream> {
            let sender = self.network.listeners.read().await.get(addr).cloned();
            let refused = || {
                ReconError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    format!("nothing listening on {}", addr),
                ))
            };

            let sender = sender.ok_or_else(refused)?;
            let (near, far) = tokio::io::duplex(PIPE_CAPACITY);
            sender.send(far).await.map_err(|_| refused())?;
            Ok(near)
        }
    }
}
