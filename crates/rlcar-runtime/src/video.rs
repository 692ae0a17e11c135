//! [`VideoWorker`] – single-client MJPEG server.
//!
//! One frame goes out per step, so the driver period sets the frame rate.
//! Accepting never blocks: with no client waiting the step just returns.
//! A session ends on any write error, on a write that outlives the write
//! timeout, or when the network link is down.  The next step is then free
//! to accept a new client.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use rlcar_hal::{ImageSensor, NetworkLink};
use rlcar_kernel::Worker;
use rlcar_types::{CarError, VideoConfig};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::mjpeg;

/// The one connected stream client.
struct Session {
    stream: TcpStream,
    peer: SocketAddr,
    frames: u64,
}

pub struct VideoWorker {
    camera: Box<dyn ImageSensor>,
    network: Arc<dyn NetworkLink>,
    bind: SocketAddr,
    write_timeout: Duration,
    listener: Option<TcpListener>,
    session: Option<Session>,
    address: watch::Sender<Option<SocketAddr>>,
}

impl VideoWorker {
    /// A worker listening on all interfaces at the configured port.
    pub fn new(
        camera: Box<dyn ImageSensor>,
        network: Arc<dyn NetworkLink>,
        config: &VideoConfig,
    ) -> Self {
        let (address, _) = watch::channel(None);
        Self {
            camera,
            network,
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.port),
            write_timeout: config.write_timeout(),
            listener: None,
            session: None,
            address,
        }
    }

    /// Listen on `ip` instead of all interfaces.
    pub fn with_bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind.set_ip(ip);
        self
    }

    /// Address of the listening socket while the worker is set up.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.address.borrow()
    }

    /// Follow the listening address across setup and teardown.
    pub fn watch_address(&self) -> watch::Receiver<Option<SocketAddr>> {
        self.address.subscribe()
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    async fn accept(&mut self) -> bool {
        let Some(listener) = &self.listener else {
            return false;
        };
        let (mut stream, peer) = match listener.accept().now_or_never() {
            None => return false,
            Some(Err(e)) => {
                warn!(error = %e, "accept failed");
                return false;
            }
            Some(Ok(accepted)) => accepted,
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "set_nodelay failed");
        }
        let header = mjpeg::STREAM_HEADER.as_bytes();
        if let Err(e) = write_all(&mut stream, header, self.write_timeout).await {
            warn!(%peer, error = %e, "stream client dropped before header");
            return false;
        }
        info!(%peer, "stream client connected");
        self.session = Some(Session {
            stream,
            peer,
            frames: 0,
        });
        true
    }

    async fn close_session(&mut self, reason: &str) {
        if let Some(mut session) = self.session.take() {
            let _ = session.stream.shutdown().await;
            info!(peer = %session.peer, frames = session.frames, reason, "stream client closed");
        }
    }
}

/// `write_all` bounded by `timeout`.
async fn write_all(
    stream: &mut TcpStream,
    bytes: &[u8],
    timeout: Duration,
) -> Result<(), CarError> {
    match tokio::time::timeout(timeout, stream.write_all(bytes)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(CarError::Stream(e.to_string())),
        Err(_) => Err(CarError::Stream(format!("write stalled for {timeout:?}"))),
    }
}

#[async_trait]
impl Worker for VideoWorker {
    async fn setup(&mut self) {
        match TcpListener::bind(self.bind).await {
            Ok(listener) => {
                let local = listener.local_addr().ok();
                self.listener = Some(listener);
                self.address.send_replace(local);
                match (self.network.local_address(), local) {
                    (Some(ip), Some(local)) => {
                        let url = format!("http://{ip}:{}/stream", local.port());
                        info!(%url, "mjpeg stream ready")
                    }
                    _ => info!(addr = ?local, "mjpeg listener ready"),
                }
            }
            Err(e) => error!(addr = %self.bind, error = %e, "video listener bind failed"),
        }
    }

    async fn step(&mut self) {
        if self.session.is_none() && !self.accept().await {
            return;
        }

        let frame = match self.camera.capture_frame() {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "frame skipped");
                return;
            }
        };

        let result = match self.session.as_mut() {
            Some(session) => {
                let mut part = mjpeg::part_header(frame.len()).into_bytes();
                part.extend_from_slice(&frame.data);
                part.extend_from_slice(mjpeg::PART_TRAILER);
                write_all(&mut session.stream, &part, self.write_timeout).await
            }
            None => Ok(()),
        };
        self.camera.release_frame(frame);

        match result {
            Err(e) => {
                warn!(error = %e, "frame write failed");
                self.close_session("write failed").await;
            }
            Ok(()) if !self.network.is_connected() => self.close_session("network down").await,
            Ok(()) => {
                if let Some(session) = self.session.as_mut() {
                    session.frames += 1;
                }
            }
        }
    }

    async fn teardown(&mut self) {
        self.close_session("worker stopping").await;
        self.listener = None;
        self.address.send_replace(None);
        info!("video server stopped");
    }
}
