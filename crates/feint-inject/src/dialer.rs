use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;

use feint_core::{AuthSignature, Settings};
use feint_hal::SocketControl;
use log::{info, warn};

use crate::copy::{ReadFrom, Sink};
use crate::decoy::{DecoyProvider, DecoySource, ProbeDecoy};
use crate::hop::HopTrick;
use crate::writer::{InjectionWriter, Progress};
use crate::InjectError;

/// A connected, bidirectional byte stream.
pub trait StreamConn: Read + Sink + Send {
    fn peer_addr(&self) -> io::Result<SocketAddr>;

    /// Socket options of the underlying OS connection. Wrappers delegate
    /// inward; in-memory streams have none.
    fn socket_control(&self) -> io::Result<Box<dyn SocketControl>> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "no socket behind this stream"))
    }

    /// Half-closes the outgoing direction once all writes are done.
    fn close_write(&mut self) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "half-close not supported"))
    }
}

/// Establishes stream connections. Dialers compose by wrapping one another.
pub trait StreamDialer: Send + Sync {
    fn dial(&self, addr: &str) -> io::Result<Box<dyn StreamConn>>;
}

impl<D: StreamDialer + ?Sized> StreamDialer for Arc<D> {
    fn dial(&self, addr: &str) -> io::Result<Box<dyn StreamConn>> {
        (**self).dial(addr)
    }
}

impl<D: StreamDialer + ?Sized> StreamDialer for Box<D> {
    fn dial(&self, addr: &str) -> io::Result<Box<dyn StreamConn>> {
        (**self).dial(addr)
    }
}

/// Dialer that installs the signature option and routes writes through an
/// [`InjectionWriter`].
pub struct EvadingDialer {
    inner: Arc<dyn StreamDialer>,
    settings: Settings,
    provider: Arc<dyn DecoyProvider>,
    signature_key: Option<Vec<u8>>,
}

impl EvadingDialer {
    pub fn new(inner: Arc<dyn StreamDialer>, settings: Settings) -> Self {
        Self {
            inner,
            settings,
            provider: Arc::new(ProbeDecoy),
            signature_key: None,
        }
    }

    /// Decoy chooser used when the settings carry no decoy text.
    pub fn with_decoy_provider(mut self, provider: Arc<dyn DecoyProvider>) -> Self {
        self.provider = provider;
        self
    }

    /// Signature secret. Defaults to the peer's `ip:port` text.
    pub fn with_signature_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.signature_key = Some(key.into());
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn install_signature(&self, conn: &dyn StreamConn) -> Result<(), InjectError> {
        let peer = conn.peer_addr().map_err(InjectError::SignatureInstall)?;
        let control = conn.socket_control().map_err(InjectError::SignatureInstall)?;
        let signature = match &self.signature_key {
            Some(key) => AuthSignature::new(peer.ip(), key),
            None => AuthSignature::new(peer.ip(), peer.to_string().as_bytes()),
        };
        control.set_auth_signature(&signature).map_err(InjectError::SignatureInstall)?;
        info!("MD5 signature installed for {}", peer.ip());
        Ok(())
    }

    fn wrap(&self, conn: Box<dyn StreamConn>) -> Result<EvadingConn, InjectError> {
        let source = if self.settings.uses_default_decoy() {
            DecoySource::Provided(self.provider.clone())
        } else {
            DecoySource::Fixed(self.settings.decoy.clone())
        };
        let mut writer = InjectionWriter::new(conn, source, self.settings.offset, self.settings.length);

        if let Some(hop_limit) = self.settings.ttl.filter(|_| self.settings.injects_decoy()) {
            let control = match writer.get_ref().socket_control() {
                Ok(control) => control,
                Err(e) if e.kind() == io::ErrorKind::Unsupported => {
                    return Err(InjectError::MissingCapability("hop limit control"));
                }
                Err(e) => return Err(InjectError::TtlSet(e)),
            };
            writer = writer.with_hop_trick(HopTrick { control, hop_limit });
        }
        Ok(EvadingConn { writer })
    }
}

impl StreamDialer for EvadingDialer {
    fn dial(&self, addr: &str) -> io::Result<Box<dyn StreamConn>> {
        let conn = self.inner.dial(addr)?;

        if self.settings.auth_signature {
            if let Err(e) = self.install_signature(&*conn) {
                warn!("closing connection to {}: {}", addr, e);
                drop(conn);
                return Err(e.into());
            }
        }

        let conn = self.wrap(conn)?;
        info!(
            "dialed {} (decoy window {}+{}, ttl {:?})",
            addr, self.settings.offset, self.settings.length, self.settings.ttl
        );
        Ok(Box::new(conn))
    }
}

/// Connection whose reads come straight from the inner stream and whose
/// writes go through the injection writer.
pub struct EvadingConn {
    writer: InjectionWriter<Box<dyn StreamConn>>,
}

impl EvadingConn {
    pub fn inject(&mut self, data: &[u8]) -> io::Result<Progress> {
        self.writer.inject(data)
    }

    pub fn split_budget(&self) -> usize {
        self.writer.split_budget()
    }
}

impl Read for EvadingConn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.writer.get_mut().read(buf)
    }
}

impl Write for EvadingConn {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.writer.write(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl Sink for EvadingConn {
    fn bulk(&mut self) -> Option<&mut dyn ReadFrom> {
        self.writer.bulk()
    }
}

impl StreamConn for EvadingConn {
    fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.writer.get_ref().peer_addr()
    }

    fn socket_control(&self) -> io::Result<Box<dyn SocketControl>> {
        self.writer.get_ref().socket_control()
    }

    fn close_write(&mut self) -> io::Result<()> {
        self.writer.get_mut().close_write()
    }
}
