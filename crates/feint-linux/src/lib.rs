use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::os::unix::io::AsRawFd;
use std::time::Duration;

use log::debug;
use socket2::Socket;

use feint_core::AuthSignature;
use feint_hal::{IpFamily, SocketControl};
use feint_inject::{ReadFrom, Sink, StreamConn, StreamDialer};

/// Socket options of a connected TCP stream, through a duplicated descriptor.
pub struct LinuxSocketControl {
    socket: Socket,
    family: IpFamily,
    /// AF_INET6 socket; option addresses must use that family.
    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    dual_stack: bool,
}

impl LinuxSocketControl {
    pub fn new(stream: &TcpStream) -> io::Result<Self> {
        let family = IpFamily::of(&stream.peer_addr()?);
        let dual_stack = stream.local_addr()?.is_ipv6();
        let socket = Socket::from(stream.try_clone()?);
        Ok(Self { socket, family, dual_stack })
    }
}

/// Kernel `struct tcp_md5sig`. The portable signature buffer is re-laid into
/// it: the kernel rejects anything shorter.
#[cfg(target_os = "linux")]
mod md5sig {
    use std::io;
    use std::net::{Ipv6Addr, SocketAddr};

    use feint_core::{AuthSignature, SIGNATURE_KEY_MAX};
    use socket2::SockAddr;

    #[repr(C)]
    pub(crate) struct TcpMd5Sig {
        addr: libc::sockaddr_storage,
        flags: u8,
        prefix_len: u8,
        key_len: u16,
        if_index: libc::c_int,
        pub(crate) key: [u8; SIGNATURE_KEY_MAX],
    }

    impl TcpMd5Sig {
        pub(crate) fn new(signature: &AuthSignature, dual_stack: bool) -> io::Result<Self> {
            let ip = Ipv6Addr::from(signature.addr);
            let peer = match ip.to_ipv4_mapped() {
                Some(v4) if !dual_stack => SocketAddr::from((v4, 0)),
                _ if dual_stack => SocketAddr::from((ip, 0)),
                _ => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "IPv6 signature peer on an IPv4 socket",
                    ))
                }
            };
            let peer = SockAddr::from(peer);

            // All-zero is a valid sockaddr_storage.
            let mut addr: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
            unsafe {
                std::ptr::copy_nonoverlapping(
                    peer.as_ptr() as *const u8,
                    &mut addr as *mut libc::sockaddr_storage as *mut u8,
                    peer.len() as usize,
                );
            }
            Ok(Self {
                addr,
                flags: 0,
                prefix_len: 0,
                key_len: signature.key_len,
                if_index: 0,
                key: signature.key,
            })
        }
    }
}

impl SocketControl for LinuxSocketControl {
    fn family(&self) -> IpFamily {
        self.family
    }

    fn hop_limit(&self) -> io::Result<u32> {
        match self.family {
            IpFamily::V4 => self.socket.ttl(),
            IpFamily::V6 => self.socket.unicast_hops_v6(),
        }
    }

    fn set_hop_limit(&self, value: u32) -> io::Result<()> {
        match self.family {
            IpFamily::V4 => self.socket.set_ttl(value),
            IpFamily::V6 => self.socket.set_unicast_hops_v6(value),
        }
    }

    #[cfg(target_os = "linux")]
    fn set_auth_signature(&self, signature: &AuthSignature) -> io::Result<()> {
        use zeroize::Zeroize;

        let mut cmd = md5sig::TcpMd5Sig::new(signature, self.dual_stack)?;
        let ret = unsafe {
            libc::setsockopt(
                self.socket.as_raw_fd(),
                libc::IPPROTO_TCP,
                feint_core::TCP_MD5SIG,
                &cmd as *const md5sig::TcpMd5Sig as *const libc::c_void,
                std::mem::size_of::<md5sig::TcpMd5Sig>() as libc::socklen_t,
            )
        };
        let result = if ret == 0 { Ok(()) } else { Err(io::Error::last_os_error()) };
        cmd.key.zeroize();
        result
    }

    #[cfg(not(target_os = "linux"))]
    fn set_auth_signature(&self, _signature: &AuthSignature) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "TCP_MD5SIG is Linux-only"))
    }

    fn send_raw(&self, data: &[u8], flags: i32) -> io::Result<usize> {
        let sent = unsafe {
            libc::send(self.socket.as_raw_fd(), data.as_ptr() as *const libc::c_void, data.len(), flags)
        };
        if sent < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(sent as usize)
    }
}

/// Plain TCP dialer.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    pub connect_timeout: Option<Duration>,
    /// On by default so each write leaves as its own segment.
    pub nodelay: bool,
}

impl Default for TcpDialer {
    fn default() -> Self {
        Self { connect_timeout: None, nodelay: true }
    }
}

impl TcpDialer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    fn connect(&self, addr: &SocketAddr) -> io::Result<TcpStream> {
        let stream = match self.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(addr, timeout)?,
            None => TcpStream::connect(addr)?,
        };
        stream.set_nodelay(self.nodelay)?;
        Ok(stream)
    }
}

impl StreamDialer for TcpDialer {
    fn dial(&self, addr: &str) -> io::Result<Box<dyn StreamConn>> {
        let mut last_err = None;
        for candidate in addr.to_socket_addrs()? {
            match self.connect(&candidate) {
                Ok(stream) => {
                    debug!("connected to {} ({})", addr, candidate);
                    return Ok(Box::new(TcpConn::new(stream)));
                }
                Err(e) => {
                    debug!("connect to {} failed: {}", candidate, e);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("no addresses for {}", addr))
        }))
    }
}

/// Connected TCP stream. Bulk transfers go through `io::copy`.
pub struct TcpConn(TcpStream);

impl TcpConn {
    pub fn new(stream: TcpStream) -> Self {
        Self(stream)
    }

    pub fn get_ref(&self) -> &TcpStream {
        &self.0
    }
}

impl Read for TcpConn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Write for TcpConn {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.write(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl Sink for TcpConn {
    fn bulk(&mut self) -> Option<&mut dyn ReadFrom> {
        Some(self)
    }
}

impl ReadFrom for TcpConn {
    fn read_from(&mut self, source: &mut dyn Read) -> io::Result<u64> {
        io::copy(source, &mut self.0)
    }
}

impl StreamConn for TcpConn {
    fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.0.peer_addr()
    }

    fn socket_control(&self) -> io::Result<Box<dyn SocketControl>> {
        Ok(Box::new(LinuxSocketControl::new(&self.0)?))
    }

    fn close_write(&mut self) -> io::Result<()> {
        self.0.shutdown(Shutdown::Write)
    }
}
