use clap::Parser;
use colored::Colorize;
use feint_core::Settings;
use feint_inject::{EvadingDialer, ReadFrom, Sink, StreamConn, StreamDialer};
use feint_linux::TcpDialer;
use std::io::{self, Read, Write};
use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
use std::time::Duration;
use log::{info, warn};

/// Opens a TCP connection that sends a decoy ahead of the real payload.
#[derive(Parser)]
struct Cli {
    /// host:port to dial
    #[arg(long)] target: String,
    /// "<decoy>:<offset>:<length>:<ttl>:<auth>"
    #[arg(long)] settings: String,
    /// MD5 signature secret (defaults to the peer's ip:port)
    #[arg(long)] key: Option<String>,
    #[arg(long, default_value_t = 5000)] timeout_ms: u64,
    /// Sent instead of stdin
    #[arg(long)] payload: Option<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let settings: Settings = cli.settings.parse()?;
    info!(
        "decoy {} bytes, window {}+{}, ttl {:?}, signature {}",
        settings.decoy.len(), settings.offset, settings.length, settings.ttl, settings.auth_signature
    );

    let tcp = TcpDialer::new().with_connect_timeout(Duration::from_millis(cli.timeout_ms));
    let mut dialer = EvadingDialer::new(Arc::new(tcp), settings);
    if let Some(key) = &cli.key {
        dialer = dialer.with_signature_key(key.as_bytes());
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        warn!("Signal received. Stopping...");
        r.store(false, Ordering::SeqCst);
    })?;

    let mut conn = match dialer.dial(&cli.target) {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("{} {}: {}", "[FAIL]".red(), cli.target, e);
            return Err(e.into());
        }
    };
    eprintln!("{} connected to {}", "[ OK ]".green(), conn.peer_addr()?);

    let sent = match &cli.payload {
        Some(payload) => {
            conn.write_all(payload.as_bytes())?;
            payload.len() as u64
        }
        None => send_stdin(&mut *conn)?,
    };
    if let Err(e) = conn.close_write() {
        warn!("cannot half-close, waiting for the peer to finish: {}", e);
    }

    let received = pump_to_stdout(&mut *conn, &running)?;
    eprintln!("{} {} bytes out, {} bytes in", "[DONE]".green(), sent, received);
    Ok(())
}

fn send_stdin(conn: &mut dyn StreamConn) -> io::Result<u64> {
    let mut stdin = io::stdin().lock();
    match conn.bulk() {
        Some(bulk) => bulk.read_from(&mut stdin),
        None => io::copy(&mut stdin, conn),
    }
}

fn pump_to_stdout(conn: &mut dyn StreamConn, running: &AtomicBool) -> io::Result<u64> {
    let mut stdout = io::stdout().lock();
    let mut buf = [0u8; 16 * 1024];
    let mut received = 0u64;
    while running.load(Ordering::SeqCst) {
        let n = match conn.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        stdout.write_all(&buf[..n])?;
        received += n as u64;
    }
    stdout.flush()?;
    Ok(received)
}
