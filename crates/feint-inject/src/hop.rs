use std::io;

use feint_hal::SocketControl;
use log::{debug, warn};

use crate::InjectError;

/// Hop limit raised back to its original value when released.
///
/// `restore` reports the outcome. A guard dropped without `restore` (unwind)
/// still attempts it and logs a failure.
pub struct HopLimitGuard<'a> {
    control: &'a dyn SocketControl,
    original: u32,
    armed: bool,
}

impl<'a> HopLimitGuard<'a> {
    /// Saves the current value, then lowers it to `hop_limit`.
    pub fn engage(control: &'a dyn SocketControl, hop_limit: u32) -> Result<Self, InjectError> {
        let original = control.hop_limit().map_err(InjectError::TtlSet)?;
        control.set_hop_limit(hop_limit).map_err(InjectError::TtlSet)?;
        debug!("hop limit {} -> {} ({:?})", original, hop_limit, control.family());
        Ok(Self { control, original, armed: true })
    }

    pub fn original(&self) -> u32 {
        self.original
    }

    pub fn restore(mut self) -> Result<(), InjectError> {
        self.armed = false;
        self.control.set_hop_limit(self.original).map_err(InjectError::TtlRestore)
    }
}

impl Drop for HopLimitGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.control.set_hop_limit(self.original) {
                warn!("hop limit left at modified value, restore to {} failed: {}", self.original, e);
            }
        }
    }
}

/// Runs `send` with the socket's hop limit lowered to `hop_limit`.
///
/// A send failure wins over a restore failure; the latter is then only logged.
pub fn with_hop_limit<T>(
    control: &dyn SocketControl,
    hop_limit: u32,
    send: impl FnOnce() -> io::Result<T>,
) -> Result<T, InjectError> {
    let guard = HopLimitGuard::engage(control, hop_limit)?;
    let sent = send();
    let restored = guard.restore();
    match (sent, restored) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(InjectError::DecoyWrite(e)),
        (Err(e), Err(restore)) => {
            warn!("{}", restore);
            Err(InjectError::DecoyWrite(e))
        }
    }
}

/// Hop-limit trick bound to one connection.
pub struct HopTrick {
    pub control: Box<dyn SocketControl>,
    pub hop_limit: u32,
}
