use alloc::vec::Vec;
use core::str::FromStr;

use crate::{FeintError, FeintResult, DEFAULT_TTL};

/// Field of the settings string, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    Offset,
    Length,
    Ttl,
    AuthSignature,
}

impl core::fmt::Display for SettingsField {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            SettingsField::Offset => "offset",
            SettingsField::Length => "length",
            SettingsField::Ttl => "TTL",
            SettingsField::AuthSignature => "MD5 signature flag",
        };
        f.write_str(name)
    }
}

/// Decoy injection parameters for one dialer.
///
/// `length` caps the decoy and marks where in the outgoing stream splitting
/// stops. An `offset` past the end of `decoy` is legal and disables injection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Settings {
    /// Empty selects the default decoy for the first written bytes.
    pub decoy: Vec<u8>,
    pub offset: usize,
    pub length: usize,
    /// Hop limit for the decoy segment. `None` leaves the socket untouched.
    pub ttl: Option<u32>,
    pub auth_signature: bool,
}

impl Settings {
    /// Effective decoy slice for a given source of decoy bytes.
    pub fn window<'a>(&self, decoy: &'a [u8]) -> &'a [u8] {
        window(decoy, self.offset, self.length)
    }

    pub fn uses_default_decoy(&self) -> bool {
        self.decoy.is_empty()
    }

    /// False when no decoy byte can ever be sent with these settings.
    pub fn injects_decoy(&self) -> bool {
        self.length > 0 && (self.uses_default_decoy() || !self.window(&self.decoy).is_empty())
    }
}

/// `decoy[offset..]` capped at `length` bytes; empty when `offset` is past the end.
pub fn window(decoy: &[u8], offset: usize, length: usize) -> &[u8] {
    if offset >= decoy.len() {
        return &[];
    }
    let tail = &decoy[offset..];
    &tail[..tail.len().min(length)]
}

/// Parses `"<decoy>:<offset>:<length>:<ttl>:<auth>"`. Every field may be empty.
impl FromStr for Settings {
    type Err = FeintError;

    fn from_str(raw: &str) -> FeintResult<Self> {
        let mut settings = Settings { ttl: Some(DEFAULT_TTL), ..Settings::default() };
        let mut parts = raw.split(':');

        if let Some(decoy) = parts.next().filter(|p| !p.is_empty()) {
            settings.decoy = decoy.as_bytes().to_vec();
        }
        if let Some(offset) = parts.next().filter(|p| !p.is_empty()) {
            settings.offset = parse_count(offset, SettingsField::Offset)?;
        }
        if let Some(length) = parts.next().filter(|p| !p.is_empty()) {
            settings.length = parse_count(length, SettingsField::Length)?;
        }
        if let Some(ttl) = parts.next().filter(|p| !p.is_empty()) {
            let ttl: u32 = ttl.parse().map_err(|_| FeintError::InvalidSettings(SettingsField::Ttl))?;
            settings.ttl = if ttl == 0 { None } else { Some(ttl) };
        }
        if let Some(flag) = parts.next().filter(|p| !p.is_empty()) {
            settings.auth_signature = parse_flag(flag)
                .ok_or(FeintError::InvalidSettings(SettingsField::AuthSignature))?;
        }
        Ok(settings)
    }
}

fn parse_count(raw: &str, field: SettingsField) -> FeintResult<usize> {
    raw.parse::<usize>().map_err(|_| FeintError::InvalidSettings(field))
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
