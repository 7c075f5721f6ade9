#![no_std]
#[cfg(feature = "std")]
extern crate std;
extern crate alloc;

pub mod settings;
pub mod signature;

pub use settings::{window, Settings, SettingsField};
pub use signature::AuthSignature;

/// Hop limit applied to the decoy when the settings string leaves the field empty.
pub const DEFAULT_TTL: u32 = 8;

/// `TCP_MD5SIG` option name at `IPPROTO_TCP` level.
pub const TCP_MD5SIG: i32 = 14;

/// Key buffer capacity of the signature option.
pub const SIGNATURE_KEY_MAX: usize = 80;

/// Bytes peeked from the real stream to pick a default decoy.
pub const DECOY_PEEK_LEN: usize = 4;

pub type FeintResult<T> = Result<T, FeintError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeintError {
    /// A field of the settings string failed to parse.
    InvalidSettings(SettingsField),
}

impl core::fmt::Display for FeintError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FeintError::InvalidSettings(field) => write!(f, "failed to parse {}", field),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FeintError {}
