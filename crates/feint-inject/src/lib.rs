pub mod copy;
pub mod decoy;
pub mod dialer;
pub mod error;
pub mod hop;
pub mod writer;

pub use copy::{ReadFrom, Sink, SplitReader};
pub use decoy::{DecoyProvider, DecoySource, ProbeDecoy};
pub use dialer::{EvadingConn, EvadingDialer, StreamConn, StreamDialer};
pub use error::InjectError;
pub use hop::{with_hop_limit, HopLimitGuard, HopTrick};
pub use writer::{InjectionWriter, Progress};
