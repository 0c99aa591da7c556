use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

pub mod bincode;
pub mod id;
mod macros;
pub mod message;

pub use id::Fid;
pub use message::{FollowBody, Message, MessageBody, MessageHash, MessageKind, TsHash};

/// Seconds since the project epoch (2021-01-01T00:00:00Z).
///
/// Kept at 32 bits so it can be laid out big-endian at the front of a
/// [`TsHash`], where byte order must equal chronological order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(::bincode::Encode, ::bincode::Decode)]
pub struct Timestamp(pub u32);

impl Timestamp {
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(u32::MAX);

    /// Unix seconds of the epoch this timestamp counts from.
    pub const EPOCH_UNIX_SECS: u64 = 1_609_459_200;

    /// Current time, saturated to the representable range.
    pub fn now() -> Self {
        let unix_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("System clock before the Unix epoch")
            .as_secs();
        Self(u32::try_from(unix_secs.saturating_sub(Self::EPOCH_UNIX_SECS)).unwrap_or(u32::MAX))
    }

    /// Seconds elapsed between `earlier` and `self`; zero when `earlier`
    /// is in the future.
    pub fn seconds_since(self, earlier: Timestamp) -> u32 {
        self.0.saturating_sub(earlier.0)
    }

    pub fn to_be_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl From<u32> for Timestamp {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<Timestamp> for u32 {
    fn from(value: Timestamp) -> Self {
        value.0
    }
}

impl FromStr for Timestamp {
    type Err = <u32 as FromStr>::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(u32::from_str(s)?))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
