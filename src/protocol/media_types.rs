use serde::{Deserialize, Serialize};
use std::ops::{BitOr, BitOrAssign};

/// Media kinds requested in a data handshake, sent as a bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaTypes(u32);

impl MediaTypes {
    pub const AUDIO: MediaTypes = MediaTypes(1);
    pub const VIDEO: MediaTypes = MediaTypes(1 << 1);
    pub const DESKTOP_SHARE: MediaTypes = MediaTypes(1 << 2);
    pub const TRANSCRIPT: MediaTypes = MediaTypes(1 << 3);
    pub const CHAT: MediaTypes = MediaTypes(1 << 4);
    pub const ALL: MediaTypes = MediaTypes(1 << 5);

    pub const fn empty() -> Self {
        MediaTypes(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        MediaTypes(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: MediaTypes) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for MediaTypes {
    type Output = MediaTypes;

    fn bitor(self, rhs: MediaTypes) -> MediaTypes {
        MediaTypes(self.0 | rhs.0)
    }
}

impl BitOrAssign for MediaTypes {
    fn bitor_assign(&mut self, rhs: MediaTypes) {
        self.0 |= rhs.0;
    }
}
