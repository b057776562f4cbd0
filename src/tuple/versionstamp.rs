//! A 12-byte identifier: a 10-byte transaction version plus a 2-byte user
//! version, following the FoundationDB tuple layer's versionstamp type.
//!
//! A versionstamp is "incomplete" until a transaction version is assigned to
//! it (this crate has no transaction engine that produces one, so every
//! versionstamp constructed here is either incomplete or carries a
//! caller-supplied transaction version). Incomplete versionstamps sort after
//! all complete ones, since the unset transaction version is encoded as
//! ten `0xFF` bytes.

pub const LENGTH: usize = 12;
const TR_VERSION_LEN: usize = 10;
const UNSET_TR_VERSION: [u8; TR_VERSION_LEN] = [0xFF; TR_VERSION_LEN];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Versionstamp {
    tr_version: Option<[u8; TR_VERSION_LEN]>,
    user_version: u16,
}

impl Versionstamp {
    pub fn incomplete(user_version: u16) -> Self {
        Self { tr_version: None, user_version }
    }

    pub fn complete(tr_version: [u8; TR_VERSION_LEN], user_version: u16) -> Self {
        Self { tr_version: Some(tr_version), user_version }
    }

    pub fn is_complete(&self) -> bool {
        self.tr_version.is_some()
    }

    pub fn user_version(&self) -> u16 {
        self.user_version
    }

    pub fn tr_version(&self) -> Option<&[u8; TR_VERSION_LEN]> {
        self.tr_version.as_ref()
    }

    pub fn to_bytes(self) -> [u8; LENGTH] {
        let mut out = [0u8; LENGTH];
        out[..TR_VERSION_LEN].copy_from_slice(&self.tr_version.unwrap_or(UNSET_TR_VERSION));
        out[TR_VERSION_LEN..].copy_from_slice(&self.user_version.to_be_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < LENGTH {
            return None;
        }
        let mut tr = [0u8; TR_VERSION_LEN];
        tr.copy_from_slice(&bytes[..TR_VERSION_LEN]);
        let tr_version = if tr == UNSET_TR_VERSION { None } else { Some(tr) };
        let user_version = u16::from_be_bytes([bytes[TR_VERSION_LEN], bytes[TR_VERSION_LEN + 1]]);
        Some(Self { tr_version, user_version })
    }
}
