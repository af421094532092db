//! Identifier types for the persona agent.
//!
//! - [`MemoryId`] is a time-ordered `UUIDv7`, so two records created in
//!   sequence always compare in creation order.
//! - [`UserId`] wraps the caller-supplied account key (an e-mail address or
//!   any other stable string) and doubles as the collection namespace.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Declare a UUID newtype with a consistent API.
macro_rules! define_uuid_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[repr(transparent)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl Default for $name {
            #[inline]
            fn default() -> Self {
                Self::new()
            }
        }

        impl $name {
            /// Create a new time-ordered identifier.
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Wrap an existing UUID.
            #[inline]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Borrow the underlying UUID.
            #[inline]
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            #[inline]
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            #[inline]
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

define_uuid_id!(
    /// Identifier for a stored memory record.
    MemoryId
);

/// Errors returned when parsing a [`UserId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIdError {
    /// Empty (or whitespace-only) identifier.
    Empty,
    /// Exceeds the maximum accepted length.
    TooLong {
        /// Maximum allowed length.
        max: usize,
        /// Actual length received.
        got: usize,
    },
}

impl fmt::Display for UserIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "user id must not be empty"),
            Self::TooLong { max, got } => write!(f, "user id too long: got {got}, max {max}"),
        }
    }
}

impl std::error::Error for UserIdError {}

const SLUG_MAX_CHARS: usize = 32;
const KEY_DIGEST_BYTES: usize = 16;

/// Stable user key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Hard ceiling to prevent pathological payloads.
    pub const MAX_LEN: usize = 254;

    /// Build a validated `UserId` (trimmed, non-empty, bounded length).
    ///
    /// # Errors
    /// Returns `UserIdError` if the input is empty or too long.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, UserIdError> {
        let s = raw.as_ref().trim();
        if s.is_empty() {
            return Err(UserIdError::Empty);
        }
        if s.len() > Self::MAX_LEN {
            return Err(UserIdError::TooLong {
                max: Self::MAX_LEN,
                got: s.len(),
            });
        }
        Ok(Self(s.to_owned()))
    }

    /// Borrow as `&str`.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Namespace-safe slug: ASCII alphanumerics kept, everything else `_`.
    ///
    /// Readable but lossy; distinct ids can share a slug.
    #[must_use]
    pub fn collection_slug(&self) -> String {
        self.0
            .chars()
            .take(SLUG_MAX_CHARS)
            .map(|ch| {
                if ch.is_ascii_alphanumeric() {
                    ch.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect()
    }

    /// Collection key: the slug followed by a hex SHA-256 prefix of the raw id.
    ///
    /// Distinct ids get distinct keys.
    #[must_use]
    pub fn collection_key(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        let mut key = self.collection_slug();
        key.push('_');
        for byte in &digest[..KEY_DIGEST_BYTES] {
            key.push_str(&format!("{byte:02x}"));
        }
        key
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserId {
    type Err = UserIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
