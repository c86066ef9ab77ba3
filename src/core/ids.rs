//! Identifier types for conversations and council models.
//!
//! Conversation ids are opaque UUID newtypes: they are generated once when a
//! session is created and never change afterwards. Model ids are validated
//! routing keys such as `meta-llama/llama-3.1-8b-instruct`.
//!
//! ## Cargo features used by this module
//! - `uuid_v7`: generate time-ordered `UUIDv7` conversation ids.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate an ID with good DB insert locality when `uuid_v7` is enabled.
#[inline]
#[must_use]
fn uuid_time_ordered() -> Uuid {
    #[cfg(feature = "uuid_v7")]
    {
        Uuid::now_v7()
    }
    #[cfg(not(feature = "uuid_v7"))]
    {
        Uuid::new_v4()
    }
}

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
        pub struct $name(Uuid);

        impl $name {
            /// Create a new identifier.
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(uuid_time_ordered())
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

        impl Default for $name {
            #[inline]
            fn default() -> Self {
                Self::new()
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
    /// Identifier for a conversation session.
    ///
    /// Assigned by the store at creation time, stable for the session's lifetime.
    ConversationId
);

/// Errors returned when parsing/validating a [`ModelId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelIdError {
    /// Empty (or whitespace-only) identifier.
    Empty,
    /// Exceeds the maximum accepted length.
    TooLong {
        /// Maximum allowed length.
        max: usize,
        /// Actual length received.
        got: usize,
    },
    /// Contains a disallowed character.
    InvalidChar {
        /// The invalid character.
        ch: char,
        /// The index where it was found.
        index: usize,
    },
}

impl fmt::Display for ModelIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "model id must not be empty"),
            Self::TooLong { max, got } => write!(f, "model id too long: got {got}, max {max}"),
            Self::InvalidChar { ch, index } => {
                write!(
                    f,
                    "model id contains invalid character {ch:?} at index {index}"
                )
            }
        }
    }
}

impl std::error::Error for ModelIdError {}

/// Identifier for a council model (provider routing key).
///
/// Examples:
/// - `meta-llama/llama-3.1-8b-instruct`
/// - `nvidia/nemotron-nano-12b-v2-vl:free`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelId(String);

impl ModelId {
    /// Hard ceiling to prevent pathological payloads.
    pub const MAX_LEN: usize = 192;

    /// Build a validated `ModelId`.
    ///
    /// Rules:
    /// - Non-empty after trimming.
    /// - Max length limited.
    /// - Conservative ASCII set: `[A-Za-z0-9._:/+-@]`.
    ///
    /// # Errors
    /// Returns `ModelIdError` if the input is empty, too long, or contains invalid characters.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ModelIdError> {
        let s = raw.as_ref().trim();

        if s.is_empty() {
            return Err(ModelIdError::Empty);
        }
        if s.len() > Self::MAX_LEN {
            return Err(ModelIdError::TooLong {
                max: Self::MAX_LEN,
                got: s.len(),
            });
        }

        for (i, ch) in s.chars().enumerate() {
            let ok =
                ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | ':' | '/' | '-' | '+' | '@');
            if !ok {
                return Err(ModelIdError::InvalidChar { ch, index: i });
            }
        }

        Ok(Self(s.to_owned()))
    }

    /// Wrap a compile-time constant that is known to pass [`ModelId::new`].
    pub(crate) fn from_known(raw: &str) -> Self {
        Self(raw.to_owned())
    }

    /// Borrow as `&str`.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelId {
    type Err = ModelIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<ModelId> for String {
    fn from(value: ModelId) -> Self {
        value.0
    }
}

impl TryFrom<String> for ModelId {
    type Error = ModelIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

// ===== Rusqlite integration ================================================

mod rusqlite_impl {
    use super::ConversationId;

    use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};

    impl ToSql for ConversationId {
        fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
            // Stored as TEXT so rows stay readable from the sqlite shell
            Ok(ToSqlOutput::Owned(Value::Text(self.0.to_string())))
        }
    }

    impl FromSql for ConversationId {
        fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
            match value {
                ValueRef::Text(t) => {
                    let s = std::str::from_utf8(t).map_err(|e| FromSqlError::Other(Box::new(e)))?;
                    uuid::Uuid::parse_str(s)
                        .map(Self)
                        .map_err(|e| FromSqlError::Other(Box::new(e)))
                }
                _ => Err(FromSqlError::InvalidType),
            }
        }
    }
}
