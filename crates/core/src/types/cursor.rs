//! The resumable pagination cursor for page-by-page catalog sync.
//!
//! Shopify's REST pagination hands back an opaque `page_info` token in the
//! `Link` response header. The cursor persisted between sync runs is either
//! "before the first page", one of those tokens, or "pagination exhausted".
//! The persisted string encodings (`START`, the raw token, `END`) match what
//! each state round-trips through the state store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const START: &str = "START";
const END: &str = "END";

/// Position in the paginated product listing.
///
/// Lifecycle: `Start → Page(token)* → End`. `End` is terminal until an
/// explicit reset transitions back to `Start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum SyncCursor {
    /// No page fetched yet; the pagination parameter is omitted.
    #[default]
    Start,
    /// Opaque `page_info` token marking the next page to fetch.
    Page(String),
    /// Pagination exhausted; sync is complete.
    End,
}

/// Error parsing a persisted cursor value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CursorParseError {
    /// An empty string is not a valid token.
    #[error("cursor token must not be empty")]
    Empty,
}

impl SyncCursor {
    /// Build a cursor from an opaque page token.
    ///
    /// # Errors
    ///
    /// Returns [`CursorParseError::Empty`] for an empty token.
    pub fn page(token: impl Into<String>) -> Result<Self, CursorParseError> {
        let token = token.into();
        if token.is_empty() {
            return Err(CursorParseError::Empty);
        }
        Ok(Self::Page(token))
    }

    /// The `page_info` query parameter value, if this cursor names a page.
    #[must_use]
    pub fn as_page_info(&self) -> Option<&str> {
        match self {
            Self::Page(token) => Some(token),
            Self::Start | Self::End => None,
        }
    }

    /// Whether pagination has been exhausted.
    #[must_use]
    pub const fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }
}

impl fmt::Display for SyncCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str(START),
            Self::Page(token) => f.write_str(token),
            Self::End => f.write_str(END),
        }
    }
}

impl FromStr for SyncCursor {
    type Err = CursorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            START => Ok(Self::Start),
            END => Ok(Self::End),
            "" => Err(CursorParseError::Empty),
            token => Ok(Self::Page(token.to_string())),
        }
    }
}

impl TryFrom<String> for SyncCursor {
    type Error = CursorParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SyncCursor> for String {
    fn from(cursor: SyncCursor) -> Self {
        cursor.to_string()
    }
}
