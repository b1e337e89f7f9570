//! Timestamps and clocks.
//!
//! Expiry and date filters compare timestamps **as strings**. The ordering of
//! [`Timestamp`] is the lexicographic ordering of its text, so every value is
//! held in the canonical form `YYYY-MM-DDTHH:MM:SS.ffffffZ`: UTC, zero
//! padded, fixed width. Caller-supplied RFC 3339 values are normalised into
//! that form on the way in.

use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult, require_non_blank};

const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// A point in time in a lexicographically sortable text encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp {
    // Declared first: the derived ordering is the text ordering.
    text: String,
    at: DateTime<Utc>,
}

impl Timestamp {
    /// Current wall-clock time in canonical form.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Canonical form of `at`, truncated to microseconds.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        let at = at.trunc_subsecs(6);
        Self {
            text: at.format(CANONICAL_FORMAT).to_string(),
            at,
        }
    }

    /// Accept a caller-supplied RFC 3339 timestamp, normalised to UTC.
    ///
    /// Blank or non-RFC 3339 input is an argument error.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let raw = require_non_blank(raw, "timestamp")?;
        let at = DateTime::parse_from_rfc3339(&raw).map_err(|e| {
            DomainError::invalid_argument(format!("timestamp '{raw}' is not RFC 3339: {e}"))
        })?;
        Ok(Self::from_datetime(at.with_timezone(&Utc)))
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        self.at
    }
}

impl TryFrom<String> for Timestamp {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Timestamp> for String {
    fn from(value: Timestamp) -> Self {
        value.text
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self::from_datetime(value)
    }
}

impl core::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Source of "now" for expiry checks.
pub trait Clock: Send + Sync + core::fmt::Debug {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Default, Copy, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that only moves when told to. Used for deterministic tests.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<Timestamp>,
}

impl FixedClock {
    pub fn new(now: impl Into<Timestamp>) -> Self {
        Self {
            now: RwLock::new(now.into()),
        }
    }

    pub fn set(&self, now: impl Into<Timestamp>) {
        *self.now.write().unwrap_or_else(PoisonError::into_inner) = now.into();
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.now.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
