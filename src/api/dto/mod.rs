//! Data Transfer Objects for API requests and responses.
//!
//! All DTOs use Serde for JSON serialization/deserialization and validator
//! for input validation.

pub mod accounts;
pub mod health;
pub mod transfers;

use regex::Regex;
use std::sync::LazyLock;

/// Account ids: letters, digits, `-` and `_`.
pub(crate) static ACCOUNT_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());
