//! HTTP request handlers for API endpoints.
//!
//! Each handler module corresponds to a logical grouping of endpoints.
//! Handlers behind the middleware chain receive the request's
//! [`MiddlewareContext`] and answer through [`crate::api::dispatcher`].

pub mod accounts;
pub mod health;
pub mod transfers;

pub use accounts::{get_account_handler, list_transfers_handler, open_account_handler};
pub use health::health_handler;
pub use transfers::{batch_transfer_handler, transfer_handler};

use crate::api::middleware::MiddlewareContext;
use crate::domain::entities::Identity;
use crate::error::{AppError, AuthError};

/// Returns the request identity if it carries `role`.
///
/// # Errors
///
/// - `MalformedToken` if the request never passed the auth stage
/// - `Forbidden` if the role is missing
pub(crate) fn authorize<'c>(
    ctx: &'c MiddlewareContext,
    role: &str,
) -> Result<&'c Identity, AppError> {
    let identity = ctx.identity().ok_or_else(|| {
        AuthError::Malformed("request reached a handler without an identity".into())
    })?;
    identity.require_role(role)?;
    Ok(identity)
}
