//! Query handlers for the User context.

use eventide_core::{Aggregate, DomainError, Runtime};
use serde::Serialize;

use crate::domain::aggregates::{Address, User};

/// Read-only view of a user. Token hashes are not exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    /// The user's identifier.
    pub user_id: String,
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// Known addresses, oldest first.
    pub addresses: Vec<Address>,
    /// Number of issued API tokens.
    pub api_token_count: usize,
    /// Number of events applied.
    pub version: u64,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.base.id.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            addresses: user.addresses.clone(),
            api_token_count: user.api_tokens.len(),
            version: user.version(),
        }
    }
}

fn not_found(user_id: &str) -> DomainError {
    DomainError::AggregateNotFound {
        aggregate_type: User::AGGREGATE_TYPE.to_owned(),
        aggregate_id: user_id.to_owned(),
    }
}

/// Retrieves a user from its persisted row.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no user has this id.
pub async fn get_user_by_id(runtime: &Runtime, user_id: &str) -> Result<UserView, DomainError> {
    let user = runtime
        .load::<User>(user_id)
        .await?
        .ok_or_else(|| not_found(user_id))?;
    Ok(UserView::from(&user))
}

/// Rebuilds a user from its event history, whatever schema versions it
/// was written with.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the user has no history, and
/// decode errors for unregistered event types.
pub async fn replay_user(runtime: &Runtime, user_id: &str) -> Result<UserView, DomainError> {
    let user = runtime.replay::<User>(user_id).await?;
    Ok(UserView::from(&user))
}

/// Resolves a plaintext API token to its token id.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no user has this id.
pub async fn authenticate_api_token(
    runtime: &Runtime,
    user_id: &str,
    token: &str,
) -> Result<Option<String>, DomainError> {
    let user = runtime
        .load::<User>(user_id)
        .await?
        .ok_or_else(|| not_found(user_id))?;
    Ok(user.verify_api_token(token).map(str::to_owned))
}
