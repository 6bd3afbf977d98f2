//! Command handlers for the User context.

use eventide_core::{Aggregate, Command, DomainError, Event, Runtime};

use crate::domain::aggregates::{Address, User};
use crate::domain::commands::{AddAddress, Create, IssueApiToken, TOKEN_KEY, UpdateFirstName};
use crate::domain::events::UserEvent;

/// Result of a successfully handled command.
#[derive(Debug)]
pub struct UserCommandResult {
    /// State after the command.
    pub user: User,
    /// The event produced and persisted.
    pub event: Event<UserEvent>,
}

/// A freshly issued API token. `token` is the only copy of the plaintext.
#[derive(Debug)]
pub struct IssuedApiToken {
    /// The user after the issue event.
    pub user: User,
    /// Public identifier of the token.
    pub token_id: String,
    /// The plaintext token.
    pub token: String,
}

async fn load_existing(runtime: &Runtime, user_id: &str) -> Result<User, DomainError> {
    runtime
        .load::<User>(user_id)
        .await?
        .ok_or_else(|| DomainError::AggregateNotFound {
            aggregate_type: User::AGGREGATE_TYPE.to_owned(),
            aggregate_id: user_id.to_owned(),
        })
}

async fn run<C>(runtime: &Runtime, user_id: &str, command: &C) -> Result<UserCommandResult, DomainError>
where
    C: Command<Aggregate = User>,
{
    let mut user = load_existing(runtime, user_id).await?;
    let event = runtime.execute(command, &mut user, None).await?;
    Ok(UserCommandResult { user, event })
}

/// Handles the `Create` command.
///
/// # Errors
///
/// Returns `DomainError::ValidationFailed` for a first name outside 3..=42
/// characters, and any pipeline error.
pub async fn handle_create(
    runtime: &Runtime,
    command: &Create,
) -> Result<UserCommandResult, DomainError> {
    let mut user = User::default();
    let event = runtime.execute(command, &mut user, None).await?;
    tracing::info!(user_id = %user.base.id, "user created");
    Ok(UserCommandResult { user, event })
}

/// Handles the `UpdateFirstName` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` for an unknown id, and any
/// pipeline error.
pub async fn handle_update_first_name(
    runtime: &Runtime,
    user_id: &str,
    first_name: &str,
) -> Result<UserCommandResult, DomainError> {
    run(
        runtime,
        user_id,
        &UpdateFirstName {
            first_name: first_name.to_owned(),
        },
    )
    .await
}

/// Handles the `AddAddress` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` for an unknown id, and any
/// pipeline error.
pub async fn handle_add_address(
    runtime: &Runtime,
    user_id: &str,
    address: Address,
) -> Result<UserCommandResult, DomainError> {
    run(runtime, user_id, &AddAddress { address }).await
}

/// Handles the `IssueApiToken` command and extracts the plaintext token
/// from the event's non-persisted data.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` for an unknown id, any pipeline
/// error, and `DomainError::CommandFailed` if the event carries no token.
pub async fn handle_issue_api_token(
    runtime: &Runtime,
    user_id: &str,
) -> Result<IssuedApiToken, DomainError> {
    let UserCommandResult { user, event } = run(runtime, user_id, &IssueApiToken).await?;
    let token = event
        .non_persisted
        .as_ref()
        .and_then(|extra| extra.get(TOKEN_KEY))
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| DomainError::CommandFailed("issued event carries no token".into()))?
        .to_owned();
    let UserEvent::ApiTokenIssued(issued) = event.data else {
        return Err(DomainError::CommandFailed(format!(
            "expected user.api_token_issued, got {}",
            event.event_type
        )));
    };
    Ok(IssuedApiToken {
        user,
        token_id: issued.token_id,
        token,
    })
}
