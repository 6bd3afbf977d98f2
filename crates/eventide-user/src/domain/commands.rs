//! Commands for the User context.

use async_trait::async_trait;
use eventide_core::id::IdGenerator;
use eventide_core::{Aggregate, Command, DomainError, Payload, Transaction};

use super::aggregates::{Address, User};
use super::events::{AddressAddedV1, ApiTokenIssuedV1, CreatedV2, FirstNameUpdatedV1, UserEvent};
use super::tokens::{generate_token, hash_token};

/// Shortest accepted first name, in characters.
pub const FIRST_NAME_MIN_CHARS: usize = 3;

/// Longest accepted first name, in characters.
pub const FIRST_NAME_MAX_CHARS: usize = 42;

/// Key of the plaintext token in an issued event's non-persisted data.
pub const TOKEN_KEY: &str = "token";

fn validate_first_name(first_name: &str) -> Result<(), DomainError> {
    let length = first_name.chars().count();
    if length < FIRST_NAME_MIN_CHARS {
        return Err(DomainError::ValidationFailed("first name is too short".into()));
    }
    if length > FIRST_NAME_MAX_CHARS {
        return Err(DomainError::ValidationFailed("first name is too long".into()));
    }
    Ok(())
}

fn require_existing(user: &User) -> Result<(), DomainError> {
    if user.id().is_empty() {
        return Err(DomainError::ValidationFailed("user has not been created".into()));
    }
    Ok(())
}

/// Creates a user, emitting `user.created.2`.
#[derive(Debug, Clone)]
pub struct Create {
    /// First name, 3 to 42 characters.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// Initial addresses.
    pub addresses: Vec<Address>,
}

#[async_trait]
impl Command for Create {
    type Aggregate = User;

    fn command_type(&self) -> &'static str {
        "user.create"
    }

    async fn validate(&self, _tx: &mut dyn Transaction, user: &User) -> Result<(), DomainError> {
        if !user.id().is_empty() {
            return Err(DomainError::ValidationFailed(format!("user {} already exists", user.id())));
        }
        validate_first_name(&self.first_name)
    }

    fn build_payload(&self, ids: &dyn IdGenerator) -> Result<Payload<UserEvent>, DomainError> {
        Ok(Payload::new(UserEvent::CreatedV2(CreatedV2 {
            id: ids.next_id(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            addresses: self.addresses.clone(),
        })))
    }
}

/// Replaces the first name of an existing user.
#[derive(Debug, Clone)]
pub struct UpdateFirstName {
    /// The new first name, 3 to 42 characters.
    pub first_name: String,
}

#[async_trait]
impl Command for UpdateFirstName {
    type Aggregate = User;

    fn command_type(&self) -> &'static str {
        "user.update_first_name"
    }

    async fn validate(&self, _tx: &mut dyn Transaction, user: &User) -> Result<(), DomainError> {
        require_existing(user)?;
        validate_first_name(&self.first_name)
    }

    fn build_payload(&self, _ids: &dyn IdGenerator) -> Result<Payload<UserEvent>, DomainError> {
        Ok(Payload::new(UserEvent::FirstNameUpdated(FirstNameUpdatedV1 {
            first_name: self.first_name.clone(),
        })))
    }
}

/// Adds an address. The same country and region cannot be added twice.
#[derive(Debug, Clone)]
pub struct AddAddress {
    /// The address to add.
    pub address: Address,
}

#[async_trait]
impl Command for AddAddress {
    type Aggregate = User;

    fn command_type(&self) -> &'static str {
        "user.add_address"
    }

    async fn validate(&self, _tx: &mut dyn Transaction, user: &User) -> Result<(), DomainError> {
        require_existing(user)?;
        if self.address.country.trim().is_empty() {
            return Err(DomainError::ValidationFailed("country must not be empty".into()));
        }
        if user.addresses.contains(&self.address) {
            return Err(DomainError::ValidationFailed(format!(
                "address {}/{} already recorded",
                self.address.country, self.address.region
            )));
        }
        Ok(())
    }

    fn build_payload(&self, _ids: &dyn IdGenerator) -> Result<Payload<UserEvent>, DomainError> {
        Ok(Payload::new(UserEvent::AddressAdded(AddressAddedV1 {
            address: self.address.clone(),
        })))
    }
}

/// Issues a new API token. The event stores the token's hash; the
/// plaintext travels only in the event's non-persisted data under
/// [`TOKEN_KEY`].
#[derive(Debug, Clone, Copy)]
pub struct IssueApiToken;

#[async_trait]
impl Command for IssueApiToken {
    type Aggregate = User;

    fn command_type(&self) -> &'static str {
        "user.issue_api_token"
    }

    async fn validate(&self, _tx: &mut dyn Transaction, user: &User) -> Result<(), DomainError> {
        require_existing(user)
    }

    fn build_payload(&self, ids: &dyn IdGenerator) -> Result<Payload<UserEvent>, DomainError> {
        let token = generate_token();
        Ok(Payload::new(UserEvent::ApiTokenIssued(ApiTokenIssuedV1 {
            token_id: ids.next_id(),
            token_hash: hash_token(&token),
        }))
        .with_non_persisted(serde_json::json!({ TOKEN_KEY: token })))
    }
}
