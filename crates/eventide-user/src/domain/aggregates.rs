//! Aggregate root for the User context.

use chrono::{DateTime, Utc};
use eventide_core::{Aggregate, AggregateBase, Event};
use serde::{Deserialize, Serialize};

use super::events::UserEvent;
use super::tokens::hash_token;

/// A postal address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Country code.
    pub country: String,
    /// Region within the country.
    pub region: String,
}

/// An issued API token. The plaintext is never kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiToken {
    /// Public identifier of the token.
    pub token_id: String,
    /// Hex-encoded SHA-256 of the plaintext.
    pub token_hash: String,
    /// When the token was issued.
    pub issued_at: DateTime<Utc>,
}

/// A user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Identity, timestamps and version.
    #[serde(flatten)]
    pub base: AggregateBase,
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// Addresses in the order they were added.
    #[serde(default)]
    pub addresses: Vec<Address>,
    /// Issued API tokens, hashed.
    #[serde(default)]
    pub api_tokens: Vec<ApiToken>,
}

impl User {
    /// Returns the id of the issued token matching `token`, if any.
    #[must_use]
    pub fn verify_api_token(&self, token: &str) -> Option<&str> {
        let hash = hash_token(token);
        self.api_tokens
            .iter()
            .find(|issued| issued.token_hash == hash)
            .map(|issued| issued.token_id.as_str())
    }
}

impl Aggregate for User {
    const AGGREGATE_TYPE: &'static str = "user";
    type Event = UserEvent;

    fn base(&self) -> &AggregateBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AggregateBase {
        &mut self.base
    }

    fn apply(&mut self, event: &Event<UserEvent>) {
        match &event.data {
            UserEvent::CreatedV1(created) => {
                self.base.id.clone_from(&created.id);
                self.base.created_at = event.timestamp;
                self.first_name.clone_from(&created.first_name);
                self.last_name.clone_from(&created.last_name);
            }
            UserEvent::CreatedV2(created) => {
                self.base.id.clone_from(&created.id);
                self.base.created_at = event.timestamp;
                self.first_name.clone_from(&created.first_name);
                self.last_name.clone_from(&created.last_name);
                self.addresses.clone_from(&created.addresses);
            }
            UserEvent::FirstNameUpdated(updated) => {
                self.first_name.clone_from(&updated.first_name);
            }
            UserEvent::AddressAdded(added) => self.addresses.push(added.address.clone()),
            UserEvent::ApiTokenIssued(issued) => self.api_tokens.push(ApiToken {
                token_id: issued.token_id.clone(),
                token_hash: issued.token_hash.clone(),
                issued_at: event.timestamp,
            }),
        }
    }
}
