//! Domain events for the User aggregate.
//!
//! `user.created` has two schema versions. Commands emit version 2, which
//! carries the initial addresses; version 1 stays registered so older
//! histories keep replaying.

use eventide_core::event::unknown_kind;
use eventide_core::{EventData, EventKind};
use serde::{Deserialize, Serialize};

use super::aggregates::Address;

/// Kind of [`CreatedV1`].
pub const USER_CREATED_V1: EventKind = EventKind::new("user", "created", 1);

/// Kind of [`CreatedV2`].
pub const USER_CREATED_V2: EventKind = EventKind::new("user", "created", 2);

/// Kind of [`FirstNameUpdatedV1`].
pub const USER_FIRST_NAME_UPDATED: EventKind = EventKind::new("user", "first_name_updated", 1);

/// Kind of [`AddressAddedV1`].
pub const USER_ADDRESS_ADDED: EventKind = EventKind::new("user", "address_added", 1);

/// Kind of [`ApiTokenIssuedV1`].
pub const USER_API_TOKEN_ISSUED: EventKind = EventKind::new("user", "api_token_issued", 1);

/// First revision of the creation event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedV1 {
    /// Identifier of the new user.
    pub id: String,
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
}

/// Creation event with initial addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedV2 {
    /// Identifier of the new user.
    pub id: String,
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// Initial addresses.
    #[serde(default)]
    pub addresses: Vec<Address>,
}

/// The first name was replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstNameUpdatedV1 {
    /// The new first name.
    pub first_name: String,
}

/// An address was appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressAddedV1 {
    /// The added address.
    pub address: Address,
}

/// A token was issued. Only the SHA-256 hash is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiTokenIssuedV1 {
    /// Public identifier of the token.
    pub token_id: String,
    /// Hex-encoded SHA-256 of the plaintext.
    pub token_hash: String,
}

/// Event payload variants for the User aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserEvent {
    CreatedV1(CreatedV1),
    CreatedV2(CreatedV2),
    FirstNameUpdated(FirstNameUpdatedV1),
    AddressAdded(AddressAddedV1),
    ApiTokenIssued(ApiTokenIssuedV1),
}

impl EventData for UserEvent {
    const KINDS: &'static [EventKind] = &[
        USER_CREATED_V1,
        USER_CREATED_V2,
        USER_FIRST_NAME_UPDATED,
        USER_ADDRESS_ADDED,
        USER_API_TOKEN_ISSUED,
    ];

    fn kind(&self) -> EventKind {
        match self {
            Self::CreatedV1(_) => USER_CREATED_V1,
            Self::CreatedV2(_) => USER_CREATED_V2,
            Self::FirstNameUpdated(_) => USER_FIRST_NAME_UPDATED,
            Self::AddressAdded(_) => USER_ADDRESS_ADDED,
            Self::ApiTokenIssued(_) => USER_API_TOKEN_ISSUED,
        }
    }

    fn to_data(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Self::CreatedV1(data) => serde_json::to_value(data),
            Self::CreatedV2(data) => serde_json::to_value(data),
            Self::FirstNameUpdated(data) => serde_json::to_value(data),
            Self::AddressAdded(data) => serde_json::to_value(data),
            Self::ApiTokenIssued(data) => serde_json::to_value(data),
        }
    }

    fn from_data(kind: EventKind, data: serde_json::Value) -> Result<Self, serde_json::Error> {
        match (kind.action, kind.schema_version) {
            ("created", 1) => serde_json::from_value(data).map(Self::CreatedV1),
            ("created", 2) => serde_json::from_value(data).map(Self::CreatedV2),
            ("first_name_updated", 1) => serde_json::from_value(data).map(Self::FirstNameUpdated),
            ("address_added", 1) => serde_json::from_value(data).map(Self::AddressAdded),
            ("api_token_issued", 1) => serde_json::from_value(data).map(Self::ApiTokenIssued),
            _ => Err(unknown_kind(kind)),
        }
    }
}
