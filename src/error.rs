//! Error taxonomy. Every component returns a discriminated outcome; nothing
//! here is ever thrown across a component boundary as a panic. Only
//! `ServerError` can legitimately terminate the process (fatal startup).

use std::{error::Error, fmt::Display};

#[derive(Debug)]
pub enum SchemaError {
    /// Lookup by a name that was never registered.
    UnknownSchema { name: String },
    /// A required schema file was missing at startup.
    MissingRequired { name: String },
    /// The payload failed validation against a known schema.
    Invalid { name: String, reason: String },
    /// The schema descriptor itself (on disk) could not be parsed.
    MalformedDescriptor { path: String, reason: String },
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaError::UnknownSchema { name } => write!(f, "unknown schema `{name}`"),
            SchemaError::MissingRequired { name } => {
                write!(f, "required schema `{name}` is missing")
            }
            SchemaError::Invalid { name, reason } => {
                write!(f, "payload invalid against schema `{name}`: {reason}")
            }
            SchemaError::MalformedDescriptor { path, reason } => {
                write!(f, "malformed schema descriptor at {path}: {reason}")
            }
        }
    }
}

impl Error for SchemaError {}

/// Protocol / authorization-state failures raised while dispatching an
/// inbound message. These never close the session — the caller logs and
/// drops.
#[derive(Debug)]
pub enum DispatchError {
    ParseFailure,
    UnknownMessageType(String),
    SchemaViolation(SchemaError),
    UnknownRoom,
    MatchEnded,
    PlayerDead,
    StillReloading,
    OutOfAmmo,
    WeaponOnCooldown,
    MagazineFull,
    RollOnCooldown,
    CrateUnavailable,
    OutOfPickupRange,
    /// The embedder's `ServerConfig.weapons` map has no profile for the
    /// weapon kind the action needed.
    WeaponMisconfigured(String),
}

impl Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::ParseFailure => write!(f, "inbound message failed to parse"),
            DispatchError::UnknownMessageType(t) => write!(f, "unknown message type `{t}`"),
            DispatchError::SchemaViolation(e) => write!(f, "schema violation: {e}"),
            DispatchError::UnknownRoom => write!(f, "player has no room"),
            DispatchError::MatchEnded => write!(f, "match has already ended"),
            DispatchError::PlayerDead => write!(f, "player is not alive"),
            DispatchError::StillReloading => write!(f, "weapon is reloading"),
            DispatchError::OutOfAmmo => write!(f, "weapon is out of ammo"),
            DispatchError::WeaponOnCooldown => write!(f, "weapon is on cooldown"),
            DispatchError::MagazineFull => write!(f, "magazine is already full"),
            DispatchError::RollOnCooldown => write!(f, "roll is on cooldown"),
            DispatchError::CrateUnavailable => write!(f, "weapon crate is unavailable"),
            DispatchError::OutOfPickupRange => write!(f, "player is out of pickup range"),
            DispatchError::WeaponMisconfigured(kind) => {
                write!(f, "no weapon profile configured for {kind}")
            }
        }
    }
}

impl Error for DispatchError {}

/// Fatal startup conditions. The only error in this crate that should ever
/// terminate the process.
#[derive(Debug)]
pub enum ServerError {
    SchemaLoad(SchemaError),
    BindFailure(String),
}

impl Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::SchemaLoad(e) => write!(f, "fatal: schema registry failed to load: {e}"),
            ServerError::BindFailure(addr) => write!(f, "fatal: failed to bind {addr}"),
        }
    }
}

impl Error for ServerError {}

impl From<SchemaError> for ServerError {
    fn from(value: SchemaError) -> Self {
        ServerError::SchemaLoad(value)
    }
}
