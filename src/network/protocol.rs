//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! All messages are serialized as JSON text frames.
//!
//! Snapshot messages are full replacements: the client must treat each
//! `gamestate_*` map as the exhaustive set of entities it may currently
//! see, discarding anything absent from it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::hex::Hex;
use crate::game::commands::Command;
use crate::game::entities::{
    Battle, BattleId, Building, BuildingId, BuildingKind, Group, GroupId, UnitId,
};
use crate::game::tile::{Resource, Tile};
use crate::game::world::{PlayerId, Relation};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Authenticate with the server.
    Auth(AuthRequest),

    /// Request tile data for specific hexes.
    RequestTiles {
        /// Hexes of interest.
        hexes: Vec<Hex>,
    },

    /// Order a group to move toward a target hex.
    RequestMovement {
        /// Group to move.
        selection: GroupId,
        /// Destination hex.
        target: Hex,
    },

    /// Construct a building.
    RequestConstruction {
        /// Target hex.
        pos: Hex,
        /// Building type key.
        kind: BuildingKind,
    },

    /// Upgrade a building one level.
    RequestUpgrade {
        /// Building to upgrade.
        building: BuildingId,
    },

    /// Demolish a building.
    RequestDemolish {
        /// Building to remove.
        building: BuildingId,
    },

    /// Disband a group.
    RequestDisband {
        /// Group to disband.
        group: GroupId,
    },

    /// Move resources between a group and its tile. Positive amounts load
    /// the group.
    RequestTransfer {
        /// Group involved.
        group: GroupId,
        /// Resource kind.
        resource: Resource,
        /// Signed amount.
        amount: f64,
    },

    /// Move a unit from the tile pool into a group.
    RequestUnitAdd {
        /// Receiving group.
        group: GroupId,
        /// Unit to add.
        unit: UnitId,
    },

    /// Move a unit from a group into the tile pool.
    RequestUnitRemove {
        /// Source group.
        group: GroupId,
        /// Unit to remove.
        unit: UnitId,
    },

    /// Query the relation between two players.
    RequestRelation {
        /// First player.
        a: PlayerId,
        /// Second player.
        b: PlayerId,
    },

    /// Change the caller's relation to another player.
    RequestRelationChange {
        /// The other player.
        other: PlayerId,
        /// New stance.
        relation: Relation,
    },

    /// Ping for latency measurement.
    Ping {
        /// Client timestamp, echoed back.
        timestamp: u64,
    },

    /// Player is leaving.
    Leave,
}

/// Authentication request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    /// Authentication token (JWT or session token).
    pub token: String,
    /// Client version for compatibility check.
    pub client_version: String,
}

impl ClientMessage {
    /// Translate into a validated game command, if this message is one.
    /// Auth, ping, and leave are session concerns, not commands.
    pub fn to_command(&self) -> Option<Command> {
        match self {
            ClientMessage::RequestTiles { hexes } => Some(Command::RequestTiles {
                hexes: hexes.clone(),
            }),
            ClientMessage::RequestMovement { selection, target } => Some(Command::Move {
                group: *selection,
                target: *target,
            }),
            ClientMessage::RequestConstruction { pos, kind } => Some(Command::Construct {
                pos: *pos,
                kind: *kind,
            }),
            ClientMessage::RequestUpgrade { building } => Some(Command::Upgrade {
                building: *building,
            }),
            ClientMessage::RequestDemolish { building } => Some(Command::Demolish {
                building: *building,
            }),
            ClientMessage::RequestDisband { group } => Some(Command::Disband { group: *group }),
            ClientMessage::RequestTransfer {
                group,
                resource,
                amount,
            } => Some(Command::Transfer {
                group: *group,
                resource: *resource,
                amount: *amount,
            }),
            ClientMessage::RequestUnitAdd { group, unit } => Some(Command::UnitAdd {
                group: *group,
                unit: *unit,
            }),
            ClientMessage::RequestUnitRemove { group, unit } => Some(Command::UnitRemove {
                group: *group,
                unit: *unit,
            }),
            ClientMessage::RequestRelation { a, b } => {
                Some(Command::QueryRelation { a: *a, b: *b })
            }
            ClientMessage::RequestRelationChange { other, relation } => {
                Some(Command::SetRelation {
                    other: *other,
                    relation: *relation,
                })
            }
            ClientMessage::Auth(_) | ClientMessage::Ping { .. } | ClientMessage::Leave => None,
        }
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Authentication result.
    AuthResult(AuthResult),

    /// Tiles the player may currently see, keyed by hex.
    GamestateTiles {
        /// Hex key to tile data.
        tiles: BTreeMap<Hex, Tile>,
    },

    /// Exhaustive visible-group map; full replacement.
    GamestateGroups {
        /// Group id to group data.
        groups: BTreeMap<GroupId, Group>,
    },

    /// Exhaustive discovered-building map; full replacement.
    GamestateBuildings {
        /// Building id to building data.
        buildings: BTreeMap<BuildingId, Building>,
    },

    /// Exhaustive visible-battle map; full replacement.
    GamestateBattles {
        /// Battle id to battle data.
        battles: BTreeMap<BattleId, Battle>,
    },

    /// Answer to a relation query.
    GamestateRelation {
        /// First player of the queried pair.
        a: PlayerId,
        /// Second player of the queried pair.
        b: PlayerId,
        /// Current stance.
        relation: Relation,
    },

    /// Error message.
    Error(ServerError),

    /// Pong response.
    Pong {
        /// Echoed client timestamp.
        timestamp: u64,
        /// Server wall-clock millis.
        server_time: u64,
    },

    /// Server is shutting down.
    Shutdown {
        /// Human-readable reason.
        reason: String,
    },
}

/// Authentication result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResult {
    /// Whether auth succeeded.
    pub success: bool,
    /// The player id the server resolved from the credential.
    pub player_id: Option<PlayerId>,
    /// Error message if failed.
    pub error: Option<String>,
    /// Server version.
    pub server_version: String,
}

/// Server error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Authentication failed.
    AuthFailed,
    /// Not authenticated.
    NotAuthenticated,
    /// JWT token has expired.
    TokenExpired,
    /// Invalid JWT token (signature, format, claims).
    InvalidToken,
    /// Invalid input.
    InvalidInput,
    /// Server overloaded.
    ServerOverloaded,
    /// Internal error.
    InternalError,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
