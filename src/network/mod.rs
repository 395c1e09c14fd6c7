//! Network Layer
//!
//! WebSocket server for real-time multiplayer communication.
//! This layer is **non-deterministic** - all game logic runs through `game/`.

pub mod auth;
pub mod protocol;
pub mod server;
pub mod sync;

pub use auth::{validate_token, AuthConfig, AuthError, TokenClaims};
pub use protocol::{AuthRequest, AuthResult, ClientMessage, ErrorCode, ServerError, ServerMessage};
pub use server::{GameServer, GameServerError, ServerConfig};
