//! DineWheel Network Library
//!
//! TCP transport for DineWheel rooms.
//!
//! # Architecture
//!
//! - **Server**: accepts connections and serves room requests through a
//!   shared session manager
//! - **RoomHub**: per-room broadcast channels that carry room events to
//!   every bound connection
//! - **Client**: request/response handle with a separate event queue
//! - **Protocol**: length-prefixed JSON messages
//!
//! # Usage
//!
//! ```ignore
//! let hub = Arc::new(RoomHub::default());
//! let sessions = Arc::new(SessionManager::new(storage, hub.clone()));
//! let server = Server::start(DEFAULT_PORT, sessions, hub, 64).await?;
//!
//! let mut client = Client::connect(addr).await?;
//! client.request(&Request::CreateRoom { name, preferences }).await?;
//! while let Some((code, event)) = client.next_event().await {
//!     println!("{}: {}", code, event.name());
//! }
//! ```

pub mod client;
pub mod error;
mod frame;
pub mod hub;
pub mod protocol;
pub mod server;

pub use client::Client;
pub use error::{Error, Result};
pub use hub::RoomHub;
pub use protocol::{Request, Response};
pub use server::{Binding, PeerInfo, Server};

/// Default port for DineWheel servers
pub const DEFAULT_PORT: u16 = 7420;
