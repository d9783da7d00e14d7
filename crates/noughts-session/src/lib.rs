//! Connection session management for Noughts.
//!
//! A session is the server's record of one live transport connection:
//!
//! 1. **Outbox**: the ordered channel every event for that connection
//!    is written into ([`Outbox`]).
//! 2. **Binding**: the zero-or-one `(room, role, display name)` the
//!    connection joined as ([`Binding`]).
//! 3. **Gauge**: the process-wide connection count broadcast to every
//!    session on connect and disconnect.
//!
//! # How it fits in the stack
//!
//! ```text
//! Router (noughts)  ← resolves bindings, synthesizes leave on disconnect
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol Layer  ← provides RoomCode, Role, ServerEvent
//! ```

mod error;
mod manager;
mod session;

pub use error::SessionError;
pub use manager::SessionManager;
pub use noughts_transport::ConnectionId;
pub use session::{outbox, Binding, Inbox, Outbox, Session};
