//! WebSocket hub: connection registry, broadcast fan-out, and the
//! per-connection read/write loops with liveness probing.

pub mod connection;
pub mod hub;
pub mod socket;

pub use connection::ClientConnection;
pub use hub::Hub;
pub use socket::ws_handler;
