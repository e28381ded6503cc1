pub mod connection;
pub mod handler;

pub use connection::WsConnection;
pub use handler::{websocket_handler, WsState};
