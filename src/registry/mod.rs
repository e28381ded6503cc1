pub mod connection;
pub mod registry;
pub mod session;

pub use connection::{ClientConnection, ConnectionError};
pub use registry::{ConnectionRegistry, DispatchError, RegistryStats, DEFAULT_OUTBOUND_CAPACITY};
pub use session::ClientSession;
