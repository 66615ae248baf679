//! Library crate for subarg-client: drives scans on a SubARG backend and
//! follows one live scan session over its push channel.
pub mod config;
pub mod dashboard;
pub mod error;
pub mod gateway;
pub mod presenter;
pub mod progress;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;
pub mod validate;

pub use config::ClientConfig;
pub use dashboard::{AppEvent, Command, Dashboard, KeyInput};
pub use error::{ClientError, ClientResult};
pub use gateway::Gateway;
pub use session::{SessionController, SessionState};
