pub mod config;
pub mod error;
pub mod event;
pub mod history;
pub mod message;
pub mod sandbox;
pub mod session;
pub mod stream;
pub mod tool;
pub mod trace;

pub use error::{Error, Result};
pub use event::{Event, EventKind};
pub use history::{HistoryInvariantError, MessageHistory};
pub use message::{Message, Role, Turn};
pub use sandbox::{Sandbox, SandboxMode};
pub use session::{Session, SessionEntry};
pub use tool::{ToolCatalog, ToolDefinition};
