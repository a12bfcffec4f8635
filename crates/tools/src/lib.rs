//! Built-in tools for the agent runtime.
//!
//! Three tool surfaces live here: the terminal session manager (`exec`/
//! `manager`/`process`), the plain file-ops helpers (`file_ops`), and the
//! File-Edit Manager (`file_edit`) that layers undo history and snippet
//! rendering on top of them.

pub mod client;
pub mod exec;
pub mod file_edit;
pub mod file_ops;
pub mod manager;
pub mod process;
pub mod terminal;

pub use client::ToolClient;
pub use file_edit::FileEditManager;
pub use manager::ProcessManager;
pub use terminal::TerminalManager;
