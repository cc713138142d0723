//! termai - a terminal assistant that turns plain-language tasks into shell
//! commands.
//!
//! Each task is sent to a Gemini model together with the session's working
//! directory. The model's reply is split into candidate commands and every
//! candidate passes through an execution gate: commands that match a
//! dangerous pattern need explicit confirmation, approved commands are
//! recorded in the history file and then run in the session directory.
//!
//! # Architecture
//!
//! - [`builtins`] - Commands handled locally (`help`, `cd`, `history`, ...)
//! - [`command_router`] - The read-eval loop; routes lines to built-ins or the model
//! - [`config`] - Data directory layout and the `KEY=value` config file
//! - [`credentials`] - Stored API key
//! - [`denylist`] - Dangerous-pattern classifier
//! - [`error`] - Typed errors for generation and startup
//! - [`executor`] - Execution gate and shell process runner
//! - [`history`] - Timestamped command history
//! - [`http_client`] - HTTP client abstraction
//! - [`llm_generator`] - Model client and reply parsing
//! - [`permission_ui`] - Confirmation dialog
//! - [`prompt`] - Prompt construction
//! - [`providers`] - Time source injection
//! - [`session`] - Per-run state and the virtual working directory
//!
//! # Example
//!
//! ```ignore
//! use termai::denylist::Denylist;
//!
//! let denylist = Denylist::default();
//! assert_eq!(denylist.matched_pattern("sudo rm -rf /tmp/x"), Some("rm -rf"));
//! ```
//!
//! The denylist is a best-effort substring match, not a sandbox. Review
//! every command before approving it.

pub mod builtins;
pub mod command_router;
pub mod config;
pub mod credentials;
pub mod denylist;
pub mod error;
pub mod executor;
pub mod history;
pub mod http_client;
pub mod llm_generator;
pub mod permission_ui;
pub mod prompt;
pub mod providers;
pub mod session;
