//! Causerie is a terminal chat client for a backend that streams its replies.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the domain model (messages, sessions, the signed-in user),
//!   the copy-on-write session store, the streaming HTTP client and the
//!   conversation controller that ties a submit to a streamed reply.
//! - [`api`] defines the JSON payloads exchanged with the backend.
//! - [`ui`] renders store snapshots as plain text and runs the line-mode
//!   chat loop.
//! - [`utils`] holds URL helpers and diagnostic logging setup.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`], which loads configuration and dispatches into
//! [`ui::repl`] for interactive sessions.

pub mod api;
pub mod cli;
pub mod core;
pub mod ui;
pub mod utils;
