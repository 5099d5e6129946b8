//! DevDoc is a terminal chat client that streams replies from a DevDoc
//! backend through a sandboxed relay.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the session state machine, the outbound dispatcher, the
//!   inbound stream assembler, the event transport and the HTTP relay.
//! - [`api`] defines the request envelope and the JSON events exchanged
//!   between the interactive surface and the relay.
//! - [`ui`] hosts a session on the terminal.
//! - [`cli`] parses arguments and dispatches subcommands.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`], which resolves settings and starts
//! [`ui::console`] for interactive sessions.

pub mod api;
pub mod cli;
pub mod core;
pub mod logging;
pub mod ui;
