//! Network service exposing named maps over a line protocol
//!
//! Architecture:
//! - `Server`: binds a TCP listener and serves one thread per connection
//! - `CommandProcessor`: parses request lines and executes them on a `Registry`
//! - `Client`: sends single commands and decodes replies

mod client;
pub mod daemon;
pub mod processor;
pub mod protocol;

pub use client::{Client, ClientError, ClientResult};
pub use daemon::{Server, ServerHandle};
pub use processor::CommandProcessor;
