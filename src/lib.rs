//! # bytekv
//!
//! A sharded, in-memory key-value store served over a compact binary TCP
//! protocol, with:
//! - Byte-blob values with partial reads, range writes, and truncation
//! - u32 counters with a monotonic set-if-greater update
//! - Consistent-hash routing at two levels: buckets inside a process,
//!   servers across a ring
//! - One worker task per connection, a reader/writer lock per bucket
//!
//! ## Architecture
//!
//! ```text
//!                     ┌──────────────┐
//!                     │     Ring     │  key ──► server (consistent hash)
//!                     └──┬────┬────┬─┘
//!            ┌───────────┘    │    └───────────┐
//!      ┌─────▼─────┐    ┌─────▼─────┐    ┌─────▼─────┐
//!      │ Server A  │    │ Server B  │    │ Server C  │
//!      │  Store    │    │  Store    │    │  Store    │
//!      │ ┌───┬───┐ │    │ ┌───┬───┐ │    │ ┌───┬───┐ │
//!      │ │B0 │B1 │…│    │ │B0 │B1 │…│    │ │B0 │B1 │…│  key ──► bucket
//!      │ └───┴───┘ │    │ └───┴───┘ │    │ └───┴───┘ │  (same hash ring)
//!      └───────────┘    └───────────┘    └───────────┘
//! ```
//!
//! ## Usage
//!
//! ### Start a server
//! ```bash
//! bytekv-server --bind 127.0.0.1 --port 8001 --buckets 100
//! ```
//!
//! ### Stop it remotely
//! ```bash
//! bytekv-stop --host 127.0.0.1 --port 8001
//! ```
//!
//! ### Talk to it from Rust
//! ```no_run
//! use bytekv::{Client, Result};
//!
//! # async fn demo() -> Result<()> {
//! let mut client = Client::connect("127.0.0.1:8001").await?;
//! client.set_bytes("greeting", b"hello").await?;
//! let value = client.get_bytes("greeting").await?;
//! assert_eq!(value, b"hello");
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod common;
pub mod ring;
pub mod server;
pub mod store;
pub mod wire;

// Re-export commonly used types
pub use client::{Client, Filled};
pub use common::{Error, HashRing, Port, Result, ServerConfig, ShardRouter};
pub use ring::Ring;
pub use server::{Server, ShutdownHandle};
pub use store::Store;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build info
pub const BUILD_INFO: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CARGO_PKG_NAME"), ")");
