//! # Game Relay Server Library
//!
//! This library implements the server-side message relay for a real-time
//! multiplayer game session. The relay receives short comma-delimited text
//! datagrams over UDP, interprets each by its message-type tag, maintains a
//! minimal registry of connected participants, and re-emits either a targeted
//! reply or a broadcast to all other participants.
//!
//! ## Core Responsibilities
//!
//! ### Stateless Forwarding
//! The relay holds no authoritative game state. Positions, rotation matrices
//! and textures pass through as opaque strings; the server trusts
//! client-reported state and client-reported identifiers completely. The only
//! state kept is the session registry: which identifiers are present and
//! where to send their datagrams.
//!
//! ### Routing Policy
//! Each command tag maps to exactly one routing policy: unicast back to the
//! sender (`join` acknowledgment), unicast to a named target (`detailsFor`,
//! `hit`), or broadcast to every registered session except the sender
//! (everything else). The policies live in an exhaustive match over a closed
//! command enum, so an unknown tag is a single explicit case rather than an
//! implicit fallthrough.
//!
//! ### Resilience by Ignore-and-Continue
//! Malformed datagrams are dropped and logged, directed sends to unknown
//! identifiers are skipped silently, and a transport failure on one send
//! never aborts the rest of a broadcast fan-out. There is no retry logic;
//! the transport is unreliable by contract and the relay stays true to it.
//!
//! ## Module Organization
//!
//! ### Registry Module (`registry`)
//! The session registry mapping client identifiers to network addresses:
//! - insert-or-replace on join (last-write-wins for re-joins)
//! - silent removal on bye
//! - lookup and all-except snapshots for directed sends and broadcasts
//!
//! ### Dispatcher Module (`dispatcher`)
//! One handler per command tag. Handlers mutate the registry only for
//! `join`/`bye` and return the outgoing datagrams as data, leaving all I/O
//! to the network layer.
//!
//! ### Network Module (`network`)
//! UDP socket management and task plumbing:
//! - receiver task turning datagrams into relay events
//! - sender task delivering queued fan-out independently per destination
//! - the main relay loop driving decode and dispatch
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::RelayServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut relay = RelayServer::bind("127.0.0.1:8080").await?;
//!     relay.run().await
//! }
//! ```

pub mod dispatcher;
pub mod network;
pub mod registry;
