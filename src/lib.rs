//! tidalpool — a portable WebSocket client/server stack with a thin
//! messaging layer on top.
//!
//! # Protocol support
//!
//! - **RFC 6455 framing**: masking, fragmentation, control frames, and the
//!   HTTP/1.1 upgrade handshake ([`ws`], [`http`]).
//! - **A server runtime**: one I/O reactor thread multiplexing sockets,
//!   handing reassembled messages to an OS-thread worker pool over bounded
//!   queues ([`reactor`], [`worker`], [`queue`]).
//! - **A messaging adapter**: routing/header maps plus a payload, carried
//!   as either MessagePack or JSON with auto-detection on receive
//!   ([`messaging`]).
//!
//! # Quick start
//!
//! ```no_run
//! use tidalpool::{server::{Config, Server}, worker::{Handler, Reply}, ws::frame::Opcode, ws::message::Message};
//!
//! struct Echo;
//! impl Handler<()> for Echo {
//!     fn process(&self, cid: u32, _ctx: &mut (), message: Message, reply: &Reply) {
//!         reply.send(cid, Opcode::Text, &message.payload);
//!     }
//! }
//!
//! fn main() -> std::io::Result<()> {
//!     tidalpool::trace::init(3);
//!     let mut running = Server::<(), Echo>::builder()
//!         .listen("127.0.0.1:8080".parse().unwrap())
//!         .handler(Echo)
//!         .config(Config { num_workers: 4, ..Config::default() })
//!         .build()
//!         .launch()?;
//!     std::thread::sleep(std::time::Duration::from_secs(1));
//!     running.stop();
//!     Ok(())
//! }
//! ```
//!
//! # Non-goals
//!
//! This crate is not an HTTP server beyond the upgrade handshake, does not
//! implement WebSocket extensions (permessage-deflate, subprotocol
//! negotiation beyond echoing one header), and does not implement a
//! pub/sub broker or delivery guarantees beyond TCP ordering.

pub mod buffer;
pub mod client;
pub mod conn;
pub mod env;
pub mod error;
pub mod http;
pub mod messaging;
pub mod queue;
pub mod reactor;
pub mod server;
pub mod slotpool;
pub mod trace;
pub mod worker;
pub mod ws;

pub use env::Environment;
pub use error::{Error, Result};
pub use http::response::{DefaultHttpHandler, HttpHandler, HttpResponse};
pub use server::{Config, RunningServer, Server, ServerBuilder};
pub use worker::{Handler, Reply, WorkerContext};
