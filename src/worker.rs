//! Worker pool (C8, spec §4.8).
//!
//! Workers are plain `std::thread`s, not async tasks: the spec models them
//! as OS threads pulling from a blocking queue and running a synchronous
//! user handler (e.g. one doing blocking database I/O), which is exactly
//! what `std::thread::spawn` + [`crate::queue::Queue::pop`] gives for free.
//! Mixing that with the Tokio-driven reactor is the same two-pool split the
//! teacher's `ServerLimits` doc (`src/limits.rs` in the pre-transform tree)
//! draws between "connection admission" and "handler" capacity, just with
//! real OS threads standing in for async tasks on the processing side.

use std::sync::Arc;
use std::thread::JoinHandle;

use crate::reactor::{self, Reactor, WorkItem};
use crate::ws::frame::Opcode;
use crate::ws::message::Message;

/// Per-worker-thread state, constructed once when the thread starts and
/// dropped when it exits (spec §4.8 steps 1 and 4). The unit type `()` is
/// the default for handlers with no per-thread state.
pub trait WorkerContext: Send + 'static {
    fn new() -> Self;
}

impl WorkerContext for () {
    fn new() {}
}

/// A handle a [`Handler`] uses to send a reply or close a connection,
/// without ever touching a socket itself (spec §5 ownership rule).
#[derive(Clone)]
pub struct Reply {
    reactor: Arc<Reactor>,
}

impl Reply {
    pub fn send(&self, cid: u32, opcode: Opcode, payload: &[u8]) {
        reactor::send_reply(&self.reactor, cid, opcode, payload, false);
    }

    pub fn send_and_close(&self, cid: u32, opcode: Opcode, payload: &[u8]) {
        reactor::send_reply(&self.reactor, cid, opcode, payload, true);
    }

    pub fn close(&self, cid: u32) {
        reactor::send_close(&self.reactor, cid);
    }
}

/// The user-supplied processing callback (spec §4.8 "invokes the
/// application's `process` callback").
pub trait Handler<C: WorkerContext = ()>: Send + Sync + 'static {
    fn process(&self, cid: u32, ctx: &mut C, message: Message, reply: &Reply);
}

impl<C, F> Handler<C> for F
where
    C: WorkerContext,
    F: Fn(u32, &mut C, Message, &Reply) + Send + Sync + 'static,
{
    fn process(&self, cid: u32, ctx: &mut C, message: Message, reply: &Reply) {
        (self)(cid, ctx, message, reply)
    }
}

/// Spawns `num_workers` OS threads, each running the loop in spec §4.8:
/// pop a work item, invoke the handler, repeat until the request queue is
/// drained and `Halting`.
pub fn spawn_pool<C, H>(num_workers: usize, reactor: Arc<Reactor>, handler: Arc<H>) -> Vec<JoinHandle<()>>
where
    C: WorkerContext,
    H: Handler<C>,
{
    (0..num_workers)
        .map(|index| {
            let reactor = reactor.clone();
            let handler = handler.clone();
            std::thread::Builder::new()
                .name(format!("tidalpool-worker-{index}"))
                .spawn(move || worker_loop(reactor, handler))
                .expect("failed to spawn worker thread")
        })
        .collect()
}

fn worker_loop<C, H>(reactor: Arc<Reactor>, handler: Arc<H>)
where
    C: WorkerContext,
    H: Handler<C>,
{
    let mut ctx = C::new();
    let reply = Reply { reactor: reactor.clone() };

    loop {
        let WorkItem { cid, message } = match reactor.request_queue.pop() {
            Some(item) => item,
            None => break,
        };
        handler.process(cid, &mut ctx, message, &reply);
    }

    tracing::debug!(target: "tidalpool::worker", "worker exiting");
    // `ctx` drops here, matching spec §4.8's explicit context destructor.
}
