//! Per-connection message counter, demonstrating a stateful [`WorkerContext`]
//! is per-*thread*, not per-connection — so this counts messages processed
//! by a given worker thread rather than per socket, matching the teacher's
//! own doc caveat about `ConnectionData` living on the connection side,
//! which this stack's worker pool does not have an equivalent of (workers
//! are detached from any one connection by design, spec §4.8).

use std::sync::atomic::{AtomicU64, Ordering};

use tidalpool::server::{Config, Server};
use tidalpool::worker::{Handler, Reply, WorkerContext};
use tidalpool::ws::frame::Opcode;
use tidalpool::ws::message::Message;

struct Counter(AtomicU64);

impl WorkerContext for Counter {
    fn new() -> Self {
        Counter(AtomicU64::new(0))
    }
}

struct RequestCounter;

impl Handler<Counter> for RequestCounter {
    fn process(&self, cid: u32, ctx: &mut Counter, message: Message, reply: &Reply) {
        let count = ctx.0.fetch_add(1, Ordering::Relaxed) + 1;
        let body = format!("request #{count} on worker thread: {} bytes", message.payload.len());
        reply.send(cid, Opcode::Text, body.as_bytes());
    }
}

fn main() -> std::io::Result<()> {
    tidalpool::trace::init(3);

    let mut running = Server::<Counter, RequestCounter>::builder()
        .listen("127.0.0.1:8082".parse().unwrap())
        .handler(RequestCounter)
        .config(Config {
            num_workers: 4,
            ..Config::default()
        })
        .build()
        .launch()?;

    println!("request counter listening on ws://127.0.0.1:8082, press enter to stop");
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;

    running.stop();
    Ok(())
}
