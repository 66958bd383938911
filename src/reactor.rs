//! I/O reactor (C7, spec §4.7).
//!
//! The source reactor is a single hand-written event loop (accept/read/write
//! callbacks registered with an OS poller). A single-threaded Tokio runtime
//! gives the same guarantee — one OS thread, cooperatively multiplexing every
//! socket — without reimplementing epoll/kqueue plumbing, so that's what this
//! crate builds on. Every per-connection task below is spawned onto that one
//! runtime; none of them ever touch another connection's socket, and the
//! slot pool is only ever mutated from tasks running on this thread, which
//! keeps spec §5's ownership rule ("sockets ... touched only on the reactor
//! thread") true even though "the reactor thread" is now "this runtime's
//! worker thread" rather than a literal single `while` loop.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex as AsyncMutex, Notify};

use crate::conn::{ConnEvent, Connection};
use crate::env::Environment;
use crate::http::response::{DefaultHttpHandler, HttpHandler};
use crate::queue::Queue;
use crate::slotpool::SlotPool;
use crate::ws::frame::{self, Opcode, Role};
use crate::ws::message::Message;

/// One inbound work item: a fully reassembled message plus the connection
/// it arrived on (spec §3 "Work item").
pub struct WorkItem {
    pub cid: u32,
    pub message: Message,
}

/// One outbound work item the reactor must act on (spec §3 "Work item").
/// `close` is the `CLOSE` flag: the reactor closes the connection instead of
/// writing `data` (when both are set, `data` is still flushed first — this
/// is how the worker-driven half of the close handshake is relayed).
pub struct ReplyItem {
    pub cid: u32,
    pub data: Vec<u8>,
    pub close: bool,
}

struct ConnHandle {
    writer: Arc<AsyncMutex<OwnedWriteHalf>>,
    closing: Arc<AtomicBool>,
}

/// Shared reactor state: the slot pool and the two queues connecting it to
/// the worker pool (spec §2 "Data flow").
pub struct Reactor {
    slots: std::sync::Mutex<SlotPool<ConnHandle>>,
    pub request_queue: Arc<Queue<WorkItem>>,
    pub response_queue: Arc<Queue<ReplyItem>>,
    pub response_doorbell: Arc<Notify>,
    pub env: Environment,
    max_headers: usize,
    max_payload: usize,
    http_handler: Arc<dyn HttpHandler>,
}

impl Reactor {
    pub fn new(env: Environment, queue_capacity: usize, max_headers: usize, max_payload: usize) -> Arc<Self> {
        Reactor::with_http_handler(env, queue_capacity, max_headers, max_payload, Arc::new(DefaultHttpHandler))
    }

    pub fn with_http_handler(
        env: Environment,
        queue_capacity: usize,
        max_headers: usize,
        max_payload: usize,
        http_handler: Arc<dyn HttpHandler>,
    ) -> Arc<Self> {
        Arc::new(Reactor {
            slots: std::sync::Mutex::new(SlotPool::new(64)),
            request_queue: Arc::new(Queue::new("request", queue_capacity)),
            response_queue: Arc::new(Queue::new("response", queue_capacity)),
            response_doorbell: Arc::new(Notify::new()),
            env,
            max_headers,
            max_payload,
            http_handler,
        })
    }

    /// Runs the accept loop and the response drain task until `shutdown` is
    /// notified. Must be called from within a Tokio runtime (spec §4.7
    /// "Startup").
    pub async fn run(self: Arc<Self>, listener: TcpListener, shutdown: Arc<Notify>) {
        let drain_self = self.clone();
        let drain_shutdown = shutdown.clone();
        let drain_task = tokio::spawn(async move { drain_self.drain_responses(drain_shutdown).await });

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.clone().on_accept(stream, addr),
                        Err(e) => tracing::warn!(target: "tidalpool::reactor", error = %e, "accept failed"),
                    }
                }
                _ = shutdown.notified() => break,
            }
        }

        self.close_all().await;
        let _ = drain_task.await;
    }

    fn on_accept(self: Arc<Self>, stream: TcpStream, addr: SocketAddr) {
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();
        let writer = Arc::new(AsyncMutex::new(write_half));
        let closing = Arc::new(AtomicBool::new(false));

        let cid = {
            let mut slots = self.slots.lock().unwrap();
            slots.insert(ConnHandle {
                writer: writer.clone(),
                closing: closing.clone(),
            })
        };

        tracing::debug!(target: "tidalpool::reactor", cid, %addr, "accepted connection");

        let reactor = self.clone();
        let http_handler = self.http_handler.clone();
        tokio::spawn(async move {
            reactor.read_loop(cid, read_half, writer, closing, http_handler).await;
        });
    }

    async fn read_loop(
        self: Arc<Self>,
        cid: u32,
        mut read_half: tokio::net::tcp::OwnedReadHalf,
        writer: Arc<AsyncMutex<OwnedWriteHalf>>,
        closing: Arc<AtomicBool>,
        http_handler: Arc<dyn HttpHandler>,
    ) {
        let mut conn = Connection::with_http_handler(cid, self.max_headers, self.max_payload, http_handler);
        let mut inbound = vec![0u8; 8192];

        loop {
            if closing.load(Ordering::Acquire) {
                break;
            }
            let n = match read_half.read(&mut inbound).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    tracing::debug!(target: "tidalpool::reactor", cid, error = %e, "read error");
                    break;
                }
            };

            let events = match conn.on_bytes(&inbound[..n]) {
                Ok(events) => events,
                Err(e) => {
                    tracing::warn!(target: "tidalpool::reactor", cid, error = %e, "closing connection on protocol error");
                    break;
                }
            };

            let mut should_close = false;
            for event in events {
                match event {
                    ConnEvent::Write(bytes) => {
                        let mut w = writer.lock().await;
                        if w.write_all(&bytes).await.is_err() {
                            should_close = true;
                            break;
                        }
                    }
                    ConnEvent::Message(message) => {
                        // Blocking push: on this single-threaded reactor,
                        // a full request queue pauses all connections, per
                        // spec §8 scenario 5 ("back-pressure").
                        if self.request_queue.push(WorkItem { cid, message }).is_err() {
                            should_close = true;
                        }
                    }
                    ConnEvent::Close => should_close = true,
                }
            }

            if should_close {
                break;
            }
        }

        self.on_close(cid, writer).await;
    }

    async fn on_close(&self, cid: u32, writer: Arc<AsyncMutex<OwnedWriteHalf>>) {
        let _ = writer.lock().await.shutdown().await;
        let mut slots = self.slots.lock().unwrap();
        slots.remove(cid);
        tracing::debug!(target: "tidalpool::reactor", cid, "connection closed");
    }

    async fn drain_responses(&self, shutdown: Arc<Notify>) {
        loop {
            tokio::select! {
                _ = self.response_doorbell.notified() => {}
                _ = shutdown.notified() => {
                    self.drain_once().await;
                    return;
                }
            }
            self.drain_once().await;
        }
    }

    async fn drain_once(&self) {
        while let Some(item) = self.response_queue.try_pop() {
            let handle = {
                let slots = self.slots.lock().unwrap();
                slots.get(item.cid).map(|h| (h.writer.clone(), h.closing.clone()))
            };
            // A `None` lookup is the canonical "connection is gone" answer
            // (spec §4.2): the item is simply dropped here.
            let Some((writer, closing)) = handle else {
                continue;
            };

            if !item.data.is_empty() {
                let mut w = writer.lock().await;
                let _ = w.write_all(&item.data).await;
            }
            if item.close {
                closing.store(true, Ordering::Release);
                let mut w = writer.lock().await;
                let _ = w.shutdown().await;
            }
        }
    }

    async fn close_all(&self) {
        let handles: Vec<_> = {
            let slots = self.slots.lock().unwrap();
            slots.iter().map(|(_, h)| h.writer.clone()).collect()
        };
        for writer in handles {
            let _ = writer.lock().await.shutdown().await;
        }
    }
}

/// Serializes `payload` as a single unmasked frame and enqueues it as a
/// reply for `cid`, waking the reactor (spec §4.8 "`send` serializes the
/// reply as a single binary or text frame").
pub fn send_reply(reactor: &Reactor, cid: u32, opcode: Opcode, payload: &[u8], close: bool) {
    let data = frame::serialize_message(Role::Server, opcode, payload);
    let pushed = reactor.response_queue.push(ReplyItem { cid, data, close });
    if pushed.is_err() {
        tracing::warn!(target: "tidalpool::reactor", cid, "dropped reply: response queue halted");
    }
    reactor.response_doorbell.notify_one();
}

/// Enqueues a bare close instruction for `cid` with no payload.
pub fn send_close(reactor: &Reactor, cid: u32) {
    let pushed = reactor.response_queue.push(ReplyItem {
        cid,
        data: Vec::new(),
        close: true,
    });
    if pushed.is_err() {
        tracing::warn!(target: "tidalpool::reactor", cid, "dropped close: response queue halted");
    }
    reactor.response_doorbell.notify_one();
}
