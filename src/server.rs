//! Server façade (C9, spec §4.9).
//!
//! Composition mirrors the teacher's `ServerBuilder`/`Server` split
//! (pre-transform `src/server/server_impl.rs`): a `Config` carries every
//! tunable named in spec §4.9, a builder assembles a `Server` from a
//! listener address and a `Handler`, and `launch` hands back a
//! `RunningServer` the caller can `stop()`. Unlike the teacher, this
//! façade owns its own dedicated OS thread for the reactor rather than
//! requiring the caller's async runtime to drive it — spec §2/§4.7 are
//! explicit that there is exactly one I/O thread, and a crate consumer
//! should be able to get that thread without first standing up Tokio
//! themselves.

use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use socket2::{Domain, Socket, Type};
use tokio::sync::Notify;

use crate::env::Environment;
use crate::http::response::{DefaultHttpHandler, HttpHandler};
use crate::reactor::Reactor;
use crate::worker::{self, Handler, WorkerContext};

/// Configuration surface enumerated in spec §4.9.
#[derive(Debug, Clone)]
pub struct Config {
    /// Worker threads in the processing pool. No spec-mandated default;
    /// the caller is expected to size this to their handler's workload.
    pub num_workers: usize,
    /// Backlog passed to `listen(2)` (default: `128`).
    pub listen_backlog: i32,
    /// Capacity of both the request and response queues (default: `1024`).
    pub queue_capacity: usize,
    /// Verbosity for [`crate::trace::init`] (0..9).
    pub trace_level: u8,
    /// When true, `listener` in [`ServerBuilder::inetd`] is a single
    /// pre-accepted socket; closing it terminates the server (spec §4.7,
    /// glossary "Inetd mode").
    pub inetd_mode: bool,
    /// Per-socket read timeout (default: 10s, spec §5 "Cancellation/timeouts").
    pub socket_read_timeout: Duration,
    /// How long `stop()` waits for workers to drain before returning.
    pub shutdown_timeout: Duration,
    pub max_headers: usize,
    pub max_payload: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            num_workers: 4,
            listen_backlog: 128,
            queue_capacity: 1024,
            trace_level: 3,
            inetd_mode: false,
            socket_read_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(30),
            max_headers: 64,
            max_payload: 16 * 1024 * 1024,
        }
    }
}

/// Builds a [`Server`] (spec §4.9).
pub struct ServerBuilder<C: WorkerContext, H: Handler<C>> {
    addr: Option<SocketAddr>,
    handler: Option<Arc<H>>,
    http_handler: Arc<dyn HttpHandler>,
    config: Config,
    env: Environment,
    _marker: PhantomData<C>,
}

impl<C: WorkerContext, H: Handler<C>> ServerBuilder<C, H> {
    pub fn new() -> Self {
        ServerBuilder {
            addr: None,
            handler: None,
            http_handler: Arc::new(DefaultHttpHandler),
            config: Config::default(),
            env: Environment::default(),
            _marker: PhantomData,
        }
    }

    pub fn listen(mut self, addr: SocketAddr) -> Self {
        self.addr = Some(addr);
        self
    }

    pub fn handler(mut self, handler: H) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Handles plain HTTP requests that never ask to upgrade, instead of
    /// the built-in 404 (spec §1 pass-through hook).
    pub fn http_handler(mut self, http_handler: impl HttpHandler) -> Self {
        self.http_handler = Arc::new(http_handler);
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn environment(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }

    pub fn build(self) -> Server<C, H> {
        Server {
            addr: self.addr.expect("ServerBuilder::listen must be called"),
            handler: self.handler.expect("ServerBuilder::handler must be called"),
            http_handler: self.http_handler,
            config: self.config,
            env: self.env,
            _marker: PhantomData,
        }
    }
}

impl<C: WorkerContext, H: Handler<C>> Default for ServerBuilder<C, H> {
    fn default() -> Self {
        Self::new()
    }
}

/// A configured-but-not-yet-running WebSocket server (spec §4.9).
pub struct Server<C: WorkerContext, H: Handler<C>> {
    addr: SocketAddr,
    handler: Arc<H>,
    http_handler: Arc<dyn HttpHandler>,
    config: Config,
    env: Environment,
    _marker: PhantomData<C>,
}

impl<C: WorkerContext, H: Handler<C>> Server<C, H> {
    pub fn builder() -> ServerBuilder<C, H> {
        ServerBuilder::new()
    }

    /// Binds the listening socket (respecting `listen_backlog`), starts the
    /// reactor thread and the worker pool, and returns a handle the caller
    /// can `stop()` (spec §4.7 "Startup").
    pub fn launch(self) -> std::io::Result<RunningServer> {
        let std_listener = bind_listener(self.addr, self.config.listen_backlog)?;

        let reactor = Reactor::with_http_handler(
            self.env,
            self.config.queue_capacity,
            self.config.max_headers,
            self.config.max_payload,
            self.http_handler,
        );
        let shutdown = Arc::new(Notify::new());

        let worker_threads = worker::spawn_pool(self.config.num_workers, reactor.clone(), self.handler);

        let reactor_for_thread = reactor.clone();
        let shutdown_for_thread = shutdown.clone();
        let reactor_thread = std::thread::Builder::new()
            .name("tidalpool-reactor".into())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed to build reactor runtime");
                runtime.block_on(async move {
                    let listener = tokio::net::TcpListener::from_std(std_listener)
                        .expect("failed to adopt std listener");
                    reactor_for_thread.run(listener, shutdown_for_thread).await;
                });
            })
            .expect("failed to spawn reactor thread");

        Ok(RunningServer {
            reactor,
            shutdown,
            reactor_thread: Some(reactor_thread),
            worker_threads,
            shutdown_timeout: self.config.shutdown_timeout,
            stopped: AtomicBool::new(false),
        })
    }
}

fn bind_listener(addr: SocketAddr, backlog: i32) -> std::io::Result<std::net::TcpListener> {
    let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;
    Ok(socket.into())
}

/// A running server. Dropping this without calling [`stop`](Self::stop)
/// stops it anyway, so `?`-early-returns in `main` still shut down cleanly.
pub struct RunningServer {
    reactor: Arc<Reactor>,
    shutdown: Arc<Notify>,
    reactor_thread: Option<JoinHandle<()>>,
    worker_threads: Vec<JoinHandle<()>>,
    shutdown_timeout: Duration,
    stopped: AtomicBool,
}

impl RunningServer {
    /// Cooperative shutdown (spec §4.7 "Shutdown", §8 "Idempotent
    /// shutdown"): halts both queues (waking every blocked push/pop),
    /// notifies the reactor, joins workers, then joins the reactor thread
    /// (which closes every live socket on its way out).
    pub fn stop(&mut self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        self.reactor.request_queue.halt();
        self.reactor.response_queue.halt();
        self.shutdown.notify_waiters();

        for handle in self.worker_threads.drain(..) {
            let _ = handle.join();
        }
        self.reactor.request_queue.mark_halted();
        self.reactor.response_queue.mark_halted();

        if let Some(handle) = self.reactor_thread.take() {
            let _ = handle.join();
        }
    }

    /// The address actually bound, useful when the caller requested an
    /// ephemeral port via `:0`.
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Alias for [`stop`](Self::stop): there is no separate non-blocking
    /// shutdown path, so both names join every thread before returning.
    pub fn stop_blocking(&mut self) {
        self.stop();
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::frame::Opcode;
    use crate::ws::message::Message;
    use std::io::{Read, Write};
    use std::net::TcpStream;

    struct Echo;
    impl Handler<()> for Echo {
        fn process(&self, cid: u32, _ctx: &mut (), message: Message, reply: &crate::worker::Reply) {
            reply.send(cid, Opcode::Text, &message.payload);
        }
    }

    #[test]
    fn launch_and_stop_is_idempotent() {
        let server = Server::<(), Echo>::builder()
            .listen("127.0.0.1:0".parse().unwrap())
            .handler(Echo)
            .config(Config {
                num_workers: 1,
                ..Config::default()
            })
            .build();
        let mut running = server.launch().unwrap();
        running.stop();
        running.stop();
    }

    #[test]
    fn text_echo_end_to_end() {
        // Probe a free port first since `launch` binds internally.
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = probe.local_addr().unwrap();
        drop(probe);

        let server = Server::<(), Echo>::builder()
            .listen(addr)
            .handler(Echo)
            .config(Config {
                num_workers: 1,
                ..Config::default()
            })
            .build();
        let mut running = server.launch().unwrap();
        std::thread::sleep(Duration::from_millis(50));

        let mut socket = TcpStream::connect(addr).unwrap();
        socket
            .write_all(&crate::http::handshake::render_client_request(
                "localhost",
                "/",
                "dGhlIHNhbXBsZSBub25jZQ==",
                None,
            ))
            .unwrap();

        let mut buf = [0u8; 1024];
        let n = socket.read(&mut buf).unwrap();
        let response = String::from_utf8_lossy(&buf[..n]);
        assert!(response.contains("101 Switching Protocols"));

        let frame = crate::ws::frame::serialize_message(crate::ws::frame::Role::Client, Opcode::Text, b"Hello");
        socket.write_all(&frame).unwrap();

        let n = socket.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[0x81, 0x05, 0x48, 0x65, 0x6C, 0x6C, 0x6F][..]);

        running.stop();
    }
}
