//! End-to-end scenarios over a real loopback socket (spec §8 "Concrete
//! end-to-end scenarios").

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use tidalpool::client::WsClient;
use tidalpool::http::handshake;
use tidalpool::server::{Config, Server};
use tidalpool::worker::{Handler, Reply};
use tidalpool::ws::frame::{self, Opcode, Role};
use tidalpool::ws::message::Message;

struct Echo;

impl Handler<()> for Echo {
    fn process(&self, cid: u32, _ctx: &mut (), message: Message, reply: &Reply) {
        reply.send(cid, Opcode::Text, &message.payload);
    }
}

fn launch_echo_server(num_workers: usize) -> (tidalpool::RunningServer, std::net::SocketAddr) {
    let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = probe.local_addr().unwrap();
    drop(probe);

    let server = Server::<(), Echo>::builder()
        .listen(addr)
        .handler(Echo)
        .config(Config {
            num_workers,
            ..Config::default()
        })
        .build();
    let running = server.launch().unwrap();
    std::thread::sleep(Duration::from_millis(50));
    (running, addr)
}

fn open_handshake(addr: std::net::SocketAddr) -> TcpStream {
    let mut socket = TcpStream::connect(addr).unwrap();
    socket.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    socket
        .write_all(&handshake::render_client_request(
            "localhost",
            "/",
            "dGhlIHNhbXBsZSBub25jZQ==",
            None,
        ))
        .unwrap();
    let mut buf = [0u8; 1024];
    let n = socket.read(&mut buf).unwrap();
    assert!(String::from_utf8_lossy(&buf[..n]).contains("101 Switching Protocols"));
    socket
}

#[test]
fn scenario_1_text_echo() {
    let (mut running, addr) = launch_echo_server(2);
    let mut socket = open_handshake(addr);

    socket
        .write_all(&frame::serialize_message(Role::Client, Opcode::Text, b"Hello"))
        .unwrap();

    let mut buf = [0u8; 64];
    let n = socket.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], &[0x81, 0x05, 0x48, 0x65, 0x6C, 0x6C, 0x6F][..]);

    running.stop();
}

#[test]
fn ws_client_text_echo_and_close_handshake() {
    let (mut running, addr) = launch_echo_server(1);
    let mut client = WsClient::connect(addr, "localhost", "/").unwrap();

    client.send(Opcode::Text, b"Hello").unwrap();
    let message = client.receive_message().unwrap();
    assert_eq!(message.payload, b"Hello");

    client.send_close(1000).unwrap();
    let err = client.receive_message().unwrap_err();
    assert!(matches!(
        err,
        tidalpool::error::Error::Frame(tidalpool::error::FrameError::ConnectionClosed)
    ));
    client.close().unwrap();

    running.stop();
}

#[test]
fn scenario_2_ping_pong() {
    let (mut running, addr) = launch_echo_server(1);
    let mut socket = open_handshake(addr);

    socket
        .write_all(&frame::serialize_message(Role::Client, Opcode::Ping, &[1, 2, 3]))
        .unwrap();

    let mut buf = [0u8; 64];
    let n = socket.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], &[0x8A, 0x03, 0x01, 0x02, 0x03][..]);

    running.stop();
}

#[test]
fn scenario_3_close_handshake() {
    let (mut running, addr) = launch_echo_server(1);
    let mut socket = open_handshake(addr);

    socket
        .write_all(&frame::serialize_close(Role::Client, 1000, b""))
        .unwrap();

    let mut buf = [0u8; 64];
    let n = socket.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], &[0x88, 0x02, 0x03, 0xE8][..]);

    // The server closes its write side after the reply; a further read
    // observes EOF.
    let n = socket.read(&mut buf).unwrap_or(0);
    assert_eq!(n, 0);

    running.stop();
}

#[test]
fn scenario_4_fragmentation_reassembly() {
    let (mut running, addr) = launch_echo_server(1);
    let mut socket = open_handshake(addr);

    let mut wire = Vec::new();
    frame::serialize(Role::Client, false, Opcode::Text, b"Hel", &mut wire);
    frame::serialize(Role::Client, false, Opcode::Continuation, b"lo, ", &mut wire);
    frame::serialize(Role::Client, true, Opcode::Continuation, b"world", &mut wire);
    socket.write_all(&wire).unwrap();

    let mut buf = [0u8; 64];
    let n = socket.read(&mut buf).unwrap();
    let expected = frame::serialize_message(Role::Server, Opcode::Text, b"Hello, world");
    assert_eq!(&buf[..n], expected.as_slice());

    running.stop();
}

#[test]
fn plain_http_request_gets_a_pass_through_response_not_a_websocket_error() {
    let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = probe.local_addr().unwrap();
    drop(probe);

    let server = Server::<(), Echo>::builder()
        .listen(addr)
        .handler(Echo)
        .http_handler(|_req: &tidalpool::http::parser::ParsedRequest| {
            tidalpool::HttpResponse::new(200, "OK").with_text_body("healthy")
        })
        .config(Config {
            num_workers: 1,
            ..Config::default()
        })
        .build();
    let mut running = server.launch().unwrap();
    std::thread::sleep(Duration::from_millis(50));

    let mut socket = TcpStream::connect(addr).unwrap();
    socket.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    socket.write_all(b"GET /healthz HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();

    let mut buf = [0u8; 1024];
    let n = socket.read(&mut buf).unwrap();
    let response = String::from_utf8_lossy(&buf[..n]);
    assert!(response.starts_with("HTTP/1.1 200 OK"));
    assert!(response.ends_with("healthy"));

    running.stop();
}

#[test]
fn scenario_6_shutdown_while_busy_drains_and_exits() {
    let (mut running, addr) = launch_echo_server(2);
    let mut socket = open_handshake(addr);

    for i in 0..100u32 {
        let payload = format!("msg-{i}");
        socket
            .write_all(&frame::serialize_message(Role::Client, Opcode::Text, payload.as_bytes()))
            .unwrap();
    }

    // Drain at least a few replies so we know workers are actively
    // processing, then shut the server down while more are in flight.
    let mut buf = [0u8; 4096];
    let _ = socket.read(&mut buf);

    running.stop();
    // A second stop must still be a no-op (spec §8 "Idempotent shutdown").
    running.stop();
}
