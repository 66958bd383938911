//! Dumps metadata about every inbound message for debugging: opcode and
//! byte length, echoed back as a text frame.

use tidalpool::server::{Config, Server};
use tidalpool::worker::{Handler, Reply};
use tidalpool::ws::frame::Opcode;
use tidalpool::ws::message::Message;

struct Inspector;

impl Handler<()> for Inspector {
    fn process(&self, cid: u32, _ctx: &mut (), message: Message, reply: &Reply) {
        let summary = format!(
            "opcode={:?} bytes={} first_bytes={:02x?}",
            message.opcode,
            message.payload.len(),
            &message.payload[..message.payload.len().min(16)],
        );
        tracing::info!(target: "request_inspector", cid, %summary, "inbound message");
        reply.send(cid, Opcode::Text, summary.as_bytes());
    }
}

fn main() -> std::io::Result<()> {
    tidalpool::trace::init(6);

    let mut running = Server::<(), Inspector>::builder()
        .listen("127.0.0.1:8084".parse().unwrap())
        .handler(Inspector)
        .config(Config {
            num_workers: 2,
            ..Config::default()
        })
        .build()
        .launch()?;

    println!("request inspector listening on ws://127.0.0.1:8084, press enter to stop");
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;

    running.stop();
    Ok(())
}
