//! Echoes every inbound text or binary message back to the sender
//! unchanged.

use tidalpool::server::{Config, Server};
use tidalpool::worker::{Handler, Reply};
use tidalpool::ws::frame::Opcode;
use tidalpool::ws::message::Message;

struct Echo;

impl Handler<()> for Echo {
    fn process(&self, cid: u32, _ctx: &mut (), message: Message, reply: &Reply) {
        let opcode = match message.opcode {
            tidalpool::ws::frame::Opcode::Binary => Opcode::Binary,
            _ => Opcode::Text,
        };
        reply.send(cid, opcode, &message.payload);
    }
}

fn main() -> std::io::Result<()> {
    tidalpool::trace::init(3);

    let mut running = Server::<(), Echo>::builder()
        .listen("127.0.0.1:8081".parse().unwrap())
        .handler(Echo)
        .config(Config {
            num_workers: 4,
            ..Config::default()
        })
        .build()
        .launch()?;

    println!("echo server listening on ws://127.0.0.1:8081, press enter to stop");
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;

    running.stop();
    Ok(())
}
