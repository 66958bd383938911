//! Smallest possible WebSocket server: replies "Hello, world!" to every
//! inbound text message.

use tidalpool::server::{Config, Server};
use tidalpool::worker::{Handler, Reply};
use tidalpool::ws::frame::Opcode;
use tidalpool::ws::message::Message;

struct HelloWorld;

impl Handler<()> for HelloWorld {
    fn process(&self, cid: u32, _ctx: &mut (), _message: Message, reply: &Reply) {
        reply.send(cid, Opcode::Text, b"Hello, world!");
    }
}

fn main() -> std::io::Result<()> {
    tidalpool::trace::init(3);

    let mut running = Server::<(), HelloWorld>::builder()
        .listen("127.0.0.1:8080".parse().unwrap())
        .handler(HelloWorld)
        .config(Config {
            num_workers: 2,
            ..Config::default()
        })
        .build()
        .launch()?;

    println!("listening on ws://127.0.0.1:8080, press enter to stop");
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;

    running.stop();
    Ok(())
}
