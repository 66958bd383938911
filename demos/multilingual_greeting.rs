//! Greets a caller in the language named by the message's `lang` routing
//! key, via the messaging adapter (C10) instead of raw WebSocket text.

use tidalpool::messaging::{self, Message as AppMessage};
use tidalpool::server::{Config, Server};
use tidalpool::worker::{Handler, Reply};
use tidalpool::ws::frame::Opcode;
use tidalpool::ws::message::Message as WsMessage;

struct Greeter;

fn greeting(lang: &str) -> &'static str {
    match lang {
        "fr" => "Bonjour, monde!",
        "es" => "¡Hola, mundo!",
        "de" => "Hallo, Welt!",
        "ja" => "こんにちは、世界！",
        _ => "Hello, world!",
    }
}

impl Handler<()> for Greeter {
    fn process(&self, cid: u32, _ctx: &mut (), message: WsMessage, reply: &Reply) {
        let decoded = match messaging::from_ws(&message) {
            Ok(m) => m,
            Err(_) => return reply.send_and_close(cid, Opcode::Close, b""),
        };

        let lang = decoded.routing.get("lang").map(String::as_str).unwrap_or("en");
        let reply_message: AppMessage = decoded.reply_with(greeting(lang).as_bytes().to_vec());

        match messaging::to_ws_payload(&reply_message) {
            Ok(bytes) => reply.send(cid, messaging::BINARY_FRAME_OPCODE, &bytes),
            Err(_) => reply.send_and_close(cid, Opcode::Close, b""),
        }
    }
}

fn main() -> std::io::Result<()> {
    tidalpool::trace::init(3);

    let mut running = Server::<(), Greeter>::builder()
        .listen("127.0.0.1:8083".parse().unwrap())
        .handler(Greeter)
        .config(Config {
            num_workers: 2,
            ..Config::default()
        })
        .build()
        .launch()?;

    println!("multilingual greeting listening on ws://127.0.0.1:8083, press enter to stop");
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;

    running.stop();
    Ok(())
}
