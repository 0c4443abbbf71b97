use ime_client::engine::{Engine, MemoryEngine};
use ime_client::protocol::{Input, KeyEvent, SessionCommand};
use ime_client::transport;
use ime_client::SessionExecutor;

use super::settings_ops;

fn local_engine() -> Box<dyn Engine> {
    Box::new(MemoryEngine::new())
}

/// Type `keys` one character at a time, submit, and print the commit.
pub fn send(settings_file: Option<&str>, keys: &str) {
    let settings = settings_ops::load(settings_file);
    let ex = die!(
        SessionExecutor::bootstrap(&settings, local_engine),
        "Error starting executor: {}"
    );

    for ch in keys.chars() {
        let command = die!(
            ex.evaluate_synchronously(Input::send_key(KeyEvent::character(ch))),
            "Error sending {ch:?}: {}"
        );
        if !command.output.is_success() {
            eprintln!("{ch:?}: {:?}", command.output.error_code);
        }
    }
    let command = die!(
        ex.evaluate_synchronously(Input::send_command(SessionCommand::Submit)),
        "Error submitting: {}"
    );
    match command.output.result {
        Some(result) => println!("{}", result.value),
        None => eprintln!("(nothing committed)"),
    }
}

/// Report which transport the settings resolve to.
pub fn probe(settings_file: Option<&str>) {
    let settings = settings_ops::load(settings_file);
    let t = transport::select(&settings.transport, local_engine);
    println!(
        "{:?} (use_remote={}, host={}, port={})",
        t.kind(),
        settings.transport.use_remote,
        settings.transport.host.as_deref().unwrap_or("-"),
        settings.transport.port.as_deref().unwrap_or("-"),
    );
}
