//! Persona agent server binary.
//! Run with: cargo run --bin persona-server

use std::process::ExitCode;

use persona_agent::start_persona_agent;

fn main() -> ExitCode {
    start_persona_agent::run()
}
