//! Binary entrypoint that launches the persona agent server.

use std::process::ExitCode;

use persona_agent::start_persona_agent;

/// Start the agent with configuration from the environment.
fn main() -> ExitCode {
    start_persona_agent::run()
}
