//! agentctl CLI
//!
//! Binary name: `agentctl`

use std::process;

use agentctl::cli::{build_cli, handlers, setup};

#[tokio::main]
async fn main() {
    let matches = build_cli().get_matches();

    if let Err(e) = setup::init_tracing(matches.get_flag("verbose")) {
        #[allow(clippy::print_stderr)]
        {
            eprintln!("Warning: {e}");
        }
    }

    if let Err(err) = handlers::dispatch(&matches).await {
        #[allow(clippy::print_stderr)]
        {
            eprintln!("Error: {err:#}");
        }

        let code = err
            .downcast_ref::<agentctl_core::Error>()
            .map_or(1, agentctl_core::Error::exit_code);

        #[allow(clippy::exit)]
        process::exit(code);
    }
}
