//! Daemon entrypoint. Bootstrap follows `pattern_server`'s `main.rs`: install
//! a fancy `miette` report hook plus panic hook before anything fallible
//! runs, then initialize `tracing_subscriber` from `RUST_LOG` (falling back
//! to a sensible default) before touching the network or the state store.

use clap::Parser;
use letta_matrix_bridge::config::Config;
use letta_matrix_bridge::context::BridgeContext;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> miette::Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .rgb_colors(miette::RgbColors::Preferred)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))?;
    miette::set_panic_hook();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("letta_matrix_bridge=info")))
        .json()
        .with_file(true)
        .with_line_number(true)
        .with_current_span(true)
        .init();

    let config = Config::parse();
    tracing::info!(
        matrix_homeserver = %config.matrix_homeserver_url,
        letta_api_url = %config.letta_api_url,
        dev_mode = config.dev_mode,
        "starting letta-matrix-bridge"
    );

    let ctx = BridgeContext::new(config).await.into_diagnostic()?;
    ctx.run().await
}
