use sonos_deck::{HostRenderer, LaunchArgs, Plugin, Sonos, StreamDeck};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sonos_deck=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();

    let args = match LaunchArgs::from_host_args(std::env::args()) {
        Ok(args) => args,
        Err(e) => e.exit(),
    };

    let deck = StreamDeck::new();
    let renderer = Arc::new(HostRenderer::new(deck.clone()));
    let plugin = Plugin::install(deck.clone(), Sonos::new(), renderer);

    if let Err(e) = deck
        .connect(args.port, &args.plugin_uuid, &args.register_event, &args.info, None)
        .await
    {
        tracing::error!("Failed to connect to Stream Deck on port {}: {}", args.port, e);
        std::process::exit(1);
    }

    tokio::select! {
        _ = deck.closed() => tracing::info!("Stream Deck closed the connection"),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
            deck.disconnect();
        }
    }

    plugin.shutdown();
}
