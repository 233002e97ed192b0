//! Book catalogue server.
//!
//! # Running
//! ```bash
//! cargo run -p book-server -- --port 4000
//! ```
//!
//! Then ask for a book with a deferred author:
//! ```bash
//! curl -N localhost:4000/graphql -H 'content-type: application/json' \
//!   -d '{"query":"{ bookById(id: \"book-2\") { name ... @defer { author { firstName lastName } } } }"}'
//! ```

use std::time::Duration;

use book_server::{BookEngine, Latency};
use clap::Parser;
use dgql_server::{GraphQlServer, ServerConfig, ServerError, ServerResult};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "book-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 4000)]
    port: u16,

    /// Endpoint path
    #[arg(long, default_value = "/graphql")]
    path: String,

    /// Send every result as a single JSON body
    #[arg(long)]
    no_defer: bool,

    /// Omit transfer-encoding/connection/keep-alive headers (for HTTP/2 proxies)
    #[arg(long)]
    no_connection_headers: bool,

    /// Keep-alive hint for incremental responses, in seconds
    #[arg(long, default_value_t = 5)]
    keep_alive: u64,

    /// Resolver delay in milliseconds for author lookups; book delays scale with it
    #[arg(long, default_value_t = 500)]
    latency_ms: u64,
}

impl Cli {
    fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::new()
            .host(self.host.as_str())
            .port(self.port)
            .path(self.path.as_str())
            .keep_alive_secs(self.keep_alive);
        if self.no_defer {
            config = config.no_incremental_delivery();
        }
        if self.no_connection_headers {
            config = config.no_connection_headers();
        }
        config
    }

    fn latency(&self) -> Latency {
        let simulated = Latency::simulated();
        let factor = Duration::from_millis(self.latency_ms).as_secs_f64()
            / simulated.author.as_secs_f64();
        simulated.scaled(factor)
    }
}

#[tokio::main]
async fn main() -> ServerResult<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dgql=info,book_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).compact())
        .init();

    let cli = Cli::parse();

    let engine = BookEngine::with_seed_data()
        .map_err(|e| ServerError::internal(format!("Failed to build engine: {e}")))?
        .latency(cli.latency());
    info!(
        incremental = !cli.no_defer,
        latency_ms = cli.latency_ms,
        "Book catalogue loaded"
    );

    GraphQlServer::builder()
        .config(cli.server_config())
        .engine(engine)
        .build()?
        .listen()
        .await
}
