//! Stream capturer command-line entry point.
//!
//! ```text
//! stream-capturer [--debug] [--url WS_URL] <command>
//!
//! Commands:
//!   serve   [--port N] [--bind IP] [--storage PATH | --memory]
//!           [--proxy URL] [--capacity N] [--scheme legacy|sha256] [--install]
//!   list    [--type TYPE] [--unique]
//!   state
//!   toggle  on|off
//!   clear
//!   proxy   URL
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use stream_capturer::capture::DEFAULT_CAPACITY;
use stream_capturer::capture::record::now_millis;
use stream_capturer::transport::DEFAULT_BIND_IP;
use stream_capturer::{
    DEFAULT_PORT, DEFAULT_PROXY_ENDPOINT, Error, FingerprintScheme, Host, HostOptions, Result,
    StreamFilter, StreamType, SurfaceClient, format_age,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Types
// ============================================================================

/// Passive HLS/DASH stream capturer.
#[derive(Debug, Parser)]
#[command(name = "stream-capturer", version)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Host WebSocket URL for client commands
    #[arg(long, global = true, default_value_t = format!("ws://127.0.0.1:{DEFAULT_PORT}"))]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the host.
    Serve(ServeArgs),

    /// List captured streams, newest first.
    List {
        /// Only show this stream type (e.g. master-m3u8)
        #[arg(long = "type", value_name = "TYPE")]
        stream_type: Option<StreamType>,

        /// Hide duplicate URLs
        #[arg(long)]
        unique: bool,
    },

    /// Show the capture flag and badge.
    State,

    /// Turn capturing on or off.
    Toggle {
        #[arg(value_enum)]
        state: Switch,
    },

    /// Clear the captured list.
    Clear,

    /// Hand a stream URL to the proxy server.
    Proxy {
        /// Stream URL to forward.
        #[arg(value_name = "URL")]
        target: String,
    },
}

#[derive(Debug, Args)]
struct ServeArgs {
    /// Port to listen on (0 picks a free one)
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address to bind
    #[arg(long, default_value_t = DEFAULT_BIND_IP)]
    bind: IpAddr,

    /// State file path
    #[arg(long, value_name = "PATH", conflicts_with = "memory")]
    storage: Option<PathBuf>,

    /// Keep state in memory only
    #[arg(long)]
    memory: bool,

    /// Proxy server endpoint
    #[arg(long, value_name = "URL", default_value = DEFAULT_PROXY_ENDPOINT)]
    proxy: String,

    /// Maximum retained streams
    #[arg(long, value_name = "N", default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    /// Fingerprint scheme (legacy or sha256)
    #[arg(long, default_value = "sha256")]
    scheme: FingerprintScheme,

    /// Reset state as on first install
    #[arg(long)]
    install: bool,
}

impl ServeArgs {
    fn into_options(self) -> HostOptions {
        let mut options = HostOptions::new()
            .with_port(self.port)
            .with_bind_ip(self.bind)
            .with_proxy_endpoint(self.proxy)
            .with_capacity(self.capacity)
            .with_scheme(self.scheme);

        if self.memory {
            options = options.with_memory_storage();
        } else if let Some(path) = self.storage {
            options = options.with_storage_path(path);
        }
        if self.install {
            options = options.with_install();
        }
        options
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Switch {
    On,
    Off,
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging.
fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("stream_capturer=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stream_capturer=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn serve(options: HostOptions) -> Result<()> {
    let host = Arc::new(Host::builder().options(options).build().await?);
    let server = host.serve().await?;

    println!("Listening on {}", server.ws_url());
    println!("Press Ctrl+C to exit...");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    server.shutdown();
    Ok(())
}

async fn list(client: &mut SurfaceClient, filter: StreamFilter) -> Result<()> {
    let streams = client.streams().await?;
    let shown = filter.apply(&streams);

    if shown.is_empty() {
        println!("{}", filter.empty_message(streams.len()));
        return Ok(());
    }

    let now = now_millis();
    for stream in shown {
        println!("[{}] {}", stream.stream_type.label(), stream.title_or_unknown());
        println!("    {}", stream.url);
        println!("    {}", format_age(stream.timestamp, now));
    }
    Ok(())
}

async fn run_client(url: &str, command: Command) -> Result<()> {
    let mut client = SurfaceClient::connect(url).await?;

    match command {
        Command::List {
            stream_type,
            unique,
        } => {
            let mut filter = StreamFilter::new();
            if let Some(stream_type) = stream_type {
                filter = filter.with_type(stream_type);
            }
            if unique {
                filter = filter.with_hide_duplicates();
            }
            list(&mut client, filter).await?;
        }
        Command::State => {
            let state = client.state().await?;
            let badge = if state.badge.is_empty() {
                "-"
            } else {
                state.badge.as_str()
            };
            println!("capturing: {}  badge: {badge}", state.is_capturing);
        }
        Command::Toggle { state } => {
            let is_capturing = client.toggle_capture(state == Switch::On).await?;
            println!("capturing: {is_capturing}");
        }
        Command::Clear => {
            client.clear().await?;
            println!("Cleared.");
        }
        Command::Proxy { target } => {
            let result = client.send_to_proxy(target).await?;
            println!("{}", result.proxy_url);
        }
        Command::Serve(_) => {
            return Err(Error::invalid_argument("serve does not take a host URL"));
        }
    }

    client.close().await
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match cli.command {
        Command::Serve(args) => serve(args.into_options()).await,
        command => run_client(&cli.url, command).await,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;

    fn parse(args: &[&str]) -> std::result::Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("stream-capturer").chain(args.iter().copied()))
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve_flags() {
        let cli = parse(&["--debug", "serve", "--port", "0", "--memory", "--scheme", "legacy"])
            .expect("parse");
        assert!(cli.debug);
        match cli.command {
            Command::Serve(args) => {
                let options = args.into_options();
                assert_eq!(options.port, 0);
                assert!(options.storage_path.is_none());
                assert_eq!(options.scheme, FingerprintScheme::Legacy);
                assert_eq!(options.capacity, DEFAULT_CAPACITY);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_serve_defaults() {
        let cli = parse(&["serve"]).expect("parse");
        match cli.command {
            Command::Serve(args) => {
                let options = args.into_options();
                assert_eq!(options.port, DEFAULT_PORT);
                assert_eq!(options.bind_ip, DEFAULT_BIND_IP);
                assert_eq!(options.proxy_endpoint, DEFAULT_PROXY_ENDPOINT);
                assert_eq!(options.scheme, FingerprintScheme::Sha256);
                assert!(options.storage_path.is_some());
                assert!(!options.install);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_list_filter() {
        let cli = parse(&["list", "--type", "master-m3u8", "--unique"]).expect("parse");
        match cli.command {
            Command::List {
                stream_type,
                unique,
            } => {
                assert_eq!(stream_type, Some(StreamType::MasterM3u8));
                assert!(unique);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_url_and_toggle() {
        let cli = parse(&["--url", "ws://10.0.0.2:1", "toggle", "off"]).expect("parse");
        assert_eq!(cli.url, "ws://10.0.0.2:1");
        assert!(matches!(cli.command, Command::Toggle { state: Switch::Off }));
    }

    #[test]
    fn test_parse_proxy_target() {
        let cli = parse(&["proxy", "https://cdn.example.com/master.m3u8"]).expect("parse");
        match cli.command {
            Command::Proxy { target } => assert_eq!(target, "https://cdn.example.com/master.m3u8"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["toggle", "maybe"]).is_err());
        assert!(parse(&["proxy"]).is_err());
        assert!(parse(&["list", "--type", "mp3"]).is_err());
        assert!(parse(&["serve", "--scheme", "md5"]).is_err());
        assert!(parse(&["serve", "--memory", "--storage", "state.json"]).is_err());
        assert!(parse(&["launch"]).is_err());
    }
}
