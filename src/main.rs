//! Fill Station - serial telemetry bridge binary
//!
//! Connects to the conveyor controller and serves the dashboard.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use fill_station::{
    discover, list_host_ports, start_web_server, SerialBackend, Station, StationConfig,
    WebConfig, DEFAULT_BAUD_RATE, DEFAULT_SERIAL_PORT, DEFAULT_WEB_PORT,
};
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "fill_station")]
#[command(about = "Fill Station - conveyor and cup-filling telemetry bridge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Austin Couch")]
#[command(long_about = "Reads sensor telemetry from a serial device and serves a web dashboard")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Web server bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Web server port
    #[arg(short, long, default_value_t = DEFAULT_WEB_PORT)]
    port: u16,

    /// Serial device to try first
    #[arg(short, long, default_value = DEFAULT_SERIAL_PORT)]
    serial: String,

    /// Serial baud rate
    #[arg(short, long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the device and start the web server (default)
    Serve(ServeArgs),

    /// List candidate and OS-reported serial ports and exit
    Ports,
}

#[derive(Args)]
struct ServeArgs {
    /// Disable CORS headers
    #[arg(long)]
    no_cors: bool,

    /// Number of fill events kept in memory
    #[arg(long, default_value_t = fill_station::DEFAULT_HISTORY_CAPACITY)]
    history: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging
    init_logging(&cli)?;

    // Print banner
    print_banner();

    match &cli.command {
        Some(Commands::Serve(args)) => serve_command(&cli, args).await?,
        Some(Commands::Ports) => ports_command(),
        None => {
            // Default to serve command
            let serve_args = ServeArgs {
                no_cors: false,
                history: fill_station::DEFAULT_HISTORY_CAPACITY,
            };
            serve_command(&cli, &serve_args).await?;
        }
    }

    Ok(())
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

fn print_banner() {
    println!("Fill Station - conveyor telemetry bridge");
    println!("   Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
}

fn station_config(cli: &Cli, args: &ServeArgs) -> StationConfig {
    StationConfig::new(&cli.serial, cli.baud).with_history_capacity(args.history)
}

async fn serve_command(cli: &Cli, args: &ServeArgs) -> anyhow::Result<()> {
    info!("Starting fill station...");

    let station = Station::new(station_config(cli, args)).context("Invalid station configuration")?;
    let _tasks = station.spawn(SerialBackend);
    info!(
        "Link manager started on {} at {} baud",
        cli.serial, cli.baud
    );

    let web_config = WebConfig::new(&cli.host, cli.port).with_cors(!args.no_cors);

    info!("Web server configuration:");
    info!("  - Bind address: {}:{}", cli.host, cli.port);
    info!("  - CORS enabled: {}", !args.no_cors);
    info!("  - Event history: {}", args.history);

    start_web_server(web_config, station).await?;

    Ok(())
}

fn ports_command() {
    println!("Candidate ports:");
    let candidates = discover();
    if candidates.is_empty() {
        println!("  (none found)");
    }
    for port in &candidates {
        println!("  {}", port);
    }
    println!();

    println!("Ports reported by the OS:");
    let host_ports = list_host_ports();
    if host_ports.is_empty() {
        println!("  (none found)");
    }
    for port in &host_ports {
        match (port.vid, port.pid) {
            (Some(vid), Some(pid)) => println!(
                "  {} [{}] {:04x}:{:04x} {}",
                port.name,
                port.kind,
                vid,
                pid,
                port.product.as_deref().unwrap_or("")
            ),
            _ => println!("  {} [{}]", port.name, port.kind),
        }
    }
}
