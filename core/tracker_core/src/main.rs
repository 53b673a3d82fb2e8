use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use focus_probe::NativeProbe;
use tokio_util::sync::CancellationToken;
use tracing::info;

use tracker_core::{
    api::{self, AppState},
    clock::{Clock, SystemClock},
    compute_stats, ranked,
    stats::fmt_hms,
    ActivityTracker, Event, EventStore, Lookback, TrackerConfig,
};

const DEFAULT_PORT: u16 = 17600;

#[derive(Parser, Debug)]
#[command(name = "tracker_core", version)]
struct Args {
    /// SQLite database path.
    #[arg(long, default_value = "./data/app-usage.db")]
    db: PathBuf,

    /// Listen address for the stats API.
    ///
    /// Accepts ip:port (e.g. 127.0.0.1:17600), a bare ip (implies port 17600),
    /// or localhost[:port].
    #[arg(long, default_value = "127.0.0.1:17600")]
    listen: String,

    /// Sampling interval (milliseconds).
    #[arg(long, default_value_t = 1000)]
    sample_ms: u64,

    /// Give up on a single focus probe after this long (milliseconds) and
    /// record the tick as Idle. Defaults to the sampling interval.
    #[arg(long)]
    probe_timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Track focus and serve the stats API (default).
    Run,
    /// Print time per application from the stored history and exit.
    Report {
        /// all, 24h, 48h, week, month, year, or a custom span such as 90m.
        #[arg(long, default_value = "all")]
        range: Lookback,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tracker_core=info,focus_probe=info,tower_http=info".into()
            }),
        )
        .init();

    let mut args = Args::parse();
    let command = args.command.take().unwrap_or(Command::Run);

    // Without a working store nothing can be made durable: fail startup.
    let store = EventStore::open(&args.db)
        .with_context(|| format!("cannot open event store at {}", args.db.display()))?;
    store
        .init()
        .with_context(|| format!("cannot initialise event store at {}", args.db.display()))?;
    let history = store.load_all().context("cannot read stored events")?;
    info!("DB: {} ({} events loaded)", args.db.display(), history.len());

    match command {
        Command::Report { range } => {
            store.close()?;
            print_report(&history, range);
            Ok(())
        }
        Command::Run => run(args, store, history).await,
    }
}

async fn run(args: Args, store: EventStore, history: Vec<Event>) -> anyhow::Result<()> {
    let addr = parse_listen(&args.listen)?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot listen on {addr}"))?;

    let config = TrackerConfig::from_millis(args.sample_ms, args.probe_timeout_ms);
    let mut tracker = ActivityTracker::new(
        store,
        history,
        Arc::new(NativeProbe::new()),
        Arc::new(SystemClock),
        config,
    );
    tracker.start();

    let shutdown = CancellationToken::new();
    let app = api::router(AppState::new(tracker.handle(), shutdown.clone()));

    info!("Core listening on http://{addr}");
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await;

    tracker.stop().await;
    info!("tracker stopped");
    served?;
    Ok(())
}

fn print_report(history: &[Event], range: Lookback) {
    let now = SystemClock.now();
    let rows = ranked(compute_stats(history, range.duration(), now));

    let width = rows
        .iter()
        .map(|r| r.app.chars().count())
        .max()
        .unwrap_or(0)
        .max(3);
    println!("Interval: {}", range.label());
    println!("{:<width$}  {}", "App", "time (h:m:s)");
    for r in rows {
        println!("{:<width$}  {}", r.app, fmt_hms(r.seconds));
    }
}

fn parse_listen(input: &str) -> anyhow::Result<SocketAddr> {
    if let Ok(addr) = input.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = input.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    if input == "localhost" {
        return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), DEFAULT_PORT));
    }

    if let Some((host, port_str)) = input.rsplit_once(':') {
        let port = || -> anyhow::Result<u16> {
            port_str.parse().map_err(|_| {
                anyhow::anyhow!(
                    "invalid --listen '{input}': bad port. Example: 127.0.0.1:{DEFAULT_PORT}"
                )
            })
        };
        if host == "localhost" {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), port()?));
        }
        // IPv6 without brackets, e.g. ::1:17600
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, port()?));
        }
    }

    Err(anyhow::anyhow!(
        "invalid --listen '{input}'. Use ip:port (e.g. 127.0.0.1:{DEFAULT_PORT}) or ip (e.g. 127.0.0.1)."
    ))
}

async fn shutdown_signal(exit: CancellationToken) {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("shutdown requested (ctrl-c)"),
        _ = exit.cancelled() => info!("shutdown requested"),
    }
}
