use clap::{Parser, Subcommand, ValueEnum};
use roda_pulse::http::{AdminClient, AllowlistKind, HttpSnapshotSource};
use roda_pulse::ring::sparkline;
use roda_pulse::wire::{Allowlist, DashboardSummary};
use roda_pulse::{
    AccessGate, Aggregator, Anomaly, AuditEntry, CorrelationSurface, OutputCollector,
    PasswordGate, PulseConfig, PulseError, RateSample, Related, RequestEvent, Scheduler, Stage,
    TelemetryRecord, filter, format_count, inspect, now_ms, pipe, progress,
};
use spdlog::prelude::*;
use spdlog::{Level, LevelFilter};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "roda-pulse", about = "Live request telemetry: rates, anomalies, top-K")]
struct Args {
    /// JSON configuration file; flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll /metrics-summary and print live rates with a sparkline.
    Watch {
        #[arg(long)]
        url: String,
        #[arg(long)]
        route: Option<String>,
        #[arg(long)]
        ip: Option<String>,
        #[arg(long)]
        interval_ms: Option<u64>,
        #[arg(long)]
        window_seconds: Option<u64>,
        /// Stop after this many seconds; 0 runs until interrupted.
        #[arg(long, default_value_t = 0)]
        duration_secs: u64,
        /// SHA-256 hex digest guarding the dashboard.
        #[arg(long, requires = "password")]
        password_hash: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Fetch /analytics/dashboard and print it.
    Dashboard {
        #[arg(long)]
        url: String,
        #[arg(long)]
        json: bool,
    },
    /// Aggregate a JSON-lines file of request events offline.
    Replay {
        #[arg(long)]
        events: PathBuf,
        /// Only aggregate these routes (comma separated).
        #[arg(long, value_delimiter = ',')]
        routes: Vec<String>,
    },
    /// Show telemetry and audit records related to an id.
    Correlate {
        #[arg(long)]
        records: PathBuf,
        #[arg(long)]
        audit: PathBuf,
        #[arg(long)]
        id: String,
    },
    /// Read or replace a server-side allowlist.
    Allowlist {
        #[arg(long)]
        url: String,
        #[arg(long, value_enum)]
        kind: Kind,
        /// New entries; without them the current list is printed.
        #[arg(long, value_delimiter = ',')]
        set: Option<Vec<String>>,
        /// Falls back to RODA_PULSE_API_KEY.
        #[arg(long)]
        api_key: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Route,
    Ip,
}

const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    if args.verbose {
        spdlog::default_logger().set_level_filter(LevelFilter::MoreSevereEqual(Level::Debug));
    }

    let config = match &args.config {
        Some(path) => PulseConfig::from_json_file(path)?,
        None => PulseConfig::default(),
    };

    match args.command {
        Command::Watch {
            url,
            route,
            ip,
            interval_ms,
            window_seconds,
            duration_secs,
            password_hash,
            password,
        } => {
            let mut poll = config.poll.clone();
            poll.interval_ms = interval_ms.unwrap_or(poll.interval_ms);
            poll.window_seconds = window_seconds.unwrap_or(poll.window_seconds);

            let mut source = HttpSnapshotSource::new(url, HTTP_TIMEOUT);
            if let Some(route) = route {
                source = source.with_route(route);
            }
            if let Some(ip) = ip {
                source = source.with_ip(ip);
            }

            let mut scheduler = Scheduler::new(source, poll)?;
            if let Some(hash) = password_hash {
                let gate = Arc::new(PasswordGate::new(hash));
                if !gate.unlock(password.as_deref().unwrap_or_default()) {
                    error!("wrong password, dashboard stays locked");
                }
                let gate: Arc<dyn AccessGate> = gate;
                scheduler = scheduler.with_gate(gate);
            }
            watch(&mut scheduler, duration_secs);
        }
        Command::Dashboard { url, json } => {
            let summary = AdminClient::new(url, None, HTTP_TIMEOUT).dashboard()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_dashboard(&summary);
            }
        }
        Command::Replay { events, routes } => {
            let summary = replay(&events, &config, Allowlist::new(routes))?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Correlate { records, audit, id } => {
            correlate(&records, &audit, &id, config.correlation_window_ms)?;
        }
        Command::Allowlist {
            url,
            kind,
            set,
            api_key,
        } => {
            let kind = match kind {
                Kind::Route => AllowlistKind::Route,
                Kind::Ip => AllowlistKind::Ip,
            };
            let api_key = api_key.or_else(|| std::env::var("RODA_PULSE_API_KEY").ok());
            let admin = AdminClient::new(url, api_key, HTTP_TIMEOUT);
            let list = match set {
                Some(entries) => admin.set_allowlist(kind, &entries)?,
                None => admin.allowlist(kind)?,
            };
            for entry in list.allowlist {
                println!("{}", entry);
            }
        }
    }
    Ok(())
}

fn watch(scheduler: &mut Scheduler<HttpSnapshotSource>, duration_secs: u64) {
    let refresh = Duration::from_millis(scheduler.config().interval_ms);
    let started = Instant::now();
    scheduler.start();

    while duration_secs == 0 || started.elapsed() < Duration::from_secs(duration_secs) {
        thread::sleep(refresh);
        let samples = scheduler.samples();
        let Some(latest) = samples.last().copied() else {
            continue;
        };
        let rps: Vec<f64> = samples.iter().map(|s: &RateSample| s.rps).collect();
        let stale_ms = scheduler.staleness(now_ms()).unwrap_or(0);
        println!(
            "{} rps  {:.1}% err  {}{}",
            format_count(latest.rps),
            latest.error_rate_pct,
            sparkline(&rps),
            if stale_ms > 3 * refresh.as_millis() as u64 {
                format!("  (stale {}s)", stale_ms / 1000)
            } else {
                String::new()
            }
        );
    }

    scheduler.stop();
    let stats = scheduler.stats();
    info!(
        "ticks={} samples={} skipped={} failures={} resets={} stale={}",
        stats.ticks, stats.samples, stats.skipped, stats.failures, stats.resets, stats.stale
    );
}

fn replay(
    path: &Path,
    config: &PulseConfig,
    routes: Allowlist,
) -> Result<DashboardSummary, PulseError> {
    let mut aggregator = Aggregator::new(config.aggregator.clone())?;
    let mut intake = pipe![
        filter(move |e: &RequestEvent| routes.admits(&e.route)),
        progress("replay", 100_000),
    ];
    let mut report = inspect(|a: &Anomaly| {
        info!(
            "{} at {}: {} requests (mean {:.1}, z {:.2})",
            if a.is_lull() { "lull" } else { "spike" },
            a.minute_ts,
            a.count,
            a.mean,
            a.z
        );
    });
    let mut anomalies = 0usize;
    let mut collect = |a: Anomaly| {
        if report(a).is_some() {
            anomalies += 1;
        }
    };

    let reader = BufReader::new(std::fs::File::open(path)?);
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: RequestEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(err) => {
                warn!("skipping line {}: {}", line_no + 1, err);
                continue;
            }
        };
        intake.process(event, &mut |e: RequestEvent| {
            aggregator.process(e, &mut collect);
        });
    }
    for anomaly in aggregator.flush() {
        collect.push(anomaly);
    }

    let stats = aggregator.stats();
    info!(
        "replayed {} events ({} late, {} future) into {} buckets, {} gap buckets, {} anomalies",
        stats.events,
        stats.late_events,
        stats.future_events,
        stats.buckets_closed,
        stats.gap_buckets,
        anomalies
    );
    Ok(aggregator.reader().load().as_ref().clone())
}

fn correlate(records: &Path, audit: &Path, id: &str, window_ms: u64) -> Result<(), PulseError> {
    let records: Vec<TelemetryRecord> = serde_json::from_reader(std::fs::File::open(records)?)?;
    let audit: Vec<AuditEntry> = serde_json::from_reader(std::fs::File::open(audit)?)?;
    let surface = CorrelationSurface::new(&records, &audit, window_ms);

    let related = surface.find_related(id);
    if related.is_empty() {
        println!("no records related to {}", id);
    }
    for hit in related {
        match hit.record {
            Related::Audit(entry) => println!(
                "audit {} at {} by {}: {} ({:?})",
                entry.id, entry.at_ms, entry.actor, entry.action, hit.reason
            ),
            Related::Telemetry(record) => println!(
                "{:?} {} at {}: {} ({:?})",
                record.kind, record.id, record.at_ms, record.summary, hit.reason
            ),
        }
    }
    Ok(())
}

fn print_dashboard(summary: &DashboardSummary) {
    let totals: Vec<f64> = summary.series.iter().map(|b| b.total as f64).collect();
    println!("{} minutes  {}", summary.minutes, sparkline(&totals));
    println!("top routes:");
    for route in &summary.top_routes {
        println!("  {:>8}  {}", format_count(route.count as f64), route.route);
    }
    println!("anomalies:");
    for a in &summary.anomalies {
        println!(
            "  {}  count={} mean={:.1} std={:.1} z={:.2}",
            a.minute_ts, a.count, a.mean, a.std, a.z
        );
    }
    println!("out of hours:");
    for hour in &summary.out_of_hours_top {
        println!("  {:02}:00  {}", hour.hour, hour.count);
    }
    println!("users:");
    for user in &summary.users_top {
        println!("  {:>8}  {}", user.count, user.id);
    }
}
