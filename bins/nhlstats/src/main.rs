use std::num::NonZeroU64;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use stats_core::action::{Action, ScheduleConfig};
use stats_core::cfg::{self, AppId};
use stats_core::collect::Fetcher;
use stats_core::{cache, logx};
use tokio::sync::watch;
use tracing::{debug, info, warn};

mod invoker;
mod scheduler;

use invoker::CollectInvoker;
use scheduler::Scheduler;

const APP: AppId = AppId {
    qualifier: "com",
    organization: "local",
    application: env!("CARGO_PKG_NAME"), // <- no literal; comes from crate name
};

/// How long shutdown waits for an in-flight invocation to finish.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = env!("CARGO_PKG_NAME"), version, about = "NHL statistics collection driver")]
struct Cli {
    /// Collection action to run (case-insensitive)
    action: Option<String>,
    /// Consult the local page cache before fetching
    #[arg(short = 'c', long = "use-cache")]
    use_cache: bool,
    /// Repeat the action every FREQUENCY seconds; omit to run once
    #[arg(short, long)]
    frequency: Option<NonZeroU64>,
    /// Abort an invocation after TIMEOUT seconds
    #[arg(short, long)]
    timeout: Option<NonZeroU64>,
    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn usage_error(msg: &str) -> ExitCode {
    eprintln!("error: {msg}");
    eprintln!(
        "usage: {} [-c] [-f SECONDS] [-t SECONDS] [-v] ACTION",
        env!("CARGO_PKG_NAME")
    );
    eprintln!("known actions: {}", Action::NAMES.join(", "));
    ExitCode::from(1)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let Some(raw) = cli.action.as_deref() else {
        return usage_error("missing action");
    };
    let action: Action = match raw.parse() {
        Ok(a) => a,
        Err(e) => return usage_error(&e.to_string()),
    };

    let cfg = cfg::load_or_init(&APP).expect("config");
    let level = match cli.verbose {
        0 => cfg.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    logx::init(level);

    info!("{} boot action={}", APP.application, action);

    if action.is_noop() {
        debug!("action {} collects nothing, exiting", action);
        return ExitCode::SUCCESS;
    }

    let schedule = ScheduleConfig {
        action,
        use_cache: cli.use_cache,
        frequency_secs: cli.frequency,
    };

    let cache = cache::open(&cfg.cache_dir).expect("cache dir");
    let fetcher = match Fetcher::new(&cfg, cache) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: bad collector config: {e}");
            return ExitCode::from(1);
        }
    };
    let invoker = CollectInvoker::new(
        fetcher,
        schedule.action,
        schedule.use_cache,
        cli.timeout.map(|t| Duration::from_secs(t.get())),
    );

    match schedule.frequency_secs {
        None => {
            tokio::select! {
                res = Scheduler::run_once(|tick| invoker.invoke(tick)) => {
                    if res.outcome.is_success() { ExitCode::SUCCESS } else { ExitCode::from(1) }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupt received");
                    ExitCode::SUCCESS
                }
            }
        }
        Some(freq) => {
            let sched = Scheduler::new(Duration::from_secs(freq.get()), SHUTDOWN_GRACE);
            let (stop_tx, stop_rx) = watch::channel(false);
            let invoker = Arc::new(invoker);
            let handle = tokio::spawn(sched.run_forever(
                move |tick| {
                    let inv = invoker.clone();
                    async move { inv.invoke(tick).await }
                },
                stop_rx,
            ));

            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("interrupt listener failed: {e}");
            }
            info!("interrupt received, stopping schedule");
            let _ = stop_tx.send(true);
            let _ = handle.await;
            ExitCode::SUCCESS
        }
    }
}
