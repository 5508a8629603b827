use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{CommandFactory, Parser, ValueEnum};
use hostguard::{
    alerts::AlertDispatcher,
    checks::CheckKind,
    config::{ResolvedConfig, read_config_file},
    logging,
    provider::SysinfoProvider,
    scheduler::{CheckStatus, Scheduler},
    service_manager::CommandServiceManager,
    state::SystemClock,
    tasks::BackgroundTasks,
    util::{get_config_path, get_state_dir},
};
use tracing::{error, info, level_filters::LevelFilter, trace, warn};

/// Periodic host-health checks with throttled alerts
#[derive(Debug, Clone, Parser)]
#[command(version)]
struct Args {
    /// Config file (defaults to $HOSTGUARD_CONFIG, then /etc/hostguard/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbosity of stderr and the log file
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    /// Which check to run
    #[arg(value_enum, default_value_t = Target::All)]
    check: Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Target {
    All,
    Mem,
    Cpu,
    Disk,
    Dirs,
    Servers,
    Services,
    Net,
    Help,
}

impl Target {
    fn kinds(self) -> Vec<CheckKind> {
        match self {
            Target::All => CheckKind::ALL.to_vec(),
            Target::Mem => vec![CheckKind::Memory],
            Target::Cpu => vec![CheckKind::Cpu],
            Target::Disk => vec![CheckKind::Disk],
            Target::Dirs => vec![CheckKind::Dirs],
            Target::Servers => vec![CheckKind::Servers],
            Target::Services => vec![CheckKind::Services],
            Target::Net => vec![CheckKind::Network],
            Target::Help => vec![],
        }
    }
}

fn load_config(path: &Path) -> anyhow::Result<ResolvedConfig> {
    let config_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut config = read_config_file(path)?;
    if let Some(state_dir) = get_state_dir() {
        config.state_dir = Some(state_dir);
    }
    config.resolve(config_dir)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if args.check == Target::Help {
        let _ = Args::command().print_help();
        return ExitCode::SUCCESS;
    }

    dotenv::dotenv().ok();

    let config_path = args.config.clone().unwrap_or_else(get_config_path);
    let config = match load_config(&config_path) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("hostguard: {e:#}");
            return ExitCode::from(1);
        }
    };

    logging::init(&config.state_dir, args.log_level);
    trace!("started with args: {args:?}");
    if !config_path.exists() {
        warn!("no config file at {}, using defaults", config_path.display());
    }

    let service_manager = match CommandServiceManager::detect() {
        Ok(manager) => Arc::new(manager),
        Err(e) => {
            error!("{e}");
            return ExitCode::from(1);
        }
    };

    let tasks = Arc::new(BackgroundTasks::new());
    let alerts = match AlertDispatcher::from_config(&config, tasks.clone()) {
        Ok(alerts) => alerts,
        Err(e) => {
            error!("cannot set up alert transports: {e:#}");
            return ExitCode::from(1);
        }
    };

    let scheduler = match Scheduler::assemble(
        config.clone(),
        Arc::new(SystemClock),
        Arc::new(SysinfoProvider::new()),
        service_manager,
        alerts,
        tasks,
    ) {
        Ok(scheduler) => scheduler,
        Err(e) => {
            error!("cannot open state directory {}: {e}", config.state_dir.display());
            return ExitCode::from(1);
        }
    };

    let summary = scheduler.run(&args.check.kinds()).await;

    let failed = summary
        .results
        .iter()
        .filter(|(_, status)| matches!(status, CheckStatus::Failed(_)))
        .count();
    info!(
        "finished {} checks ({} failed, {} alerts sent)",
        summary.results.len(),
        failed,
        summary.alerts_sent()
    );

    ExitCode::SUCCESS
}
