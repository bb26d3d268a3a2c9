//! podwave: staged, wave-based scale-up.
//!
//! Reads a list of workloads, groups them into waves and, wave by wave,
//! scales each one up in steps, waits for the rollout and validates the
//! new pods over HTTP. Ends with a per-workload summary.
//!
//! # Usage
//!
//! ```text
//! podwave run --config /config/deployments.yaml --namespace shop
//! podwave plan --config rollout.toml
//! ```

mod plan;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::fmt::time::Uptime;
use tracing_subscriber::EnvFilter;

use podwave_cluster::{create_client, KubeCluster};
use podwave_core::{parse_duration, RolloutConfig, WorkloadSpec, DEFAULT_CONFIG_PATH};
use podwave_health::HttpProber;
use podwave_rollout::{Concurrency, RolloutDriver, WaveExecutor, WavePlan};

#[derive(Parser, Debug)]
#[command(name = "podwave", version, about = "Staged, wave-based workload scale-up")]
struct Cli {
    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scale every configured workload, wave by wave.
    Run(RunArgs),
    /// Print waves and scale sequences without contacting the cluster.
    Plan {
        /// Rollout configuration (JSON, or TOML with a .toml extension).
        #[arg(long, short, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Rollout configuration (JSON, or TOML with a .toml extension).
    #[arg(long, short, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Namespace holding the workloads.
    #[arg(long, short, default_value = "default")]
    namespace: String,

    /// Kubeconfig to use instead of in-cluster or default discovery.
    #[arg(long)]
    kubeconfig: Option<PathBuf>,

    /// Interval between rollout status polls.
    #[arg(long, default_value = "10s", value_parser = duration_arg)]
    poll_interval: Duration,

    /// Pause between validation rounds.
    #[arg(long, default_value = "10s", value_parser = duration_arg)]
    retry_interval: Duration,

    /// Per-request timeout for validation probes.
    #[arg(long, default_value = "5s", value_parser = duration_arg)]
    probe_timeout: Duration,

    /// Process workloads within a wave one at a time.
    #[arg(long)]
    sequential: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Plain,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Plan { config } => {
            let plan = WavePlan::group(load_workloads(&config)?);
            print!("{}", plan::render(&plan));
            Ok(())
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(Uptime::default());

    match format {
        LogFormat::Plain => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let workloads = load_workloads(&args.config)?;
    info!(
        config = %args.config.display(),
        workloads = workloads.len(),
        namespace = %args.namespace,
        "configuration loaded"
    );

    let client = create_client(args.kubeconfig.as_deref()).await?;
    let cluster = Arc::new(KubeCluster::new(client, &args.namespace));
    let prober = Arc::new(HttpProber::new(args.probe_timeout));

    let concurrency = if args.sequential {
        Concurrency::Sequential
    } else {
        Concurrency::Concurrent
    };
    let driver = RolloutDriver::new(
        WaveExecutor::new(cluster, prober)
            .with_poll_interval(args.poll_interval)
            .with_retry_interval(args.retry_interval)
            .with_concurrency(concurrency),
    );

    let report = tokio::select! {
        report = driver.run(workloads) => report,
        _ = tokio::signal::ctrl_c() => {
            anyhow::bail!("interrupted while {}", driver.phase());
        }
    };

    println!("{report}");
    Ok(())
}

fn load_workloads(path: &Path) -> anyhow::Result<Vec<WorkloadSpec>> {
    Ok(RolloutConfig::from_file(path)?.into_workloads()?)
}

fn duration_arg(raw: &str) -> Result<Duration, String> {
    parse_duration(raw).ok_or_else(|| format!("invalid duration '{raw}' (e.g. 10s, 1m30s, 500ms)"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    #[test]
    fn run_defaults() {
        let cli = Cli::try_parse_from(["podwave", "run"]).unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(args.namespace, "default");
        assert_eq!(args.poll_interval, Duration::from_secs(10));
        assert_eq!(args.retry_interval, Duration::from_secs(10));
        assert_eq!(args.probe_timeout, Duration::from_secs(5));
        assert!(!args.sequential);
        assert_eq!(cli.log_format, LogFormat::Plain);
    }

    #[test]
    fn run_overrides() {
        let cli = Cli::try_parse_from([
            "podwave",
            "--log-format",
            "json",
            "run",
            "-c",
            "rollout.toml",
            "-n",
            "shop",
            "--poll-interval",
            "2s",
            "--retry-interval",
            "1m30s",
            "--sequential",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config, PathBuf::from("rollout.toml"));
        assert_eq!(args.namespace, "shop");
        assert_eq!(args.poll_interval, Duration::from_secs(2));
        assert_eq!(args.retry_interval, Duration::from_secs(90));
        assert!(args.sequential);
    }

    #[test]
    fn rejects_bad_duration() {
        let err = Cli::try_parse_from(["podwave", "run", "--poll-interval", "soon"]).unwrap_err();
        assert!(err.to_string().contains("invalid duration 'soon'"));
    }

    #[test]
    fn loads_json_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"deployments": [{{"name": "api", "maxReplicas": 3,
                "validation": {{"url": "http://{{podIP}}/health"}}}}]}}"#
        )
        .unwrap();

        let workloads = load_workloads(file.path()).unwrap();
        assert_eq!(workloads.len(), 1);
        assert_eq!(workloads[0].name, "api");
        assert_eq!(workloads[0].max_replicas, 3);
    }

    #[test]
    fn invalid_config_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"deployments": [{{"name": "api", "maxReplicas": 3, "scaleStep": 0,
                "validation": {{"url": "http://{{podIP}}/health"}}}}]}}"#
        )
        .unwrap();

        let err = load_workloads(file.path()).unwrap_err();
        assert!(err.to_string().contains("api"));
    }
}
