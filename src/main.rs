use clap::Parser;
use layoutprobe::cdp::CdpLauncher;
use layoutprobe::harness::{self, CancelHandle};
use layoutprobe::serve::StaticServer;
use layoutprobe::suite::{Filter, Suite};
use layoutprobe::{Error, HarnessConfig, Result};
use log::{error, info, warn};
use std::path::PathBuf;

/// Layout assertion harness: checks page geometry across viewport sizes
#[derive(Parser, Debug)]
#[command(name = "layoutprobe", author, version, about, long_about = None)]
struct Cli {
    /// Suite file (TOML); the built-in page table is used when omitted
    #[arg(long)]
    suite: Option<PathBuf>,

    /// Base URL of the site under test
    #[arg(long, env = "LAYOUTPROBE_BASE_URL")]
    base_url: Option<String>,

    /// Only run pages whose path contains this text (repeatable)
    #[arg(long = "page")]
    pages: Vec<String>,

    /// Only run these viewport profiles (repeatable)
    #[arg(long = "viewport")]
    viewports: Vec<String>,

    /// Cases to run in parallel
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Navigation timeout in milliseconds
    #[arg(long)]
    navigation_timeout_ms: Option<u64>,

    /// Timeout for any other browser action in milliseconds
    #[arg(long)]
    action_timeout_ms: Option<u64>,

    /// Serve this directory and test against it
    #[arg(long)]
    serve: Option<PathBuf>,

    /// Listen address for --serve
    #[arg(long, default_value = "127.0.0.1:4173")]
    listen: String,

    /// Save a screenshot of every failing case here
    #[arg(long)]
    artifacts_dir: Option<PathBuf>,

    /// Chrome/Chromium executable
    #[arg(long)]
    chrome_path: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Write the full report as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Skip the base URL reachability check
    #[arg(long)]
    skip_preflight: bool,

    /// Print the (page, viewport) matrix and exit
    #[arg(long)]
    list: bool,

    /// Debug logging and passing assertions in the report
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self, base: Option<HarnessConfig>) -> HarnessConfig {
        let mut cfg = base.unwrap_or_default();
        if let Some(url) = &self.base_url {
            cfg.base_url = url.clone();
        }
        if let Some(j) = self.jobs {
            cfg.concurrency = j;
        }
        if let Some(ms) = self.navigation_timeout_ms {
            cfg.navigation_timeout_ms = ms;
        }
        if let Some(ms) = self.action_timeout_ms {
            cfg.action_timeout_ms = ms;
        }
        if let Some(dir) = &self.artifacts_dir {
            cfg.artifacts_dir = Some(dir.clone());
        }
        if let Some(path) = &self.chrome_path {
            cfg.chrome_path = Some(path.clone());
        }
        if self.headed {
            cfg.headless = false;
        }
        cfg
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let suite = match &cli.suite {
        Some(path) => Suite::from_file(path)?,
        None => Suite::builtin(),
    };
    let mut config = cli.config(suite.harness.clone());
    let filter = Filter {
        pages: cli.pages.clone(),
        viewports: cli.viewports.clone(),
    };

    // Keep the server alive for the whole run
    let _server = match &cli.serve {
        Some(root) => {
            let server = StaticServer::start(root, &cli.listen)?;
            config.base_url = server.base_url();
            Some(server)
        }
        None => None,
    };

    suite.validate()?;
    let base = config.validate()?;

    if cli.list {
        for case in suite.cases(&base, &filter)? {
            println!("{}  {}", case.label(), case.url);
        }
        return Ok(0);
    }

    if !cli.skip_preflight {
        harness::preflight(&base, config.navigation_timeout_ms).await?;
    }

    let cancel = CancelHandle::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling in-flight cases");
                cancel.cancel();
            }
        });
    }

    let report = harness::run_suite(&suite, &filter, &config, CdpLauncher::new(), cancel).await?;

    print!("{}", report.render_text(cli.verbose));
    if let Some(path) = &cli.json {
        report.write_json(path)?;
        info!("wrote JSON report to {}", path.display());
    }
    info!("{}", report.summary());
    Ok(report.exit_code())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e @ Error::ConfigError(_)) => {
            error!("{}", e);
            2
        }
        Err(e) => {
            error!("{}", e);
            1
        }
    };
    std::process::exit(code);
}
