use anyhow::Result;
use babycam::config::LogMode;
use babycam::{MonitorConfig, MonitorOrchestrator};
use clap::Parser;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "babycam")]
#[command(about = "Log baby care activities from hand gestures held in front of a camera")]
#[command(version)]
#[command(long_about = "Watches a camera, recognises held hand gestures and turns each one \
into a timestamped care event (feeding, diaper change, sleep, wake). Every event is \
announced with a local sound and pushed to the configured Bark recipients.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "babycam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Show classifier output for every frame
    #[arg(short, long, help = "Verbose mode - show per-frame classifier detail")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the system")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Run without notification channels
    #[arg(long, help = "Detect and log events but send no sound or push notification")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Replay a recorded classification script instead of running the recognizer
    #[arg(long, value_name = "FILE", help = "Replay classifier results from a JSON script")]
    replay: Option<String>,

    /// Loop the replay script instead of stopping at its end
    #[arg(long, requires = "replay", help = "Start the replay script over when it ends")]
    replay_loop: bool,

    /// Override the camera index from the configuration file
    #[arg(long, value_name = "INDEX", help = "Camera device index")]
    camera_index: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let mut config = MonitorConfig::load_from_file(&args.config).map_err(|e| {
        eprintln!("Failed to load configuration from {}: {}", args.config, e);
        e
    })?;

    if let Some(script) = &args.replay {
        config.inference.script = Some(script.clone());
        config.inference.script_loop = args.replay_loop;
    }
    if let Some(index) = args.camera_index {
        config.camera.index = index;
    }

    init_logging(&args, config.logging.mode)?;

    info!("Starting babycam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    if args.validate_config {
        println!("✓ Configuration is valid");
        return Ok(());
    }

    if args.dry_run {
        info!("Dry run - notifications are disabled");
    }

    let mut orchestrator = MonitorOrchestrator::new(config, args.dry_run)
        .await
        .map_err(|e| {
            error!("Failed to create orchestrator: {}", e);
            e
        })?;

    orchestrator.initialize().await.map_err(|e| {
        error!("Failed to initialize system: {}", e);
        e
    })?;

    orchestrator.start().await.map_err(|e| {
        error!("Failed to start system: {}", e);
        e
    })?;

    let exit_code = orchestrator.run().await.map_err(|e| {
        error!("System error during execution: {}", e);
        e
    })?;

    info!("Babycam exited with code: {}", exit_code);
    std::process::exit(exit_code);
}

fn init_logging(args: &Args, mode: LogMode) -> Result<()> {
    use tracing_subscriber::{
        fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    };

    let directives = if args.debug {
        "debug"
    } else if args.quiet {
        "error"
    } else if args.verbose {
        LogMode::Verbose.directives()
    } else {
        mode.directives()
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("pretty") => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some("compact") | None => fmt::layer()
            .compact()
            .with_target(args.debug)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer().compact().with_target(false).boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()?;

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Babycam configuration file");
    println!("# Every key can also be set through the environment, e.g.");
    println!("#   BABYCAM_NOTIFY__BARK_KEYS=key1,key2");
    println!("# BARK_KEYS is read when notify.bark_keys is empty.");
    println!("# Set inference.command to the recognizer helper, e.g.");
    println!("#   command = [\"python3\", \"recognizer.py\"]");
    println!();

    let rendered = toml::to_string_pretty(&MonitorConfig::default())?;
    println!("{}", rendered);
    Ok(())
}
