mod cli;

use stemdub::{
    config,
    pipeline::{CliToolchain, JobRequest, JobRunner, MediaToolchain},
    server,
};
use stemdub_av::{ProbeOutcome, ToolRegistry, Workspace};
use stemdub_core::{config::Stem, Cookie};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::sync::Arc;

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // CLI flags win over the config file
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting stemdub server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    server::start_server(config).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "stemdub=trace,stemdub_av=trace,stemdub_core=debug,tower_http=debug".to_string()
        } else {
            "stemdub=info,stemdub_av=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Convert {
            url,
            cookies,
            base_url,
            stem,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(convert(
                &url,
                cookies.as_deref(),
                &base_url,
                stem,
                cli.config.as_deref(),
            ))
        }
        Commands::Probe { url, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe(&url, json, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Reset { keep_output } => reset(keep_output, cli.config.as_deref()),
        Commands::Version => {
            println!("stemdub {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Parse `--cookies`: inline JSON, or `@path` to a JSON file.
fn parse_cookies(arg: Option<&str>) -> Result<Vec<Cookie>> {
    let Some(arg) = arg else {
        return Ok(Vec::new());
    };
    let text = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read cookie file: {path}"))?,
        None => arg.to_string(),
    };
    let cookies: Vec<Cookie> =
        serde_json::from_str(&text).context("Cookies must be a JSON array of cookie objects")?;
    for cookie in &cookies {
        cookie.validate()?;
    }
    Ok(cookies)
}

async fn convert(
    url: &str,
    cookies: Option<&str>,
    base_url: &str,
    stem: Option<Stem>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;
    if let Some(stem) = stem {
        config.separation.stem = stem;
    }
    let cookies = parse_cookies(cookies)?;

    let toolchain: Arc<dyn MediaToolchain> = Arc::new(CliToolchain::discover(&config));
    let runner = JobRunner::from_config(toolchain, &config);

    let job = runner.run(JobRequest::new(url, cookies));
    let report = tokio::select! {
        result = job => result?,
        _ = tokio::signal::ctrl_c() => {
            runner.cancel_all();
            anyhow::bail!("Interrupted");
        }
    };

    let mut base = base_url.to_string();
    if !base.ends_with('/') {
        base.push('/');
    }

    println!("Job {} produced {} video(s):", report.id, report.outputs.len());
    for out in &report.outputs {
        println!("  {} -> {}", out.filename, out.url(&base));
    }

    Ok(())
}

async fn probe(url: &str, json: bool, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let toolchain = CliToolchain::discover(&config);

    match toolchain.probe(url).await {
        ProbeOutcome::Entries(entries) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("No playlist entries found.");
            } else {
                for (i, entry) in entries.iter().enumerate() {
                    print!("{:>3}. {}", i + 1, entry.title);
                    if let Some(ref id) = entry.id {
                        print!(" [{id}]");
                    }
                    println!();
                }
            }
            Ok(())
        }
        ProbeOutcome::Unavailable { reason } => anyhow::bail!("Probe unavailable: {reason}"),
    }
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install them to enable all features.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!(
                "  Workspace: {} ({:?})",
                config.workspace.root.display(),
                config.workspace.mode
            );
            println!("  Separation: {} -> {:?}", config.separation.model, config.separation.stem);
            println!("  Output container: {}", config.mux.container);
            for warning in config.validate() {
                println!("  ! {warning}");
            }
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
        }
    }

    Ok(())
}

fn reset(keep_output: bool, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let workspace = Workspace::new(&config.workspace.root);
    workspace
        .reset_for_job(!keep_output)
        .context("Failed to reset workspace")?;
    println!(
        "Workspace at {} reset{}",
        config.workspace.root.display(),
        if keep_output { " (output kept)" } else { "" }
    );
    Ok(())
}
