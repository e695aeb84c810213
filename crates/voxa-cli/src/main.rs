//! `voxa-cli` – Voxa Command Line Interface
//!
//! `voxa` runs one operator session:
//!
//! 1. Checks for `~/.voxa/config.toml`; runs a **First-Run Wizard** when the
//!    file is absent.
//! 2. Connects to the configured relay, falling back to local-only mode.
//! 3. Serves the cockpit page and drops the user into an **interactive REPL**
//!    that speaks words into a simulated recognizer.
//! 4. Intercepts **Ctrl-C** to send `STOP` to every peer and exit safely.
//!
//! `voxa relay` instead runs the shared-register relay that links peers.

mod config;
mod repl;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::Write;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use voxa_cockpit::CockpitServer;
use voxa_kernel::TracingPowerLock;
use voxa_middleware::{RegisterRelay, connect_remote};
use voxa_runtime::{Session, SimRecognizer};
use voxa_types::{CanonicalCommand, CommandEvent};

#[derive(Parser, Debug)]
#[command(name = "voxa", version, about = "Voice-driven motion control")]
struct Cli {
    /// Relay to mirror commands through, overriding the config file.
    /// Pass an empty string to force local-only mode.
    #[arg(long)]
    relay: Option<String>,

    /// Cockpit HTTP/WebSocket port, overriding the config file.
    #[arg(long)]
    cockpit_port: Option<u16>,

    /// Do not serve the cockpit page.
    #[arg(long)]
    no_cockpit: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the shared-register relay that links peers.
    Relay {
        /// Listen port (defaults to `relay_port` from the config file).
        #[arg(long)]
        port: Option<u16>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG filters, VOXA_LOG_FORMAT=json switches to JSON lines and
    // OTEL_EXPORTER_OTLP_ENDPOINT enables span export.
    let telemetry = voxa_runtime::init_tracing("voxa");
    if telemetry.exporting() {
        info!("exporting spans over OTLP");
    }

    print_banner();

    let mut cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => run_first_run_wizard(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };
    if let Some(relay) = cli.relay {
        cfg.relay_url = relay.trim().to_string();
    }
    if let Some(port) = cli.cockpit_port {
        cfg.cockpit_port = port;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start the async runtime".red(), e);
            return ExitCode::FAILURE;
        }
    };

    let code = match cli.command {
        Some(Command::Relay { port }) => run_relay(&runtime, port.unwrap_or(cfg.relay_port)),
        None => run_interactive(&runtime, &cfg, !cli.no_cockpit),
    };
    runtime.shutdown_timeout(Duration::from_secs(1));
    drop(telemetry);
    code
}

// ─────────────────────────────────────────────────────────────────────────────
// Modes
// ─────────────────────────────────────────────────────────────────────────────

fn run_relay(runtime: &Runtime, port: u16) -> ExitCode {
    let stop = Arc::new(Notify::new());
    let stop_ctrlc = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping relay …".yellow().bold());
        stop_ctrlc.notify_one();
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler");
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("  Relay listening on {}", format!("ws://{addr}").bold());
    println!("  Peers connect with {}\n", format!("--relay ws://<host>:{port}").bold());

    let result = runtime.block_on(async {
        tokio::select! {
            res = RegisterRelay::default().run(addr) => res,
            _ = stop.notified() => Ok(()),
        }
    });
    match result {
        Ok(()) => {
            println!("{}", "  ✓ Relay stopped.".green());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "relay failed");
            println!("{}: {}", "Relay failed".red(), e);
            ExitCode::FAILURE
        }
    }
}

fn run_interactive(runtime: &Runtime, cfg: &config::Config, cockpit: bool) -> ExitCode {
    if cfg.relay_url.is_empty() {
        println!("  Remote link   : {}", "local only".yellow());
    } else {
        print!("  Remote link   : {} … ", cfg.relay_url.dimmed());
        std::io::stdout().flush().ok();
    }

    let sim = Arc::new(SimRecognizer::new());
    let session = runtime.block_on(async {
        let remote = connect_remote(&cfg.relay_url).await;
        Session::start(
            cfg.session_config(),
            remote,
            sim.clone(),
            Arc::new(TracingPowerLock::default()),
        )
    });
    if !cfg.relay_url.is_empty() {
        if session.remote_connected() {
            println!("{}", "connected".green());
        } else {
            println!("{} (running local only)", "unreachable".yellow());
        }
    }

    if cockpit {
        let server = CockpitServer::new(session.bus().clone()).with_port(cfg.cockpit_port);
        println!(
            "  Cockpit       : {}",
            format!("http://localhost:{}", server.port()).bold()
        );
        runtime.spawn(async move {
            if let Err(e) = server.run().await {
                error!(error = %e, "cockpit server stopped");
            }
        });
    }

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    // Sends STOP so the autopilot halts on every peer, then asks the REPL to
    // exit.
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_ctrlc = shutdown.clone();
    let dispatcher = session.dispatcher().clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – initiating graceful shutdown …".yellow().bold());
        dispatcher.dispatch(CommandEvent::local(CanonicalCommand::Stop, 1.0));
        println!("{}", "  ✓ STOP sent.".green());
        shutdown_ctrlc.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    repl::Shell::new(&session, &sim, runtime.handle().clone()).run(shutdown);

    runtime.block_on(session.shutdown());
    info!("voxa exiting");
    println!("{}", "  ✓ Exiting Voxa.".green());
    ExitCode::SUCCESS
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> config::Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║        Voxa First-Run Wizard         ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up Voxa.\n");

    let mut cfg = config::Config::default();

    let relay = prompt_line("  Relay URL (blank for local only) []: ", "");
    cfg.relay_url = relay.trim().to_string();

    let port_str = prompt_line(
        &format!("  Cockpit HTTP port [{}]: ", cfg.cockpit_port),
        &cfg.cockpit_port.to_string(),
    );
    if let Ok(p) = port_str.trim().parse::<u16>() {
        cfg.cockpit_port = p;
    }

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    config::apply_env_overrides(&mut cfg);
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#" _   ______  __ __ ___ "#.bold().cyan());
    println!("{}", r#"| | / / __ \/ //_// _ |"#.bold().cyan());
    println!("{}", r#"| |/ / /_/ /   <  / __ |"#.bold().cyan());
    println!("{}", r#"|___/\____/_/|_|/_/ |_|"#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Voxa".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Voice-driven motion control");
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::BufRead;
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}
