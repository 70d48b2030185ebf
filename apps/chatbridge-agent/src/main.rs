use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use chatbridge_agent::{
    AgentConfig, AgentLoop, AgentServices, ArboardClipboard, ChatSessionProvider, InputDriver,
    KeystrokeInjector, MIN_POLL_INTERVAL, load_layout_labels, spawn_line_reader,
};
use chatbridge_layout::LayoutLabels;
use chatbridge_protocol::{DeliveryTracker, LineWriterSink};
use clap::Parser;
use signal_hook::consts::{SIGINT, SIGTERM};

#[derive(Parser, Debug)]
#[command(
    name = "chatbridge-agent",
    about = "Bridges a host controller to a desktop chat client over line-delimited JSON on stdio"
)]
struct Args {
    /// Provider poll interval (floored to 200 ms).
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Bounded wait on the command queue per loop iteration.
    #[arg(long)]
    tick_ms: Option<u64>,

    /// TOML file overriding the localized layout labels.
    #[arg(long, value_name = "FILE")]
    labels: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn apply(&self, config: &mut AgentConfig) {
        if let Some(poll_interval_ms) = self.poll_interval_ms {
            config.poll_interval = Duration::from_millis(poll_interval_ms).max(MIN_POLL_INTERVAL);
        }
        if let Some(tick_ms) = self.tick_ms {
            config.tick = Duration::from_millis(tick_ms.max(1));
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = AgentConfig::from_env().context("invalid agent configuration")?;
    args.apply(&mut config);
    let labels = match &args.labels {
        Some(path) => load_layout_labels(path)?,
        None => LayoutLabels::default(),
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&shutdown))
            .with_context(|| format!("failed to register handler for signal {signal}"))?;
    }

    let tracker = DeliveryTracker::new(
        Box::new(LineWriterSink::new(std::io::stdout())),
        config.delivery_policy(),
    );
    let input = InputDriver::new(Box::new(ArboardClipboard::new()), platform_keystrokes());
    let services = AgentServices::new(tracker, platform_provider(labels), input);

    let (command_tx, command_rx) = mpsc::channel();
    spawn_line_reader(BufReader::new(std::io::stdin()), command_tx)
        .context("failed to start stdin reader")?;

    let mut agent = AgentLoop::new(config, services, command_rx, shutdown);
    agent.announce_ready();
    agent.run();
    Ok(())
}

#[cfg(windows)]
fn platform_provider(labels: LayoutLabels) -> Box<dyn ChatSessionProvider> {
    match chatbridge_agent::UiaDesktop::new() {
        Ok(desktop) => Box::new(chatbridge_agent::LayoutSessionProvider::new(desktop, labels)),
        Err(error) => {
            tracing::warn!(error = %error, "UI Automation unavailable; chat operations will report errors");
            Box::new(chatbridge_agent::UnavailableSessionProvider::new(format!(
                "UI Automation unavailable: {error:#}"
            )))
        }
    }
}

#[cfg(not(windows))]
fn platform_provider(_labels: LayoutLabels) -> Box<dyn ChatSessionProvider> {
    tracing::warn!(
        "no desktop automation backend on this platform; chat operations will report errors"
    );
    Box::new(chatbridge_agent::UnavailableSessionProvider::new(
        "chat client automation is only available on Windows",
    ))
}

#[cfg(windows)]
fn platform_keystrokes() -> Box<dyn KeystrokeInjector> {
    Box::new(chatbridge_agent::SendInputPaste)
}

#[cfg(not(windows))]
fn platform_keystrokes() -> Box<dyn KeystrokeInjector> {
    Box::new(chatbridge_agent::UnavailableKeystrokeInjector::new(
        "keystroke injection is only available on Windows",
    ))
}
