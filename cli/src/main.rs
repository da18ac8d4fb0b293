// tandem: delivery simulator
//
// Runs the delivery layer against the in-memory loopback fabric so retries
// and leave ordering can be watched from a terminal.

mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use tandem_core::loopback::{FailurePlan, LoopbackConnection, LoopbackDirectChannel, LoopbackSession};
use tandem_core::{
    ConnectionEvent, ConnectionGate, ConnectionState, DeliveryConfig, DeliveryOrchestrator,
    PeerId, PeerPresence, SessionId, SessionSlot, TransferDescriptor,
};
use tokio::time::Instant;

#[derive(Parser)]
#[command(name = "tandem")]
#[command(about = "Tandem: reliable session delivery simulator", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON delivery configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deliver one transfer to a simulated peer
    Send {
        /// Payload size in bytes
        #[arg(short, long, default_value = "256")]
        size: usize,
        /// Number of direct-channel sends that fail before one succeeds
        #[arg(short, long, default_value = "0")]
        direct_failures: u32,
        /// Recipient has no peer-to-peer stream
        #[arg(long)]
        no_direct_capable: bool,
        /// Permit small payloads over the signaling channel
        #[arg(long)]
        allow_fallback: bool,
        /// Recipient is reported offline
        #[arg(long)]
        offline: bool,
    },
    /// Leave a simulated session and show the notification timeline
    Leave {
        /// Participants other than the local peer and the host
        #[arg(short, long, default_value = "3")]
        peers: usize,
        /// Host already left the session
        #[arg(long)]
        host_absent: bool,
        /// Local peer is the host
        #[arg(long)]
        local_host: bool,
    },
    /// Print the effective configuration
    Config,
}

/// One simulated session wired to a delivery orchestrator
struct Simulation {
    connection: Arc<LoopbackConnection>,
    direct: Arc<LoopbackDirectChannel>,
    session: Arc<LoopbackSession>,
    orchestrator: DeliveryOrchestrator,
}

impl Simulation {
    fn new(config: DeliveryConfig, local: PeerId, host: PeerId) -> Self {
        let gate = Arc::new(ConnectionGate::new());
        let connection = LoopbackConnection::new();
        gate.handle_event(ConnectionEvent::new(
            connection.clone(),
            ConnectionState::Connected,
        ));

        let session = LoopbackSession::new(SessionId::generate(), local, host);
        let slot = Arc::new(SessionSlot::new());
        slot.start(session.clone());

        let direct = LoopbackDirectChannel::new();
        let orchestrator = DeliveryOrchestrator::new(config, gate, direct.clone(), slot);

        Self {
            connection,
            direct,
            session,
            orchestrator,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Send {
            size,
            direct_failures,
            no_direct_capable,
            allow_fallback,
            offline,
        } => {
            cmd_send(
                config,
                size,
                direct_failures,
                !no_direct_capable,
                allow_fallback,
                offline,
            )
            .await
        }
        Commands::Leave {
            peers,
            host_absent,
            local_host,
        } => cmd_leave(config, peers, host_absent, local_host).await,
        Commands::Config => cmd_config(&config),
    }
}

async fn cmd_send(
    mut config: DeliveryConfig,
    size: usize,
    direct_failures: u32,
    direct_capable: bool,
    allow_fallback: bool,
    offline: bool,
) -> Result<()> {
    if allow_fallback {
        config.allow_signaling_fallback = true;
    }

    let local = PeerId::new("alice@tandem.local/cli");
    let recipient = PeerId::new("bob@tandem.local/cli");
    let sim = Simulation::new(config, local.clone(), local);
    sim.session.add_participant(recipient.clone());

    if direct_capable {
        sim.direct.connect_peer(&recipient);
    }
    if offline {
        sim.session
            .set_presence(&recipient, PeerPresence::Offline);
    }
    sim.direct
        .set_failure_plan(FailurePlan::First(direct_failures));

    let descriptor = TransferDescriptor::for_session(
        sim.session.as_ref(),
        recipient.clone(),
        "simulated",
        "urn:tandem:cli",
    );
    let payload: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();

    println!(
        "{} {} bytes to {}",
        "Sending".bold(),
        size,
        recipient.to_string().bright_cyan()
    );
    println!();

    let result = sim
        .orchestrator
        .send_to_session_peer(&recipient, &descriptor, &payload)
        .await;

    for (i, attempt) in sim.direct.attempts().iter().enumerate() {
        let status = if attempt.delivered {
            "✓".green()
        } else {
            "✗".red()
        };
        println!(
            "  {} direct #{} [{}] {} bytes on the wire{}",
            status,
            i + 1,
            attempt.mode,
            attempt.wire_len,
            if attempt.descriptor.is_compressed() {
                " (compressed)".dimmed().to_string()
            } else {
                String::new()
            }
        );
    }
    for sent in sim.connection.sent() {
        println!(
            "  {} signaling {} ({} bytes)",
            "✓".green(),
            sent.envelope.packet.name(),
            sent.encoded_len
        );
    }
    if sim.direct.fallback_requests() > 0 {
        println!("  {} recipient switched to fallback mode", "•".bright_yellow());
    }
    println!();

    match result {
        Ok(()) => println!("{} Delivered", "✓".green()),
        Err(e) => println!("{} {}", "✗".red(), e.to_string().bright_red()),
    }

    Ok(())
}

async fn cmd_leave(
    config: DeliveryConfig,
    peers: usize,
    host_absent: bool,
    local_host: bool,
) -> Result<()> {
    let host = PeerId::new("host@tandem.local/cli");
    let local = if local_host {
        host.clone()
    } else {
        PeerId::new("alice@tandem.local/cli")
    };

    let sim = Simulation::new(config, local, host.clone());
    for i in 0..peers {
        sim.session
            .add_participant(PeerId::new(format!("peer{}@tandem.local/cli", i + 1)));
    }
    if host_absent && !local_host {
        sim.session.remove_participant(&host);
    }

    println!("{}", "Leaving session...".bold());
    println!();

    let started = Instant::now();
    let report = sim.orchestrator.send_leave_notifications().await?;

    for sent in sim.connection.sent() {
        let role = if sent.envelope.to == host {
            " (host)".bright_yellow().to_string()
        } else {
            String::new()
        };
        println!(
            "  +{:>6} ms  {}{}",
            sent.at.duration_since(started).as_millis(),
            sent.envelope.to.to_string().bright_cyan(),
            role
        );
    }
    for (peer, e) in &report.failed {
        println!("  {} {}: {}", "✗".red(), peer, e);
    }
    println!();

    println!(
        "{} {} notified, {} failed, host notified: {}",
        if report.is_complete() {
            "✓".green()
        } else {
            "!".bright_yellow()
        },
        report.notified.len(),
        report.failed.len(),
        report.host_notified
    );

    Ok(())
}

fn cmd_config(config: &DeliveryConfig) -> Result<()> {
    println!("{}", "Configuration".bold());
    println!();

    for (key, value) in config::rows(config)? {
        println!("  {:<26} {}", key.bright_cyan(), value);
    }

    Ok(())
}
