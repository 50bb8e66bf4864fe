//! Peer Sync
//!
//! `peer-sync demo` runs a host and two clients in one process over lossy,
//! delayed channels. `peer-sync host <addr>` serves WebSocket clients and
//! `peer-sync client <url> <name>` joins one.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use peer_sync::{
    client::CorrectionKind,
    core::{now_ms, Vec2},
    network::{ws, ChannelTransport, LinkConditioner, RoundMode},
    session::{ClientEvent, ClientSession, HostSession},
    sim::ArenaSimulation,
    InputAction, SessionError, SyncConfig, TICK_RATE, VERSION,
};

const FRAME: Duration = Duration::from_millis(16);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut config = match std::env::var("PEER_SYNC_CONFIG") {
        Ok(path) => SyncConfig::from_file(&path).with_context(|| format!("loading {path}"))?,
        Err(_) => SyncConfig::default(),
    };
    config.apply_env_overrides()?;
    config.validate()?;

    init_tracing(&config.net.log_level);

    info!("Peer Sync v{}", VERSION);
    info!("Tick Rate: {} Hz", TICK_RATE);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None | Some("demo") => run_demo(config).await,
        Some("host") => {
            let addr = args.get(1).unwrap_or(&config.net.bind_addr).clone();
            run_host(config, addr.parse().with_context(|| format!("bad address {addr}"))?).await
        }
        Some("client") => {
            let url = args.get(1).unwrap_or(&config.net.host_url).clone();
            let name = args.get(2).cloned().unwrap_or_else(|| "player".to_string());
            run_client(config, &url, &name).await
        }
        Some(other) => bail!("unknown mode {other:?}; expected demo, host or client"),
    }
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn entropy() -> u64 {
    now_ms().to_bits()
}

/// Scripted steering: each participant circles at its own rate.
fn scripted_action(phase: f64, t_ms: f64) -> InputAction {
    let angle = t_ms / 1_000.0 * (1.0 + phase);
    InputAction::movement(angle.cos() as f32, angle.sin() as f32)
}

// =============================================================================
// DEMO
// =============================================================================

async fn run_demo(config: SyncConfig) -> anyhow::Result<()> {
    info!("=== Starting Demo Session ===");

    let mut host = HostSession::new(config.clone(), ArenaSimulation::default(), "host", entropy());
    info!("Session ID: {}", hex::encode(host.session_id().as_bytes()));

    let mut clients = Vec::new();
    for (i, name) in ["alice", "bob"].into_iter().enumerate() {
        let (host_end, client_end) = ChannelTransport::pair();
        let seed = i as u64 + 1;
        host.add_participant(Box::new(LinkConditioner::new(host_end, 40.0, 0.05, seed)), now_ms())?;
        let mut client = ClientSession::new(
            config.clone(),
            Box::new(LinkConditioner::new(client_end, 40.0, 0.05, seed + 100)),
            name,
        );
        client.join()?;
        clients.push(client);
    }

    let mut ticker = interval(FRAME);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let started = now_ms();
    let mut last = started;
    let mut round_started = false;

    loop {
        ticker.tick().await;
        let now = now_ms();
        let frame_secs = (now - last) / 1_000.0;
        last = now;
        let elapsed = now - started;

        if !round_started && elapsed > 500.0 {
            let seed = host.start_round(RoundMode::Soccer)?;
            info!("Round seed: {}", seed);
            round_started = true;
        }
        if elapsed > 8_000.0 {
            break;
        }

        host.host_input(scripted_action(0.0, elapsed), Vec2::ZERO, now);
        host.poll(now, frame_secs)?;

        for (i, client) in clients.iter_mut().enumerate() {
            let cursor = client.local_pose().map_or(Vec2::ZERO, |p| p.pos);
            client.capture_input(scripted_action(i as f64 + 1.0, elapsed), cursor, now)?;
            client.poll(now, frame_secs)?;

            for event in client.drain_events() {
                if let ClientEvent::Game(event) = event {
                    info!("client {} saw {:?}", i + 1, event);
                }
            }
            if let Some(c) = client.last_correction() {
                if c.kind == CorrectionKind::Snapped {
                    info!("client {} hard snap, error {:.1}", i + 1, c.error);
                }
            }
        }
    }

    let winner = host.end_round();
    info!("=== Round Results ===");
    info!("Winner: {:?}", winner);
    let stats = host.stats();
    info!(
        "Host: {} ticks, {} broadcasts, {} inputs applied, {} stale",
        stats.ticks, stats.broadcasts, stats.inputs_applied, stats.inputs_stale
    );
    for (i, client) in clients.iter().enumerate() {
        let r = client.reconcile_stats();
        info!(
            "Client {}: {} snaps, {} blends, {} untouched, {} skipped, max error {:.1}, \
             {} pending inputs",
            i + 1,
            r.snaps,
            r.blends,
            r.untouched,
            r.skipped,
            r.max_error,
            client.pending_inputs()
        );
    }

    host.quit();
    for client in &mut clients {
        match client.poll(now_ms(), 0.0) {
            Err(SessionError::HostQuit) => {}
            other => warn!("expected host quit, got {:?}", other),
        }
    }
    Ok(())
}

// =============================================================================
// HOST
// =============================================================================

async fn run_host(config: SyncConfig, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = ws::WsListener::bind(addr).await?;
    info!("WebSocket endpoint: ws://{}", listener.local_addr()?);
    let mut incoming = listener.spawn_acceptor();

    let mut host = HostSession::new(config, ArenaSimulation::default(), "host", entropy());
    let mut ticker = interval(FRAME);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last = now_ms();
    let mut round_until: Option<f64> = None;
    let mut lobby_until = last + 5_000.0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
        let now = now_ms();
        let frame_secs = (now - last) / 1_000.0;
        last = now;

        while let Ok((transport, peer)) = incoming.try_recv() {
            match host.add_participant(Box::new(transport), now) {
                Ok(id) => info!("New connection from {} ({})", peer, id),
                Err(e) => warn!("Refused {}: {}", peer, e),
            }
        }

        match round_until {
            Some(end) if now >= end => {
                host.end_round();
                round_until = None;
                lobby_until = now + 5_000.0;
            }
            None if now >= lobby_until && host.participant_count() > 0 => {
                host.start_round(RoundMode::Arena)?;
                round_until = Some(now + 60_000.0);
            }
            _ => {}
        }

        host.poll(now, frame_secs)?;
    }

    host.quit();
    Ok(())
}

// =============================================================================
// CLIENT
// =============================================================================

async fn run_client(config: SyncConfig, url: &str, name: &str) -> anyhow::Result<()> {
    let transport = ws::connect(url).await?;
    let mut client = ClientSession::new(config, Box::new(transport), name);
    client.join()?;

    let mut ticker = interval(FRAME);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let started = now_ms();
    let mut last = started;

    loop {
        ticker.tick().await;
        let now = now_ms();
        let frame_secs = (now - last) / 1_000.0;
        last = now;

        let cursor = client.local_pose().map_or(Vec2::ZERO, |p| p.pos);
        client.capture_input(scripted_action(0.5, now - started), cursor, now)?;

        match client.poll(now, frame_secs) {
            Ok(()) => {}
            Err(SessionError::HostQuit) => {
                info!("Host ended the session");
                break;
            }
            Err(e) => return Err(e.into()),
        }

        for event in client.drain_events() {
            match event {
                ClientEvent::RoundStarted { round, mode } => {
                    info!("Round {} ({:?}) started", round, mode)
                }
                ClientEvent::RoundEnded { round, winner } => {
                    let r = client.reconcile_stats();
                    info!(
                        "Round {} over, winner {:?}; {} snaps, {} blends, max error {:.1}",
                        round, winner, r.snaps, r.blends, r.max_error
                    );
                }
                ClientEvent::Chat { slot, text } => info!("[{}] {}", slot, text),
                _ => {}
            }
        }
    }
    Ok(())
}
