//! santa_call_rs - a realtime voice call with Santa over the Gemini Live
//! bidirectional stream.
//!
//! Wiring only: load config, dial the service, open the ALSA devices, hand
//! everything to the session manager and relay its events to the terminal
//! until the call ends or Ctrl+C.

mod audio;
mod config;
mod error;
mod pcm;
mod persona;
mod protocol;
mod session;
mod transport;
mod wishlist;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::mpsc;

use crate::audio::{AlsaCapture, AlsaPlayback};
use crate::config::Config;
use crate::session::{Role, SessionDeps, SessionEvent, SessionManager};
use crate::wishlist::WishlistRecord;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load();
    let caller_name = std::env::args().nth(1).unwrap_or_else(|| "friend".to_string());

    log::info!("Dialing the North Pole for {caller_name}...");
    let (sink, stream) = transport::connect(&config)
        .await
        .context("failed to reach the realtime service")?;
    let playback =
        AlsaPlayback::open(&config.playback_device).context("failed to open playback device")?;
    let capture = AlsaCapture::new(&config.capture_device);

    let deps = SessionDeps {
        sink: Box::new(sink),
        stream: Box::new(stream),
        capture: Box::new(capture),
        playback: Box::new(playback),
        model: config.model.clone(),
        voice: config.voice.clone(),
    };

    let (event_tx, mut event_rx) = mpsc::channel::<SessionEvent>(100);
    let mut manager = SessionManager::new();
    manager
        .connect(deps, &caller_name, event_tx)
        .await
        .context("call setup failed")?;
    log::info!("Call connected. Press Ctrl+C to hang up.");

    let mut dossier = WishlistRecord::default();
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                log::info!("Hanging up...");
                break;
            }
            event = event_rx.recv() => match event {
                Some(SessionEvent::Transcription { text, role }) => {
                    let who = match role {
                        Role::User => caller_name.as_str(),
                        Role::Model => "Santa",
                    };
                    println!("{who}: {text}");
                }
                Some(SessionEvent::WishlistUpdate(update)) => {
                    for (label, value) in update.fields() {
                        if let Some(value) = value {
                            println!("  [dossier] {label}: {value}");
                        }
                    }
                    dossier.merge(update);
                }
                Some(SessionEvent::Closed) => {
                    log::info!("Santa hung up");
                    break;
                }
                // Levels drive a visualizer; the terminal has none.
                Some(SessionEvent::Audio(_)) | Some(SessionEvent::Level(_)) => {}
                None => break,
            }
        }
    }

    manager.disconnect().await;

    let entries = dossier.entries();
    if entries.is_empty() {
        println!("\nNo wishlist details collected this time.");
    } else {
        println!("\nChristmas dossier for {caller_name}:");
        for (label, value) in entries {
            println!("  {label}: {value}");
        }
    }
    Ok(())
}
