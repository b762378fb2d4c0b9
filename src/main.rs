//! voicescroll - scroll the foreground application by voice.
//!
//! Runs an always-listening service that maps spoken "up"/"down" to
//! synthetic vertical swipes injected through a host helper. The persisted
//! scrolling intensity edited by the settings surface is available through
//! `voicescroll rate`.

use std::env;
use std::io;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use voicescroll::command::route;
use voicescroll::config::Preferences;
use voicescroll::diagnostics::{DiagnosticEvent, Diagnostics};
use voicescroll::gesture::GestureDispatcher;
use voicescroll::inject::{ConfiguredMetrics, SwipeInjector};
use voicescroll::session::{RecognitionSession, SessionConfig};
use voicescroll::speech::{self, EngineConfig};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let result = match args.first().map(String::as_str) {
        None | Some("run") => run(),
        Some("rate") => rate(args.get(1).map(String::as_str)),
        Some("-h") | Some("--help") => {
            print_usage();
            Ok(())
        }
        Some(other) => {
            eprintln!("unknown command: {other}");
            print_usage();
            std::process::exit(2);
        }
    };

    if let Err(err) = result {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn print_usage() {
    eprintln!("usage: voicescroll [run]         start the listening service");
    eprintln!("       voicescroll rate          print the scrolling intensity");
    eprintln!("       voicescroll rate <value>  set the scrolling intensity (1.0-5.0)");
}

fn run() -> Result<()> {
    let prefs_path = Preferences::path()?;
    let prefs = Preferences::load(&prefs_path)?;
    log::info!("scroll rate preference: {}", prefs.rate);

    let diagnostics = Diagnostics::log_only();

    let dispatcher = Arc::new(GestureDispatcher::new(
        Box::new(ConfiguredMetrics::new(&prefs_path)),
        Box::new(SwipeInjector::new(&prefs.swipe_helper)),
        diagnostics.clone(),
    ));

    let engine_config = EngineConfig {
        model_path: prefs.model_path.clone(),
        ..EngineConfig::default()
    };

    let routing_diagnostics = diagnostics.clone();
    let session = RecognitionSession::spawn(
        speech::native_factory(engine_config),
        Box::new(move |utterance| {
            if let Some(direction) = route(utterance) {
                routing_diagnostics.emit(DiagnosticEvent::CommandMatched { direction });
                dispatcher.scroll(direction);
            }
        }),
        diagnostics,
        SessionConfig::default(),
    );

    session.start_listening();
    println!("voicescroll: listening for \"up\" / \"down\" (press Enter to stop)");

    let mut line = String::new();
    let _ = io::stdin().read_line(&mut line);

    session.stop_listening();
    Ok(())
}

fn rate(value: Option<&str>) -> Result<()> {
    let path = Preferences::path()?;
    let mut prefs = Preferences::load(&path)?;
    match value {
        None => println!("{}", prefs.rate),
        Some(raw) => {
            let parsed: f32 = raw.parse().map_err(|_| anyhow!("not a number: {raw}"))?;
            prefs.set_rate(parsed);
            prefs.store(&path)?;
            println!("scroll rate set to {}", prefs.rate);
        }
    }
    Ok(())
}
