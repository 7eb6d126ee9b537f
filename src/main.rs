use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zarvis::agent::Orchestrator;
use zarvis::backend::InferenceClient;
use zarvis::config::AppConfig;
use zarvis::session::{SessionController, SessionEvent};
use zarvis::tools::{default_registry, SpeechTool};

const HELP: &str = "Commands:
  <text>                  send a message
  /voice <path>           transcribe a recording and answer it
  /image <ref> [prompt]   analyze an image file or URL
  /speak on|off           speak text and image responses
  /played <path>          mark a speech file as played
  /history                show the conversation
  /cancel                 cancel the running turn
  /clear                  clear conversation memory
  /quit                   exit";

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zarvis=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting ZARVIS");

    let config = match AppConfig::default_path() {
        Some(path) => AppConfig::load_or_default(&path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AppConfig::from_env(),
    };
    config.validate().context("invalid configuration")?;

    let runtime = tokio::runtime::Runtime::new().context("starting tokio runtime")?;

    let client = Arc::new(InferenceClient::new(&config)?);
    let registry = default_registry(client.clone(), &config.tools);
    let orchestrator = Arc::new(Orchestrator::new(client.clone(), registry, &config.agent));
    let speech = Arc::new(SpeechTool::new(client, &config.tools));

    let session = SessionController::new(
        orchestrator,
        speech,
        &config.session,
        runtime.handle().clone(),
    );

    let events = session.events();
    std::thread::spawn(move || {
        for event in events.iter() {
            print_event(&event);
        }
    });

    println!("ZARVIS ready. Type /help for commands.");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        let submitted = match command {
            "/quit" | "/exit" => break,
            "/help" => {
                println!("{}", HELP);
                Ok(())
            }
            "/voice" => session.submit_voice(Path::new(rest), true).map(|_| ()),
            "/image" => {
                let (image, prompt) = rest.split_once(' ').unwrap_or((rest, ""));
                session.submit_image(image, Some(prompt)).map(|_| ())
            }
            "/speak" => {
                session.set_auto_speak(rest == "on");
                println!("Auto speak {}", if session.auto_speak() { "on" } else { "off" });
                Ok(())
            }
            "/played" => {
                if !session.playback_complete(Path::new(rest)) {
                    println!("No speech file pending at {}", rest);
                }
                Ok(())
            }
            "/history" => {
                for message in session.history().messages() {
                    println!(
                        "[{}] {}",
                        message.role().as_str(),
                        message.text().unwrap_or("<tool calls>")
                    );
                }
                Ok(())
            }
            "/cancel" => {
                session.cancel();
                Ok(())
            }
            "/clear" => session.clear_memory(),
            _ => session.submit_text(line).map(|_| ()),
        };

        if let Err(e) = submitted {
            println!("! {}", e.user_message());
        }
        std::io::stdout().flush().ok();
    }

    let removed = runtime.block_on(session.shutdown());
    info!("Shut down, removed {} pending artifact(s)", removed);
    Ok(())
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::TurnStarted { .. } => println!("..."),
        SessionEvent::Response { text, .. } => println!("ZARVIS: {}", text),
        SessionEvent::SpeechReady {
            path,
            duration_secs,
            ..
        } => match duration_secs {
            Some(secs) => println!("Speech: {} ({:.1}s)", path.display(), secs),
            None => println!("Speech: {}", path.display()),
        },
        SessionEvent::Error { error, .. } => println!("! {}", error.user_message()),
        SessionEvent::MemoryCleared => println!("Memory cleared"),
    }
}
