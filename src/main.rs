use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use vocal_assistant::api::ApiServerBuilder;
use vocal_assistant::config::config_file_path;
use vocal_assistant::voice::{
    AudioCapture, AudioPlayback, AudioSource, AudioStore, SpeechInput, SpeechOutput, SpeechSynthesizer,
    SpeechToText, TextToSpeech, rms,
};
use vocal_assistant::{ChatCompletionClient, Config, Reply, SessionController, SessionEvent};

/// Vocal - voice and text chatbot
#[derive(Parser)]
#[command(name = "vocal", version, about)]
struct Cli {
    /// Port to listen on
    #[arg(long, env = "VOCAL_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable server microphone capture (for headless servers without audio hardware)
    #[arg(long, env = "VOCAL_DISABLE_VOICE")]
    disable_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server and browser UI (default)
    Serve,
    /// Chat in the terminal
    Chat,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Synthesize text and play it through the speakers
    TestTts {
        /// Text to speak
        #[arg(default_value = "Bonjour ! Ceci est un test de la synthèse vocale.")]
        text: String,
    },
    /// Print the config file location
    ConfigPath,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,vocal_assistant=info",
        1 => "info,vocal_assistant=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(cli.port, cli.disable_voice).await,
        Command::Chat => chat(cli.disable_voice).await,
        Command::TestMic { duration } => test_mic(duration).await,
        Command::TestTts { text } => test_tts(&text).await,
        Command::ConfigPath => {
            match config_file_path() {
                Some(path) => println!("{}", path.display()),
                None => anyhow::bail!("could not determine the config directory"),
            }
            Ok(())
        }
    }
}

/// Wire the controller from configuration
///
/// Missing recognition or synthesis credentials disable that half of voice
/// instead of failing startup; only the completion key is mandatory.
fn build_controller(config: &Config) -> anyhow::Result<SessionController> {
    let completion = ChatCompletionClient::from_config(&config.completion)?;
    tracing::info!(model = completion.model(), context = ?config.completion.context_mode, "completion client ready");

    let mut builder =
        SessionController::builder(Arc::new(completion)).context_mode(config.completion.context_mode);

    match SpeechToText::from_config(&config.voice.stt) {
        Ok(stt) => {
            builder = builder.speech_input(SpeechInput::new(
                Arc::new(stt),
                config.voice.listen,
                config.voice.recognition_language.clone(),
            ));
        }
        Err(e) => tracing::warn!(error = %e, "speech recognition unavailable"),
    }

    match TextToSpeech::from_config(&config.voice.tts) {
        Ok(tts) => {
            tracing::debug!(provider = tts.name(), dir = %config.audio_dir.display(), "speech output ready");
            let store = Arc::new(AudioStore::new(&config.audio_dir));
            builder = builder.speech_output(SpeechOutput::new(Arc::new(tts), store, config.voice.language.clone()));
        }
        Err(e) => tracing::warn!(error = %e, "speech synthesis unavailable"),
    }

    Ok(builder.build())
}

async fn serve(port: Option<u16>, disable_voice: bool) -> anyhow::Result<()> {
    let config = Config::load_with_options(disable_voice)?;
    let port = port.unwrap_or(config.server.port);

    tracing::info!(port, voice = config.voice.enabled, "starting vocal assistant");

    let controller = Arc::new(build_controller(&config)?);

    ApiServerBuilder::new(controller)
        .port(port)
        .static_dir(config.server.static_dir.clone())
        .server_microphone(config.voice.enabled)
        .build()
        .run()
        .await?;

    Ok(())
}

/// Terminal REPL driving the same controller as the web UI
async fn chat(disable_voice: bool) -> anyhow::Result<()> {
    let config = Config::load_with_options(disable_voice)?;
    let controller = build_controller(&config)?;
    let microphone = config.voice.enabled && controller.voice_input_enabled();

    let mut events = controller.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SessionEvent::Listening => eprintln!("🎤 Écoute en cours... Parlez maintenant."),
                SessionEvent::Processing => eprintln!("🔄 Traitement de votre voix..."),
                SessionEvent::Thinking => eprintln!("💭 ..."),
                _ => {}
            }
        }
    });

    println!("💬 Assistant vocal. Commandes : /mic, /reset, /export [fichier], /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, arg) = line.split_once(' ').map_or((line, ""), |(c, a)| (c, a.trim()));

        let outcome = match command {
            "/quit" | "/exit" => break,
            "/reset" => controller.reset().await.map(|()| println!("🗑️ Conversation effacée.")),
            "/export" => {
                export(&controller, arg).await?;
                continue;
            }
            "/mic" if !microphone => {
                println!("🎤 Microphone désactivé.");
                continue;
            }
            "/mic" => controller.listen().await.map(|reply| print_reply(&reply)),
            _ => controller.submit_text(line).await.map(|reply| print_reply(&reply)),
        };

        if let Err(failure) = outcome {
            println!("{}", failure.user_message());
        }
    }

    Ok(())
}

fn print_reply(reply: &Reply) {
    println!("👤 {}", reply.user.content());
    println!("🤖 {}", reply.assistant.content());

    if let Some(audio) = &reply.audio {
        let path = audio.path.clone();
        tokio::task::spawn_blocking(move || play_file(&path));
    }
}

fn play_file(path: &Path) {
    let result = AudioPlayback::new().and_then(|playback| playback.play_file(path));
    if let Err(e) = result {
        tracing::warn!(error = %e, "reply playback failed");
    }
}

async fn export(controller: &SessionController, path: &str) -> anyhow::Result<()> {
    let Some(json) = controller.export().await else {
        println!("Aucune conversation à exporter.");
        return Ok(());
    };

    let path = if path.is_empty() { PathBuf::from("chat.json") } else { PathBuf::from(path) };
    tokio::fs::write(&path, json).await?;
    println!("💾 Conversation exportée vers {}", path.display());
    Ok(())
}

async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    println!("Sample rate: {} Hz", capture.sample_rate());
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer();
        let energy = rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]", i + 1);
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: arecord -l (to list devices)");

    Ok(())
}

async fn test_tts(text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load()?;
    let tts = TextToSpeech::from_config(&config.voice.tts)?;

    let audio = tts.synthesize(text, &config.voice.language).await?;

    println!("Received {} bytes of MP3 audio, playing...", audio.len());

    tokio::task::spawn_blocking(move || AudioPlayback::new()?.play_mp3(&audio)).await??;

    println!("\n---");
    println!("If you heard speech, TTS and playback are working!");

    Ok(())
}
