use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use serde_json::json;

use mediagen_core::job::Poller;
use mediagen_core::replicate::{file_data_uri, output_url, ReplicateClient};
use mediagen_core::{auth, cli, download, Error};

const CLONE_MODEL: &str = "minimax/voice-cloning";
const DEMO_MODEL: &str = "minimax/speech-2.6-hd";
const POLL_INTERVAL_SECS: u64 = 5;
const DEMO_POLL_INTERVAL_SECS: u64 = 3;
const DEMO_TIMEOUT_SECS: u64 = 60;

#[derive(Parser)]
#[command(author, version, about = "Clone a voice using MiniMax Voice Cloning (Replicate)")]
struct Args {
    /// Path to audio sample (WAV, MP3, M4A, FLAC). Min 5s, recommended 10-30s.
    #[arg(long, short = 'a')]
    audio: PathBuf,

    /// Name for the cloned voice (for your reference).
    #[arg(long, short = 'n')]
    name: String,

    /// Optional demo text to generate with the cloned voice.
    #[arg(long, short = 't')]
    text: Option<String>,

    /// Output file for demo audio (only used with --text).
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Replicate API token (overrides REPLICATE_API_TOKEN env var).
    #[arg(long, short = 'k')]
    api_token: Option<String>,

    /// Max wait time in seconds.
    #[arg(long, default_value_t = 300)]
    timeout: u64,
}

const SAMPLE_MIMES: [(&str, &str); 4] = [
    ("wav", "audio/wav"),
    ("mp3", "audio/mpeg"),
    ("m4a", "audio/mp4"),
    ("flac", "audio/flac"),
];

/// MIME type for the sample, or None when the extension is unsupported.
fn sample_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    SAMPLE_MIMES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
}

fn default_demo_path(name: &str) -> PathBuf {
    let slug = name.to_lowercase().replace(' ', "-");
    std::env::temp_dir().join(format!("voice-clone-demo-{slug}.mp3"))
}

async fn run(args: Args) -> Result<()> {
    if !args.audio.exists() {
        bail!("audio file not found: {}", args.audio.display());
    }
    let mime = sample_mime(&args.audio).ok_or_else(|| {
        anyhow!(
            "unsupported format {}; use wav, mp3, m4a, or flac",
            args.audio
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default()
        )
    })?;

    let token = auth::resolve(args.api_token.as_deref(), "REPLICATE_API_TOKEN", "--api-token")?;
    let client = ReplicateClient::new(token);

    let sample_size = std::fs::metadata(&args.audio)?.len();
    println!("Cloning voice...");
    println!("  Name: {}", args.name);
    println!("  Audio: {} ({:.1} KB)", args.audio.display(), sample_size as f64 / 1024.0);

    let data_uri = file_data_uri(&args.audio, mime).context("failed to read the audio sample")?;
    let prediction = client.create(CLONE_MODEL, json!({ "audio": data_uri })).await?;

    let started = std::time::Instant::now();
    let poller = Poller::from_secs(POLL_INTERVAL_SECS, args.timeout);
    let id = prediction.id.clone();
    let done = poller
        .wait(
            prediction,
            || client.get(&id),
            |job, elapsed| {
                println!("  Status: {} ({}s elapsed)", job.status, elapsed.as_secs());
            },
        )
        .await
        .context("voice cloning failed")?;

    let output = done
        .output
        .ok_or_else(|| anyhow!("no voice ID returned"))?;
    let voice_id = output_url(&output, "voice_id")
        .ok_or_else(|| anyhow!("no voice ID returned; raw output: {output}"))?;

    println!();
    println!("Voice cloned successfully!");
    println!("  Voice Name: {}", args.name);
    println!("  Voice ID: {voice_id}");
    println!("  Processing time: ~{}s", started.elapsed().as_secs());
    println!();
    println!("To use this voice with speech-gen:");
    println!("  speech-gen --text \"Hello\" --filename \"out.mp3\" --voice {voice_id}");

    if let Some(text) = &args.text {
        generate_demo(&client, &voice_id, text, &args).await?;
    }
    Ok(())
}

/// Best-effort demo synthesis; a demo timeout is not a cloning failure.
async fn generate_demo(
    client: &ReplicateClient,
    voice_id: &str,
    text: &str,
    args: &Args,
) -> Result<()> {
    let demo_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_demo_path(&args.name));
    let preview: String = text.chars().take(80).collect();
    let ellipsis = if text.chars().count() > 80 { "..." } else { "" };

    println!();
    println!("Generating demo with cloned voice...");
    println!("  Text: {preview}{ellipsis}");

    let input = json!({
        "text": text,
        "voice_id": voice_id,
        "emotion": "auto",
        "audio_format": "mp3",
    });
    let prediction = client.create(DEMO_MODEL, input).await?;

    let poller = Poller::from_secs(DEMO_POLL_INTERVAL_SECS, DEMO_TIMEOUT_SECS);
    let id = prediction.id.clone();
    let done = match poller.wait(prediction, || client.get(&id), |_, _| {}).await {
        Ok(done) => done,
        Err(Error::Timeout(_)) => {
            eprintln!("  Demo generation timed out, but voice ID is valid.");
            return Ok(());
        }
        Err(err) => return Err(err).context("demo generation failed"),
    };

    let output = done.output.ok_or_else(|| anyhow!("demo carried no output"))?;
    let audio_url = output_url(&output, "audio")
        .ok_or_else(|| anyhow!("no audio URL in demo response"))?;
    download::download_to_file(client.http(), &audio_url, &demo_path)
        .await
        .context("failed to download the demo")?;

    println!(
        "  Demo saved: {}",
        demo_path.canonicalize().unwrap_or_else(|_| demo_path.clone()).display()
    );
    cli::print_media_marker(&demo_path);
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    cli::init_tracing();
    cli::run_to_exit(run(args)).await
}
