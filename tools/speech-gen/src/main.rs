use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use serde_json::json;

use mediagen_core::job::Poller;
use mediagen_core::replicate::{output_url, ReplicateClient};
use mediagen_core::{auth, cli, download, Error};

const POLL_INTERVAL_SECS: u64 = 3;

#[derive(Parser)]
#[command(author, version, about = "Generate speech using MiniMax Speech 2.6 (Replicate)")]
struct Args {
    /// Text to synthesize into speech. Use <#seconds#> for pauses.
    #[arg(long, short = 't')]
    text: String,

    /// Output filename (e.g., narration.mp3).
    #[arg(long, short = 'f')]
    filename: PathBuf,

    /// Voice ID.
    #[arg(long, short = 'v', default_value = "English_expressive_narrator")]
    voice: String,

    /// Emotion type.
    #[arg(long, short = 'e', value_enum, default_value = "auto")]
    emotion: Emotion,

    /// Output audio format.
    #[arg(long = "format", value_enum, default_value = "mp3")]
    audio_format: AudioFormat,

    /// Speech speed 0.5-2.0.
    #[arg(long, short = 's', default_value_t = 1.0)]
    speed: f64,

    /// Pitch adjustment -12 to 12 semitones.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pitch: i32,

    /// Volume 0.1-2.0.
    #[arg(long, default_value_t = 1.0)]
    volume: f64,

    /// Sample rate in Hz.
    #[arg(long, default_value_t = 32000, value_parser = parse_sample_rate)]
    sample_rate: u32,

    /// Generate subtitle timestamps.
    #[arg(long)]
    subtitles: bool,

    /// Model variant: hd (best quality) or turbo (low latency).
    #[arg(long, short = 'm', value_enum, default_value = "hd")]
    model: ModelVariant,

    /// Replicate API token (overrides REPLICATE_API_TOKEN env var).
    #[arg(long, short = 'k')]
    api_token: Option<String>,

    /// Max wait time in seconds.
    #[arg(long, default_value_t = 120)]
    timeout: u64,
}

#[derive(Clone, Copy, ValueEnum)]
#[value(rename_all = "lowercase")]
enum Emotion {
    Auto,
    Happy,
    Sad,
    Angry,
    Fearful,
    Disgusted,
    Surprised,
    Calm,
    Fluent,
    Neutral,
}

impl Emotion {
    fn as_str(self) -> &'static str {
        match self {
            Emotion::Auto => "auto",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Fearful => "fearful",
            Emotion::Disgusted => "disgusted",
            Emotion::Surprised => "surprised",
            Emotion::Calm => "calm",
            Emotion::Fluent => "fluent",
            Emotion::Neutral => "neutral",
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
#[value(rename_all = "lowercase")]
enum AudioFormat {
    Mp3,
    Wav,
    Flac,
    Pcm,
}

impl AudioFormat {
    fn as_str(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::Flac => "flac",
            AudioFormat::Pcm => "pcm",
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
#[value(rename_all = "lowercase")]
enum ModelVariant {
    Hd,
    Turbo,
}

impl ModelVariant {
    fn model_id(self) -> &'static str {
        match self {
            ModelVariant::Hd => "minimax/speech-2.6-hd",
            ModelVariant::Turbo => "minimax/speech-2.6-turbo",
        }
    }
}

const ALLOWED_SAMPLE_RATES: [u32; 7] = [8000, 16000, 22050, 24000, 32000, 44100, 48000];

fn parse_sample_rate(value: &str) -> std::result::Result<u32, String> {
    let rate: u32 = value.parse().map_err(|_| format!("invalid sample rate: {value}"))?;
    if ALLOWED_SAMPLE_RATES.contains(&rate) {
        Ok(rate)
    } else {
        Err(format!("sample rate must be one of {ALLOWED_SAMPLE_RATES:?}"))
    }
}

async fn run(args: Args) -> Result<()> {
    let token = auth::resolve(args.api_token.as_deref(), "REPLICATE_API_TOKEN", "--api-token")?;
    let client = ReplicateClient::new(token);

    let model_id = args.model.model_id();
    let input = json!({
        "text": args.text,
        "voice_id": args.voice,
        "emotion": args.emotion.as_str(),
        "speed": args.speed,
        "pitch": args.pitch,
        "volume": args.volume,
        "audio_format": args.audio_format.as_str(),
        "sample_rate": args.sample_rate,
        "subtitle_enable": args.subtitles,
    });

    let char_count = args.text.chars().count();
    let est_cost = char_count as f64 * 0.0001;
    let preview: String = args.text.chars().take(80).collect();
    let ellipsis = if char_count > 80 { "..." } else { "" };

    println!("Generating speech...");
    println!("  Model: {model_id}");
    println!("  Voice: {}", args.voice);
    println!("  Emotion: {}", args.emotion.as_str());
    println!("  Format: {}", args.audio_format.as_str());
    println!("  Speed: {}x", args.speed);
    println!("  Text: {preview}{ellipsis}");
    println!("  Characters: {char_count}");
    println!("  Est. cost: ${est_cost:.4}");

    let prediction = client.create(model_id, input).await.map_err(annotate_auth_hint)?;

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
        .context("speech generation failed")?;

    let output = done
        .output
        .ok_or_else(|| anyhow::anyhow!("succeeded prediction carried no output"))?;
    let audio_url = output_url(&output, "audio")
        .ok_or_else(|| anyhow::anyhow!("no audio URL in response"))?;

    println!("  Downloading audio...");
    let written = download::download_to_file(client.http(), &audio_url, &args.filename)
        .await
        .context("failed to download the audio")?;

    if args.subtitles {
        if let Some(subtitle_url) = output_url(&output, "subtitles") {
            let subtitle_path = args.filename.with_extension("titles.json");
            download::download_to_file(client.http(), &subtitle_url, &subtitle_path)
                .await
                .context("failed to download the subtitles")?;
            println!(
                "  Subtitles saved: {}",
                subtitle_path.canonicalize().unwrap_or(subtitle_path).display()
            );
        }
    }

    if written == 0 {
        bail!("the vendor returned an empty audio file");
    }

    let duration = output
        .get("duration")
        .and_then(|d| d.as_f64())
        .map(|d| format!("{d}"))
        .unwrap_or_else(|| "unknown".to_string());

    println!();
    println!(
        "Audio saved: {}",
        args.filename.canonicalize().unwrap_or_else(|_| args.filename.clone()).display()
    );
    println!("  Size: {:.1} KB", written as f64 / 1024.0);
    println!("  Duration: ~{duration}s");
    println!("  Format: {}", args.audio_format.as_str());
    println!("  Voice: {}", args.voice);
    cli::print_media_marker(&args.filename);
    Ok(())
}

/// Bad tokens show up as opaque API errors; point at the likely fix.
fn annotate_auth_hint(err: Error) -> anyhow::Error {
    let text = err.to_string();
    let lowered = text.to_lowercase();
    if lowered.contains("authentication") || lowered.contains("token") {
        anyhow::anyhow!(err).context("Hint: Check your REPLICATE_API_TOKEN is valid.")
    } else {
        anyhow::anyhow!(err)
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    cli::init_tracing();
    cli::run_to_exit(run(args)).await
}
