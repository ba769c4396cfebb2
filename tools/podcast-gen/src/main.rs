use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgGroup, Parser, ValueEnum};
use serde_json::json;
use tracing::warn;

use mediagen_core::audio::{self, PcmAudio};
use mediagen_core::gemini::GeminiClient;
use mediagen_core::job::Poller;
use mediagen_core::replicate::{output_url, ReplicateClient};
use mediagen_core::transcript::{parse_segments, Segment, Speaker};
use mediagen_core::{auth, cli, download};

/// Replicate allows roughly 6 requests per minute; pace submissions.
const PACING: Duration = Duration::from_secs(11);
const SEGMENT_POLL_INTERVAL_SECS: u64 = 2;
const SEGMENT_TIMEOUT_SECS: u64 = 120;
const SEGMENT_GAP: Duration = Duration::from_millis(400);
const SUBMIT_ATTEMPTS: u32 = 5;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Generate a podcast-style audio conversation from text, files, or URLs",
    group(ArgGroup::new("input").required(true).multiple(true))
)]
struct Args {
    /// Raw text to convert into a podcast.
    #[arg(long, group = "input")]
    text: Option<String>,

    /// Path to a text/markdown file (can repeat).
    #[arg(long, short = 'f', group = "input")]
    file: Vec<PathBuf>,

    /// URL to include as source (can repeat).
    #[arg(long, short = 'u', group = "input")]
    url: Vec<String>,

    /// Output audio file path.
    #[arg(long, default_value = "./media/generated/drafts/podcast.wav")]
    filename: PathBuf,

    /// Podcast name.
    #[arg(long)]
    name: Option<String>,

    /// Podcast tagline.
    #[arg(long)]
    tagline: Option<String>,

    /// Output language.
    #[arg(long, default_value = "English")]
    language: String,

    /// Comma-separated conversation styles.
    #[arg(long, default_value = "engaging,informative,conversational")]
    style: String,

    /// Custom instructions to guide the conversation focus.
    #[arg(long)]
    instructions: Option<String>,

    /// Creativity/temperature (0.0-1.0).
    #[arg(long, default_value_t = 0.7)]
    creativity: f64,

    /// Voice for host 1 (questioner).
    #[arg(long, default_value = "English_expressive_narrator")]
    voice1: String,

    /// Voice for host 2 (answerer).
    #[arg(long, default_value = "English_female_narrator")]
    voice2: String,

    /// MiniMax model used for voicing.
    #[arg(long, value_enum, default_value = "speech-2.6-hd")]
    tts_model: TtsModel,

    /// Ending message for the podcast.
    #[arg(long, default_value = "Thanks for listening!")]
    ending: String,

    /// LLM model for script generation.
    #[arg(long, default_value = "gemini-3-flash-preview")]
    llm_model: String,

    /// Generate a longer podcast (10-30+ minutes).
    #[arg(long)]
    longform: bool,

    /// Max discussion rounds (default: 5 short, 15 longform).
    #[arg(long)]
    max_chunks: Option<u32>,

    /// Only generate the transcript, skip audio.
    #[arg(long)]
    transcript_only: bool,

    /// Save the conversation transcript to this path.
    #[arg(long, value_name = "PATH")]
    save_transcript: Option<PathBuf>,

    /// Gemini API key override (default: GEMINI_API_KEY env).
    #[arg(long)]
    gemini_key: Option<String>,

    /// Replicate API token (overrides REPLICATE_API_TOKEN env var).
    #[arg(long)]
    api_token: Option<String>,

    /// Overall voicing timeout in seconds.
    #[arg(long, default_value_t = 600)]
    timeout: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum TtsModel {
    #[value(name = "speech-2.6-hd")]
    Hd,
    #[value(name = "speech-2.6-turbo")]
    Turbo,
}

impl TtsModel {
    fn model_id(self) -> &'static str {
        match self {
            TtsModel::Hd => "minimax/speech-2.6-hd",
            TtsModel::Turbo => "minimax/speech-2.6-turbo",
        }
    }
}

fn rounds(longform: bool, max_chunks: Option<u32>) -> u32 {
    max_chunks.unwrap_or(if longform { 15 } else { 5 })
}

/// Gather the source material: files first (missing ones are skipped with a
/// warning), then fetched URLs, then the raw --text, joined by separators.
async fn resolve_sources(args: &Args, http: &reqwest::Client) -> Result<String> {
    let mut parts: Vec<String> = Vec::new();

    for file in &args.file {
        if !file.exists() {
            eprintln!("WARNING: File not found: {}", file.display());
            continue;
        }
        let content = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        parts.push(content);
    }

    for url in &args.url {
        let bytes = download::fetch_bytes(http, url)
            .await
            .with_context(|| format!("failed to fetch {url}"))?;
        parts.push(String::from_utf8_lossy(&bytes).into_owned());
    }

    if let Some(text) = &args.text {
        parts.push(text.clone());
    }

    if parts.iter().all(|p| p.trim().is_empty()) {
        bail!("no valid input content found");
    }
    Ok(parts.join("\n\n---\n\n"))
}

/// The dialogue prompt sent to the LLM. The tag format it requests is the
/// contract `parse_segments` relies on.
fn build_prompt(args: &Args, source: &str) -> String {
    let styles = args
        .style
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    let rounds = rounds(args.longform, args.max_chunks);

    let mut prompt = String::new();
    prompt.push_str("Write a podcast conversation between two hosts.\n");
    prompt.push_str(
        "Format every turn as <Person1>...</Person1> or <Person2>...</Person2>. \
         Person1 leads the show and asks questions; Person2 answers in depth. \
         Do not write anything outside the speaker tags.\n",
    );
    let _ = writeln!(
        prompt,
        "Write about {rounds} discussion rounds (one round is a Person1 turn followed by a Person2 turn)."
    );
    if let Some(name) = &args.name {
        let _ = writeln!(prompt, "The podcast is called \"{name}\".");
    }
    if let Some(tagline) = &args.tagline {
        let _ = writeln!(prompt, "Its tagline is \"{tagline}\".");
    }
    let _ = writeln!(prompt, "The tone of the conversation: {styles}.");
    let _ = writeln!(prompt, "Write the dialogue in {}.", args.language);
    if let Some(instructions) = &args.instructions {
        let _ = writeln!(prompt, "Additional instructions: {instructions}");
    }
    let _ = writeln!(
        prompt,
        "\nBase the conversation on the following source material:\n\n{source}"
    );
    let _ = write!(
        prompt,
        "\nEnd the podcast with Person1 saying: \"{}\"",
        args.ending
    );
    prompt
}

/// Voice one segment: submit with rate-limit backoff, poll, download, decode.
async fn voice_segment(
    client: &ReplicateClient,
    model: &str,
    voice: &str,
    text: &str,
) -> Result<PcmAudio> {
    let input = json!({
        "text": text,
        "voice_id": voice,
        "audio_format": "wav",
    });
    let prediction = client
        .create_with_retry(model, input, SUBMIT_ATTEMPTS, |attempt, wait| {
            println!(
                "    Rate limited, waiting {}s (attempt {}/{})...",
                wait.as_secs(),
                attempt,
                SUBMIT_ATTEMPTS
            );
        })
        .await?;

    let poller = Poller::from_secs(SEGMENT_POLL_INTERVAL_SECS, SEGMENT_TIMEOUT_SECS);
    let id = prediction.id.clone();
    let done = poller.wait(prediction, || client.get(&id), |_, _| {}).await?;

    let output = done.output.ok_or_else(|| anyhow!("no output in prediction"))?;
    let audio_url =
        output_url(&output, "audio").ok_or_else(|| anyhow!("no audio URL in prediction output"))?;
    let bytes = download::fetch_bytes(client.http(), &audio_url).await?;
    Ok(audio::decode_wav(&bytes)?)
}

async fn voice_transcript(
    client: &ReplicateClient,
    args: &Args,
    segments: &[Segment],
) -> Result<Vec<PcmAudio>> {
    println!("  Voice 1 (host): {}", args.voice1);
    println!("  Voice 2 (co-host): {}", args.voice2);
    println!("  Voicing {} dialogue segments with MiniMax...", segments.len());

    let started = Instant::now();
    let budget = Duration::from_secs(args.timeout);
    let model = args.tts_model.model_id();
    let mut parts: Vec<PcmAudio> = Vec::new();

    for (i, segment) in segments.iter().enumerate() {
        if started.elapsed() >= budget {
            bail!("timed out after {}s while voicing segments", args.timeout);
        }
        let voice = match segment.speaker {
            Speaker::Person1 => &args.voice1,
            Speaker::Person2 => &args.voice2,
        };
        println!(
            "  [{}/{}] {} ({} chars)",
            i + 1,
            segments.len(),
            segment.speaker,
            segment.text.chars().count()
        );
        if i > 0 {
            tokio::time::sleep(PACING).await;
        }

        match voice_segment(client, model, voice, &segment.text).await {
            Ok(audio) => {
                // A segment whose format disagrees with the rest cannot be
                // concatenated; treat it as failed rather than aborting.
                if parts.first().is_some_and(|first| first.spec != audio.spec) {
                    eprintln!("  WARNING: Segment {} failed: unexpected audio format", i + 1);
                    continue;
                }
                parts.push(audio);
            }
            Err(err) => {
                warn!(segment = i + 1, "segment voicing failed");
                eprintln!("  WARNING: Segment {} failed: {err:#}", i + 1);
            }
        }
    }

    if parts.is_empty() {
        bail!("no audio segments were generated");
    }
    Ok(parts)
}

async fn run(args: Args) -> Result<()> {
    let gemini_key = auth::resolve(args.gemini_key.as_deref(), "GEMINI_API_KEY", "--gemini-key")?;
    let replicate_token = if args.transcript_only {
        None
    } else {
        Some(auth::resolve(
            args.api_token.as_deref(),
            "REPLICATE_API_TOKEN",
            "--api-token",
        )?)
    };

    let http = reqwest::Client::new();
    let source = resolve_sources(&args, &http).await?;

    println!("Generating podcast...");
    println!("  LLM: {}", args.llm_model);
    println!("  TTS: {}", args.tts_model.model_id());
    println!("  Longform: {}", args.longform);
    println!("  Source: {} chars", source.chars().count());

    let gemini = GeminiClient::new(gemini_key);
    let prompt = build_prompt(&args, &source);
    let transcript = gemini
        .generate_content(&args.llm_model, &prompt, args.creativity)
        .await
        .context("transcript generation failed")?;

    if let Some(path) = &args.save_transcript {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, &transcript)
            .with_context(|| format!("failed to save the transcript to {}", path.display()))?;
        println!("Transcript saved: {}", path.display());
    }

    if args.transcript_only {
        println!();
        println!("Transcript generated.");
        if args.save_transcript.is_none() {
            println!("{transcript}");
        }
        return Ok(());
    }

    let segments = parse_segments(&transcript);
    if segments.is_empty() {
        bail!("no <Person1>/<Person2> segments found in transcript");
    }

    let token = replicate_token.context("replicate token required for audio output")?;
    let client = ReplicateClient::new(token);
    let parts = voice_transcript(&client, &args, &segments).await?;

    audio::concat_with_silence(&parts, SEGMENT_GAP, &args.filename)
        .context("failed to write the podcast audio")?;

    let size = std::fs::metadata(&args.filename)?.len();
    println!();
    println!(
        "Podcast saved: {} ({:.1} MB)",
        args.filename.canonicalize().unwrap_or_else(|_| args.filename.clone()).display(),
        size as f64 / (1024.0 * 1024.0)
    );
    cli::print_media_marker(&args.filename);
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    cli::init_tracing();
    cli::run_to_exit(run(args)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use axum::extract::{Path as UrlPath, State};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::Value;

    fn args_from(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    struct TtsVendor {
        base: String,
        failing: Vec<u32>,
        submissions: AtomicU32,
    }

    fn wav_bytes(value: i16) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut bytes = std::io::Cursor::new(Vec::new());
        let mut writer = hound::WavWriter::new(&mut bytes, spec).unwrap();
        for _ in 0..40 {
            writer.write_sample(value).unwrap();
        }
        writer.finalize().unwrap();
        bytes.into_inner()
    }

    async fn submit(State(vendor): State<Arc<TtsVendor>>) -> Json<Value> {
        let n = vendor.submissions.fetch_add(1, Ordering::SeqCst) + 1;
        if vendor.failing.contains(&n) {
            Json(json!({
                "id": format!("seg-{n}"),
                "status": "failed",
                "error": "synthesis rejected"
            }))
        } else {
            Json(json!({
                "id": format!("seg-{n}"),
                "status": "succeeded",
                "output": { "audio": format!("{}/files/{n}", vendor.base) }
            }))
        }
    }

    // Each served segment is 40 samples of its submission number, so
    // ordering is observable in the decoded audio.
    async fn segment_wav(UrlPath(n): UrlPath<u32>) -> Vec<u8> {
        wav_bytes(n as i16)
    }

    async fn spawn_tts_vendor(failing: Vec<u32>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let vendor = Arc::new(TtsVendor {
            base: base.clone(),
            failing,
            submissions: AtomicU32::new(0),
        });
        let app = Router::new()
            .route("/v1/models/minimax/speech-2.6-hd/predictions", post(submit))
            .route("/files/{n}", get(segment_wav))
            .with_state(vendor);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        base
    }

    fn dialogue(lines: &[(Speaker, &str)]) -> Vec<Segment> {
        lines
            .iter()
            .map(|(speaker, text)| Segment { speaker: *speaker, text: text.to_string() })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn failed_segments_are_skipped_and_survivors_kept_in_order() {
        let base = spawn_tts_vendor(vec![2]).await;
        let client = ReplicateClient::with_base_url("test-token".into(), format!("{base}/v1"));
        let args = args_from(&["podcast-gen", "--text", "x"]);
        let segments = dialogue(&[
            (Speaker::Person1, "first"),
            (Speaker::Person2, "second"),
            (Speaker::Person1, "third"),
        ]);

        let parts = voice_transcript(&client, &args, &segments).await.unwrap();

        assert_eq!(parts.len(), 2);
        assert!(parts[0].samples.iter().all(|&s| s == 1));
        assert!(parts[1].samples.iter().all(|&s| s == 3));
    }

    #[tokio::test(start_paused = true)]
    async fn voicing_fails_only_when_every_segment_fails() {
        let base = spawn_tts_vendor(vec![1, 2]).await;
        let client = ReplicateClient::with_base_url("test-token".into(), format!("{base}/v1"));
        let args = args_from(&["podcast-gen", "--text", "x"]);
        let segments = dialogue(&[(Speaker::Person1, "first"), (Speaker::Person2, "second")]);

        let err = voice_transcript(&client, &args, &segments).await.unwrap_err();
        assert!(err.to_string().contains("no audio segments were generated"));
    }

    #[test]
    fn at_least_one_input_source_is_required() {
        assert!(Args::try_parse_from(["podcast-gen"]).is_err());
        assert!(Args::try_parse_from(["podcast-gen", "--text", "hi"]).is_ok());
        assert!(Args::try_parse_from(["podcast-gen", "-u", "https://a", "-u", "https://b"]).is_ok());
    }

    #[test]
    fn round_count_follows_longform_and_override() {
        assert_eq!(rounds(false, None), 5);
        assert_eq!(rounds(true, None), 15);
        assert_eq!(rounds(true, Some(30)), 30);
        assert_eq!(rounds(false, Some(2)), 2);
    }

    #[test]
    fn prompt_carries_the_configured_voiceprint() {
        let args = args_from(&[
            "podcast-gen",
            "--text", "ignored here",
            "--name", "Deep Dive",
            "--tagline", "All the way down",
            "--style", "witty, curious",
            "--longform",
        ]);
        let prompt = build_prompt(&args, "the source");
        assert!(prompt.contains("Deep Dive"));
        assert!(prompt.contains("All the way down"));
        assert!(prompt.contains("witty, curious"));
        assert!(prompt.contains("15 discussion rounds"));
        assert!(prompt.contains("the source"));
        assert!(prompt.ends_with("\"Thanks for listening!\""));
    }

    #[test]
    fn prompt_requests_the_tag_format_the_parser_expects() {
        let args = args_from(&["podcast-gen", "--text", "x"]);
        let prompt = build_prompt(&args, "x");
        assert!(prompt.contains("<Person1>...</Person1>"));
        assert!(prompt.contains("<Person2>...</Person2>"));
    }

    #[tokio::test]
    async fn missing_files_are_skipped_not_fatal() {
        let present = std::env::temp_dir().join(format!("podcast-src-{}.md", std::process::id()));
        std::fs::write(&present, "real content").unwrap();
        let args = args_from(&[
            "podcast-gen",
            "-f", present.to_str().unwrap(),
            "-f", "/nonexistent/missing.md",
        ]);
        let source = resolve_sources(&args, &reqwest::Client::new()).await.unwrap();
        assert_eq!(source, "real content");
        std::fs::remove_file(&present).ok();
    }

    #[tokio::test]
    async fn text_is_appended_after_files() {
        let present = std::env::temp_dir().join(format!("podcast-src2-{}.md", std::process::id()));
        std::fs::write(&present, "from file").unwrap();
        let args = args_from(&[
            "podcast-gen",
            "-f", present.to_str().unwrap(),
            "--text", "from flag",
        ]);
        let source = resolve_sources(&args, &reqwest::Client::new()).await.unwrap();
        assert_eq!(source, "from file\n\n---\n\nfrom flag");
        std::fs::remove_file(&present).ok();
    }

    #[tokio::test]
    async fn blank_sources_are_an_error() {
        let args = args_from(&["podcast-gen", "--text", "   "]);
        assert!(resolve_sources(&args, &reqwest::Client::new()).await.is_err());
    }
}
