use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::Engine as _;
use clap::{Parser, ValueEnum};
use serde_json::json;

use mediagen_core::gemini::GeminiClient;
use mediagen_core::job::Poller;
use mediagen_core::{auth, cli};

#[derive(Parser)]
#[command(author, version, about = "Generate videos using Veo 3.1 (Google Gemini API)")]
struct Args {
    /// Video description/prompt.
    #[arg(long, short = 'p')]
    prompt: String,

    /// Output filename (e.g., scene-001.mp4).
    #[arg(long, short = 'f')]
    filename: PathBuf,

    /// Input image path for image-to-video generation.
    #[arg(long, short = 'i', value_name = "IMAGE")]
    input_image: Option<PathBuf>,

    /// Aspect ratio: 16:9 (landscape) or 9:16 (portrait).
    #[arg(long, short = 'a', value_enum, default_value = "16:9")]
    aspect: Aspect,

    /// Output resolution.
    #[arg(long, short = 'r', value_enum, default_value = "720p")]
    resolution: Resolution,

    /// Duration in seconds.
    #[arg(long, short = 'd', value_enum, default_value = "8")]
    duration: VideoDuration,

    /// Negative prompt, what to avoid in the video.
    #[arg(long, short = 'n')]
    negative: Option<String>,

    /// Seed for slight reproducibility (not guaranteed deterministic).
    #[arg(long, short = 's')]
    seed: Option<i64>,

    /// Person generation policy.
    #[arg(long, value_enum, default_value = "allow_all")]
    person: PersonPolicy,

    /// Model variant.
    #[arg(long, short = 'm', value_enum, default_value = "veo-3.1-generate-preview")]
    model: VeoModel,

    /// Gemini API key (overrides GEMINI_API_KEY env var).
    #[arg(long, short = 'k')]
    api_key: Option<String>,

    /// Polling interval in seconds.
    #[arg(long, default_value_t = 10)]
    poll_interval: u64,

    /// Max wait time in seconds.
    #[arg(long, default_value_t = 360)]
    timeout: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum Aspect {
    #[value(name = "16:9")]
    Landscape,
    #[value(name = "9:16")]
    Portrait,
}

impl Aspect {
    fn as_str(self) -> &'static str {
        match self {
            Aspect::Landscape => "16:9",
            Aspect::Portrait => "9:16",
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Resolution {
    #[value(name = "720p")]
    R720p,
    #[value(name = "1080p")]
    R1080p,
    #[value(name = "4k")]
    R4k,
}

impl Resolution {
    fn as_str(self) -> &'static str {
        match self {
            Resolution::R720p => "720p",
            Resolution::R1080p => "1080p",
            Resolution::R4k => "4k",
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum VideoDuration {
    #[value(name = "4")]
    Four,
    #[value(name = "6")]
    Six,
    #[value(name = "8")]
    Eight,
}

impl VideoDuration {
    fn seconds(self) -> u32 {
        match self {
            VideoDuration::Four => 4,
            VideoDuration::Six => 6,
            VideoDuration::Eight => 8,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PersonPolicy {
    #[value(name = "allow_all")]
    AllowAll,
    #[value(name = "allow_adult")]
    AllowAdult,
}

impl PersonPolicy {
    fn as_str(self) -> &'static str {
        match self {
            PersonPolicy::AllowAll => "allow_all",
            PersonPolicy::AllowAdult => "allow_adult",
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum VeoModel {
    #[value(name = "veo-3.1-generate-preview")]
    Standard,
    #[value(name = "veo-3.1-fast-generate-preview")]
    Fast,
}

impl VeoModel {
    fn as_str(self) -> &'static str {
        match self {
            VeoModel::Standard => "veo-3.1-generate-preview",
            VeoModel::Fast => "veo-3.1-fast-generate-preview",
        }
    }
}

/// MIME type for a reference image; unknown extensions fall back to PNG.
fn image_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

/// The policy the vendor will accept: allow_all is rejected for
/// image-to-video and gets downgraded.
fn effective_person_policy(requested: PersonPolicy, has_image: bool) -> PersonPolicy {
    if has_image && requested == PersonPolicy::AllowAll {
        PersonPolicy::AllowAdult
    } else {
        requested
    }
}

async fn run(args: Args) -> Result<()> {
    let key = auth::resolve(args.api_key.as_deref(), "GEMINI_API_KEY", "--api-key")?;
    let client = GeminiClient::new(key);

    let person = effective_person_policy(args.person, args.input_image.is_some());
    if person != args.person {
        println!("  Note: personGeneration auto-set to allow_adult (required for image input)");
    }

    let mut instance = json!({ "prompt": args.prompt });
    if let Some(image) = &args.input_image {
        if !image.exists() {
            bail!("input image not found: {}", image.display());
        }
        let mime = image_mime(image);
        let bytes = std::fs::read(image).context("failed to read the input image")?;
        instance["image"] = json!({
            "bytesBase64Encoded": base64::engine::general_purpose::STANDARD.encode(bytes),
            "mimeType": mime,
        });
        println!("Loaded input image: {} ({mime})", image.display());
    }

    let mut parameters = json!({
        "aspectRatio": args.aspect.as_str(),
        "resolution": args.resolution.as_str(),
        "durationSeconds": args.duration.seconds(),
        "personGeneration": person.as_str(),
    });
    if let Some(negative) = &args.negative {
        parameters["negativePrompt"] = json!(negative);
    }
    if let Some(seed) = args.seed {
        parameters["seed"] = json!(seed);
    }

    println!("Generating video...");
    println!("  Model: {}", args.model.as_str());
    println!("  Aspect: {}", args.aspect.as_str());
    println!("  Resolution: {}", args.resolution.as_str());
    println!("  Duration: {}s", args.duration.seconds());
    if let Some(negative) = &args.negative {
        println!("  Negative: {negative}");
    }
    if let Some(seed) = args.seed {
        println!("  Seed: {seed}");
    }

    let body = json!({ "instances": [instance], "parameters": parameters });
    let operation = client
        .generate_videos(args.model.as_str(), body)
        .await
        .map_err(with_hints)?;

    let poller = Poller::from_secs(args.poll_interval, args.timeout);
    let name = operation.name.clone();
    let done = poller
        .wait(
            operation,
            || client.get_operation(&name),
            |_, elapsed| {
                println!("  Waiting for video generation... ({}s elapsed)", elapsed.as_secs());
            },
        )
        .await
        .map_err(with_hints)
        .context("video generation failed")?;

    let uri = done.video_uri().ok_or_else(|| {
        anyhow::anyhow!("no video was generated; the request may have been blocked by safety filters")
    })?;

    client
        .download_file(uri, &args.filename)
        .await
        .context("failed to download the video")?;

    println!();
    println!(
        "Video saved: {}",
        args.filename.canonicalize().unwrap_or_else(|_| args.filename.clone()).display()
    );
    println!("  Duration: ~{}s", args.duration.seconds());
    println!("  Resolution: {}", args.resolution.as_str());
    println!("  Aspect: {}", args.aspect.as_str());
    cli::print_media_marker(&args.filename);
    Ok(())
}

/// Surface the two common vendor-side causes next to the raw error.
fn with_hints(err: mediagen_core::Error) -> anyhow::Error {
    let lowered = err.to_string().to_lowercase();
    if lowered.contains("safety") || lowered.contains("blocked") {
        eprintln!("Hint: The prompt may have triggered safety filters. Try adjusting the content.");
    }
    if lowered.contains("quota") || lowered.contains("rate") {
        eprintln!("Hint: You may have hit rate limits. Wait a moment and try again.");
    }
    anyhow::anyhow!(err)
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

    #[test]
    fn image_input_downgrades_allow_all() {
        assert_eq!(
            effective_person_policy(PersonPolicy::AllowAll, true).as_str(),
            "allow_adult"
        );
        assert_eq!(
            effective_person_policy(PersonPolicy::AllowAll, false).as_str(),
            "allow_all"
        );
        assert_eq!(
            effective_person_policy(PersonPolicy::AllowAdult, true).as_str(),
            "allow_adult"
        );
    }

    #[test]
    fn image_mime_defaults_to_png() {
        assert_eq!(image_mime(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(image_mime(Path::new("a.png")), "image/png");
        assert_eq!(image_mime(Path::new("a.tiff")), "image/png");
    }

    #[test]
    fn args_parse_with_defaults() {
        let args = Args::try_parse_from(["veo-gen", "-p", "hi", "-f", "out.mp4"]).unwrap();
        assert_eq!(args.aspect.as_str(), "16:9");
        assert_eq!(args.resolution.as_str(), "720p");
        assert_eq!(args.duration.seconds(), 8);
        assert_eq!(args.timeout, 360);
    }

    #[test]
    fn duration_rejects_unsupported_values() {
        assert!(Args::try_parse_from(["veo-gen", "-p", "x", "-f", "o.mp4", "-d", "10"]).is_err());
    }
}
