use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};

use mediagen_core::job::Poller;
use mediagen_core::openai::{OpenAiClient, Video, VideoStatus};
use mediagen_core::{auth, cli};

#[derive(Parser)]
#[command(author, version, about = "Generate videos using Sora 2 (OpenAI API)")]
struct Args {
    /// Video description/prompt.
    #[arg(long, short = 'p')]
    prompt: String,

    /// Output filename (e.g., scene-001.mp4).
    #[arg(long, short = 'f')]
    filename: PathBuf,

    /// Input reference image for image-to-video.
    #[arg(long, short = 'i', value_name = "IMAGE")]
    input_image: Option<PathBuf>,

    /// Video size: 1280x720 (landscape), 720x1280 (portrait), 1080x1080 (square).
    #[arg(long, short = 's', value_enum)]
    size: Option<VideoSize>,

    /// Duration in seconds.
    #[arg(long, short = 'd', value_enum)]
    seconds: Option<VideoSeconds>,

    /// Model: sora-2 (standard) or sora-2-pro (HD).
    #[arg(long, short = 'm', value_enum, default_value = "sora-2")]
    model: SoraModel,

    /// Remix an existing video by its ID.
    #[arg(long, value_name = "VIDEO_ID")]
    remix: Option<String>,

    /// OpenAI API key (overrides OPENAI_API_KEY env var).
    #[arg(long, short = 'k')]
    api_key: Option<String>,

    /// Polling interval in seconds.
    #[arg(long, default_value_t = 10)]
    poll_interval: u64,

    /// Max wait time in seconds.
    #[arg(long, default_value_t = 600)]
    timeout: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum VideoSize {
    #[value(name = "1280x720")]
    Landscape,
    #[value(name = "720x1280")]
    Portrait,
    #[value(name = "1080x1080")]
    Square,
}

impl VideoSize {
    fn as_str(self) -> &'static str {
        match self {
            VideoSize::Landscape => "1280x720",
            VideoSize::Portrait => "720x1280",
            VideoSize::Square => "1080x1080",
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum VideoSeconds {
    #[value(name = "4")]
    Four,
    #[value(name = "8")]
    Eight,
    #[value(name = "12")]
    Twelve,
}

impl VideoSeconds {
    fn as_str(self) -> &'static str {
        match self {
            VideoSeconds::Four => "4",
            VideoSeconds::Eight => "8",
            VideoSeconds::Twelve => "12",
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SoraModel {
    #[value(name = "sora-2")]
    Sora2,
    #[value(name = "sora-2-pro")]
    Sora2Pro,
}

impl SoraModel {
    fn as_str(self) -> &'static str {
        match self {
            SoraModel::Sora2 => "sora-2",
            SoraModel::Sora2Pro => "sora-2-pro",
        }
    }
}

/// MIME type for a reference image; unknown extensions fall back to JPEG,
/// matching what the vendor accepts most leniently.
fn image_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

/// 30-column progress bar line, e.g. `Processing: [=====---...] 17% (30s elapsed)`.
fn progress_line(video: &Video, elapsed: Duration) -> String {
    const BAR_LEN: usize = 30;
    let progress = video.progress.unwrap_or(0.0).clamp(0.0, 100.0);
    let filled = (progress / 100.0 * BAR_LEN as f64) as usize;
    let bar: String = "=".repeat(filled) + &"-".repeat(BAR_LEN - filled);
    let label = if video.status == VideoStatus::Queued {
        "Queued"
    } else {
        "Processing"
    };
    format!(
        "  {label}: [{bar}] {progress:.0}% ({}s elapsed)",
        elapsed.as_secs()
    )
}

async fn run(args: Args) -> Result<()> {
    let key = auth::resolve(args.api_key.as_deref(), "OPENAI_API_KEY", "--api-key")?;
    let client = OpenAiClient::new(key);

    let model = args.model.as_str();
    let size = args.size.map(VideoSize::as_str);
    let seconds = args.seconds.map(VideoSeconds::as_str);
    let preview: String = args.prompt.chars().take(80).collect();
    let ellipsis = if args.prompt.chars().count() > 80 { "..." } else { "" };

    let video = if let Some(remix_id) = &args.remix {
        println!("Remixing video {remix_id}...");
        println!("  Model: {model}");
        println!("  Prompt: {preview}{ellipsis}");
        client.remix_video(remix_id, model, &args.prompt).await?
    } else if let Some(image) = &args.input_image {
        if !image.exists() {
            bail!("input image not found: {}", image.display());
        }
        println!("Generating video from image...");
        println!("  Model: {model}");
        println!("  Image: {}", image.display());
        println!("  Size: {}", size.unwrap_or("auto"));
        println!("  Duration: {}s", seconds.unwrap_or("4"));
        client
            .create_video_from_image(model, &args.prompt, size, seconds, image, image_mime(image))
            .await?
    } else {
        println!("Generating video...");
        println!("  Model: {model}");
        println!("  Size: {}", size.unwrap_or("1280x720"));
        println!("  Duration: {}s", seconds.unwrap_or("4"));
        client.create_video(model, &args.prompt, size, seconds).await?
    };

    println!("  Job ID: {}", video.id);
    println!("  Status: {}", video.status);

    let poller = Poller::from_secs(args.poll_interval, args.timeout);
    let id = video.id.clone();
    let done = poller
        .wait(
            video,
            || client.get_video(&id),
            |job, elapsed| println!("{}", progress_line(job, elapsed)),
        )
        .await
        .context("video generation failed")?;

    println!("  Downloading video...");
    let written = client
        .download_content(&done.id, &args.filename)
        .await
        .context("failed to download the video")?;

    println!();
    println!(
        "Video saved: {}",
        args.filename.canonicalize().unwrap_or_else(|_| args.filename.clone()).display()
    );
    println!("  Size: {:.1} MB", written as f64 / (1024.0 * 1024.0));
    println!("  Duration: ~{}s", seconds.unwrap_or("4"));
    println!("  Resolution: {}", size.unwrap_or("1280x720"));
    println!("  Model: {model}");
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

    fn video(status: VideoStatus, progress: Option<f64>) -> Video {
        Video { id: "v1".into(), status, progress, error: None }
    }

    #[test]
    fn progress_bar_is_thirty_columns() {
        let line = progress_line(&video(VideoStatus::InProgress, Some(50.0)), Duration::from_secs(30));
        let bar: String = line.chars().skip_while(|&c| c != '[').take_while(|&c| c != ']').skip(1).collect();
        assert_eq!(bar.len(), 30);
        assert_eq!(bar.matches('=').count(), 15);
        assert!(line.contains("50%"));
        assert!(line.contains("(30s elapsed)"));
    }

    #[test]
    fn queued_jobs_are_labeled_queued() {
        let line = progress_line(&video(VideoStatus::Queued, None), Duration::from_secs(0));
        assert!(line.contains("Queued:"));
        assert!(line.contains("0%"));
    }

    #[test]
    fn image_mime_maps_known_extensions() {
        assert_eq!(image_mime(Path::new("a.png")), "image/png");
        assert_eq!(image_mime(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(image_mime(Path::new("a.webp")), "image/webp");
        assert_eq!(image_mime(Path::new("a.bmp")), "image/jpeg");
    }

    #[test]
    fn args_accept_enumerated_sizes() {
        let args = Args::try_parse_from([
            "sora-gen", "-p", "hi", "-f", "out.mp4", "--size", "720x1280", "--seconds", "8",
        ])
        .unwrap();
        assert_eq!(args.size.unwrap().as_str(), "720x1280");
        assert_eq!(args.seconds.unwrap().as_str(), "8");
        assert!(Args::try_parse_from(["sora-gen", "-p", "x", "-f", "o.mp4", "--size", "640x480"]).is_err());
    }
}
