//! Conventions shared by every tool binary: tracing setup, the `MEDIA:`
//! stdout marker, and the exit-code contract (0 success, 1 failure,
//! 130 on interrupt).

use std::future::Future;
use std::path::Path;

use tracing_subscriber::EnvFilter;

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_INTERRUPTED: i32 = 130;

/// Diagnostics go to stderr; stdout is reserved for status lines and the
/// `MEDIA:` marker the host application scans for.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// The marker line signaling a produced file to the host application.
pub fn media_marker(path: &Path) -> String {
    let full = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    format!("MEDIA: {}", full.display())
}

pub fn print_media_marker(path: &Path) {
    println!("{}", media_marker(path));
}

/// Run the tool future to completion, mapping its outcome onto the exit
/// code contract and racing it against Ctrl-C.
pub async fn run_to_exit<F>(fut: F) -> !
where
    F: Future<Output = anyhow::Result<()>>,
{
    let code = tokio::select! {
        res = fut => match res {
            Ok(()) => 0,
            Err(err) => {
                eprintln!("Error: {err:#}");
                EXIT_FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nCancelled.");
            EXIT_INTERRUPTED
        }
    };
    std::process::exit(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_names_the_file() {
        let marker = media_marker(Path::new("/tmp/does-not-exist/out.mp3"));
        assert!(marker.starts_with("MEDIA: "));
        assert!(marker.ends_with("out.mp3"));
    }

    #[test]
    fn marker_resolves_existing_paths_to_absolute() {
        let dir = std::env::temp_dir();
        let marker = media_marker(&dir);
        let path = marker.strip_prefix("MEDIA: ").unwrap();
        assert!(Path::new(path).is_absolute());
    }
}
