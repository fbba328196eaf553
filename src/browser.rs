//! Browser launcher
//!
//! Opening the browser is best-effort: the task is spawned and never awaited,
//! and a failure only logs the URL so the operator can open it by hand. It
//! never affects the server lifecycle.

use std::io;
use std::time::Duration;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Opens `url` in the default browser after `delay`, in the background.
pub fn spawn_open(url: String, delay: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        match open(&url).await {
            Ok(()) => info!("Opened browser at {url}"),
            Err(e) => {
                warn!("Could not open browser: {e}");
                info!("Open this URL manually: {url}");
            }
        }
    })
}

async fn open(url: &str) -> io::Result<()> {
    let (program, args) = opener_command(url);
    let status = Command::new(program).args(&args).status().await?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("{program} exited with {status}")))
    }
}

/// Platform command that opens a URL
fn opener_command(url: &str) -> (&'static str, Vec<String>) {
    if cfg!(target_os = "macos") {
        ("open", vec![url.to_string()])
    } else if cfg!(target_os = "windows") {
        (
            "cmd",
            vec![
                "/C".to_string(),
                "start".to_string(),
                String::new(),
                url.to_string(),
            ],
        )
    } else {
        ("xdg-open", vec![url.to_string()])
    }
}
