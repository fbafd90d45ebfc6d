//! Badge portrait CLI tool
//!
//! Command-line interface for face crops, background removal and round badge
//! portraits, with ONNX Runtime and Tract backends for the matte network.

#[cfg(feature = "cli")]
use badge_portrait::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
