/// Smoke-test for `BrowserRenderer`.
///
/// Launches a headless Chromium, renders <https://example.com>, and
/// verifies the HTML contains the expected `<h1>`.
///
/// Run with:
///   cargo run --example browser_smoke --features browser
use std::time::Duration;

use gleaner_core::rules::ReadinessPolicy;
use gleaner_core::traits::Renderer;
use gleaner_render::BrowserRenderer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    println!("Launching headless browser…");
    let renderer = BrowserRenderer::new().await?;

    let url = "https://example.com";
    println!("Rendering {url} …");
    let html = renderer
        .render(
            url,
            &ReadinessPolicy::WaitForSelector("h1".into()),
            Duration::from_secs(30),
        )
        .await?;

    assert!(
        html.contains("<h1>Example Domain</h1>"),
        "Expected <h1> not found in rendered HTML"
    );
    assert!(
        html.len() > 500,
        "HTML suspiciously short ({} bytes)",
        html.len()
    );

    println!("OK: got {} bytes of rendered HTML", html.len());
    Ok(())
}
