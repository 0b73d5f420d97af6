//! Failure diagnostics

use std::io::Cursor;
use tracing::{debug, warn};

use shopcheck_common::Screenshot;

use crate::browser::BrowserSession;
use crate::error::E2eResult;

/// Capture the current viewport as a PNG.
///
/// Never fails: a session in a broken state yields `None` and a warning, so the
/// error that triggered the capture is still what gets reported.
pub async fn capture<S: BrowserSession>(session: &S) -> Option<Screenshot> {
    match try_capture(session).await {
        Ok(screenshot) => {
            debug!(
                "Captured diagnostic screenshot ({} bytes, sha256 {})",
                screenshot.len(),
                &screenshot.sha256()[..12]
            );
            Some(screenshot)
        }
        Err(e) => {
            warn!("Diagnostic capture failed: {}", e);
            None
        }
    }
}

async fn try_capture<S: BrowserSession>(session: &S) -> E2eResult<Screenshot> {
    let raw = session.screenshot().await?;
    normalize_png(&raw)
}

/// Decode and re-encode as PNG, rejecting truncated or foreign data
pub fn normalize_png(raw: &[u8]) -> E2eResult<Screenshot> {
    let image = image::load_from_memory(raw)?;
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, image::ImageOutputFormat::Png)?;
    Ok(Screenshot::from_png(out.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{tiny_png, FakeBrowser, FakeDom, FakeEvent};

    #[tokio::test]
    async fn test_capture_returns_png() {
        let browser = FakeBrowser::new(FakeDom::new());
        let shot = capture(&browser).await.expect("screenshot");
        assert!(shot.as_bytes().starts_with(b"\x89PNG"));
        assert_eq!(browser.events(), vec![FakeEvent::Screenshot]);
    }

    #[tokio::test]
    async fn test_capture_failure_yields_none() {
        let mut dom = FakeDom::new();
        dom.fail_screenshots();
        let browser = FakeBrowser::new(dom);
        assert!(capture(&browser).await.is_none());
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert!(normalize_png(b"not an image").is_err());
        let truncated = &tiny_png()[..20];
        assert!(normalize_png(truncated).is_err());
    }
}
