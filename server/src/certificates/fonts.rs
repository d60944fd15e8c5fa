use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::render::CertificateFont;
use crate::pdf::RenderError;

/// Upper bound on a downloaded font; script faces are well under 1 MiB.
const MAX_FONT_BYTES: u64 = 8 * 1024 * 1024;

/// Reads font bytes from a file path or an http(s) URL. Blocking; a download
/// gives up after `timeout`.
pub fn load_font_source(source: &str, timeout: Duration) -> Result<Vec<u8>, RenderError> {
    let bytes = if source.starts_with("http://") || source.starts_with("https://") {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        let response = agent
            .get(source)
            .call()
            .map_err(|e| RenderError::Font(format!("Failed to fetch {source}: {e}")))?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_FONT_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|e| RenderError::Font(format!("Failed to read response: {e}")))?;
        bytes
    } else {
        std::fs::read(source).map_err(|e| RenderError::Font(format!("{source}: {e}")))?
    };

    if !looks_like_font(&bytes) {
        return Err(RenderError::Font(format!(
            "{source} is not a TrueType/OpenType font"
        )));
    }
    Ok(bytes)
}

fn looks_like_font(bytes: &[u8]) -> bool {
    matches!(
        bytes.get(..4),
        Some([0x00, 0x01, 0x00, 0x00]) | Some(b"OTTO") | Some(b"true") | Some(b"ttcf")
    )
}

/// Picks the face for a batch. Script families use the configured script font
/// when it loads; every failure degrades to a built-in face instead of
/// aborting the batch. Blocking.
pub fn resolve_font(
    family: &str,
    script_source: Option<&str>,
    timeout: Duration,
) -> CertificateFont {
    if CertificateFont::is_script_family(family) {
        match script_source.map(|source| load_font_source(source, timeout)) {
            Some(Ok(bytes)) => {
                info!(family, size = bytes.len(), "Loaded script font for certificates");
                return CertificateFont::Embedded(Arc::new(bytes));
            }
            Some(Err(e)) => {
                warn!(family, error = %e, "Script font unavailable, using built-in face");
            }
            None => {
                warn!(family, "No script font configured, using built-in face");
            }
        }
    }
    CertificateFont::builtin_for(family)
}

#[cfg(test)]
mod tests {
    use super::*;
    use printpdf::BuiltinFont;
    use std::io::Write;
    use std::net::TcpListener;
    use std::time::Instant;

    const SHORT: Duration = Duration::from_millis(300);

    #[test]
    fn rejects_non_font_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"<html>404</html>").unwrap();
        let err = load_font_source(file.path().to_str().unwrap(), SHORT).unwrap_err();
        assert!(matches!(err, RenderError::Font(_)));
    }

    #[test]
    fn accepts_truetype_magic() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x10]).unwrap();
        let bytes = load_font_source(file.path().to_str().unwrap(), SHORT).unwrap();
        assert_eq!(bytes.len(), 6);
    }

    #[test]
    fn missing_script_font_falls_back_to_helvetica() {
        let font = resolve_font("Great Vibes", Some("/nonexistent/GreatVibes.ttf"), SHORT);
        assert!(matches!(font, CertificateFont::Builtin(BuiltinFont::Helvetica)));

        let font = resolve_font("Cursive", None, SHORT);
        assert!(matches!(font, CertificateFont::Builtin(BuiltinFont::Helvetica)));
    }

    #[test]
    fn non_script_family_never_loads_a_file() {
        let font = resolve_font("Times", Some("/nonexistent/GreatVibes.ttf"), SHORT);
        assert!(matches!(font, CertificateFont::Builtin(BuiltinFont::TimesRoman)));
    }

    #[test]
    fn stalled_font_host_falls_back_within_the_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        // Accepts and then never answers.
        std::thread::spawn(move || {
            let held: Vec<_> = listener.incoming().take(2).collect();
            std::thread::sleep(Duration::from_secs(30));
            drop(held);
        });

        let started = Instant::now();
        let font = resolve_font(
            "Great Vibes",
            Some(&format!("http://127.0.0.1:{port}/GreatVibes.ttf")),
            SHORT,
        );

        assert!(matches!(font, CertificateFont::Builtin(BuiltinFont::Helvetica)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
