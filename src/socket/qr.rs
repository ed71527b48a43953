//! Pairing code generation and terminal rendering.

use std::time::Duration;

use qrcode::{render::unicode, QrCode};
use thiserror::Error;

use crate::store::Credentials;

/// Number of codes issued before a pairing attempt gives up.
pub const CODES_PER_ATTEMPT: usize = 6;

#[derive(Debug, Clone, Error)]
pub enum QrError {
    #[error("QR generation failed: {0}")]
    GenerationFailed(String),
}

/// Generate pairing codes for the given device.
/// Format: ref,noisePublicKey,identityPublicKey,advSecretKey
pub fn pairing_codes(creds: &Credentials, count: usize) -> Vec<String> {
    (0..count)
        .map(|_| {
            let ref_id = format!("{:X}", rand::random::<u64>());
            format!(
                "{},{},{},{}",
                ref_id, creds.noise_key, creds.identity_key, creds.adv_secret_key
            )
        })
        .collect()
}

/// How long the code at `index` stays valid.
pub fn code_timeout(index: usize) -> Duration {
    if index == 0 {
        Duration::from_secs(60)
    } else {
        Duration::from_secs(20)
    }
}

/// Render QR code as unicode blocks for terminal display.
pub fn render_terminal(data: &str) -> Result<String, QrError> {
    let code =
        QrCode::new(data.as_bytes()).map_err(|e| QrError::GenerationFailed(e.to_string()))?;

    let image = code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build();

    Ok(image)
}
