use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

/// URL prefix under which the upload directory is served.
pub const PUBLIC_PREFIX: &str = "/uploads";

const MAX_NAME_LEN: usize = 100;

/// Write an uploaded file into `dir` and return the stored file name,
/// `<unix-millis>-<sanitized original name>`.
pub async fn save(dir: &Path, original_name: &str, data: &[u8]) -> Result<String> {
    fs::create_dir_all(dir).await?;

    let stamp = chrono::Utc::now().timestamp_millis();
    let clean = sanitize_file_name(original_name);
    let mut name = format!("{}-{}", stamp, clean);

    let mut file = match create_new(&dir.join(&name)).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            // Same name within the same millisecond
            let short = Uuid::new_v4().simple().to_string();
            name = format!("{}-{}-{}", stamp, &short[..8], clean);
            create_new(&dir.join(&name)).await?
        }
        Err(e) => return Err(e.into()),
    };

    file.write_all(data).await?;
    file.flush().await?;

    info!("Stored upload {} ({} bytes)", name, data.len());
    Ok(name)
}

pub fn public_url(file_name: &str) -> String {
    format!("{}/{}", PUBLIC_PREFIX, file_name)
}

/// Best-effort removal of a stored upload, used when the database update
/// that should reference it fails.
pub async fn discard(dir: &Path, file_name: &str) {
    let path: PathBuf = dir.join(file_name);
    if let Err(e) = fs::remove_file(&path).await {
        warn!("Failed to remove orphaned upload {}: {}", path.display(), e);
    }
}

async fn create_new(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new().write(true).create_new(true).open(path).await
}

/// Reduce a client-supplied name to a safe single path component.
pub fn sanitize_file_name(original: &str) -> String {
    // Clients may send full paths; keep only the last component.
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    let cleaned: String = cleaned.chars().take(MAX_NAME_LEN).collect();

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
