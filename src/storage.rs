//! Avatar file storage on local disk.
//!
//! Uploaded avatars land in the configured upload directory and are served
//! statically from `/uploads`; the database stores only the public path.

use std::path::Path;

use chrono::Utc;

/// Map an accepted image content type to a file extension. Anything else is
/// rejected, which the caller treats as "no avatar uploaded".
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Write avatar bytes under the upload dir and return the public path to
/// store as the user's avatar reference.
///
/// Filenames embed the owner and upload time, so a re-upload never
/// overwrites the previous file and the paths are immutable.
pub async fn store_avatar(
    upload_dir: &Path,
    user_id: i64,
    extension: &str,
    data: &[u8],
) -> Result<String, std::io::Error> {
    let filename = format!("user_{}_{}.{}", user_id, Utc::now().timestamp_millis(), extension);
    let full_path = upload_dir.join(&filename);

    if let Some(parent) = full_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&full_path, data).await?;

    Ok(format!("/uploads/{}", filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_mapping() {
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for("image/webp"), Some("webp"));
        assert_eq!(extension_for("application/pdf"), None);
        assert_eq!(extension_for("video/mp4"), None);
    }

    #[tokio::test]
    async fn test_store_avatar_writes_file_and_returns_public_path() {
        let dir = std::env::temp_dir().join(format!(
            "warbler-storage-test-{}",
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));

        let public = store_avatar(&dir, 7, "png", b"not-really-a-png")
            .await
            .expect("store");
        assert!(public.starts_with("/uploads/user_7_"));
        assert!(public.ends_with(".png"));

        let on_disk = dir.join(public.trim_start_matches("/uploads/"));
        let contents = tokio::fs::read(&on_disk).await.expect("read back");
        assert_eq!(contents, b"not-really-a-png");

        tokio::fs::remove_dir_all(&dir).await.expect("cleanup");
    }
}
