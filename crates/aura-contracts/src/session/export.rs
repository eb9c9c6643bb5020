//! Storyboard export: a markdown document plus the decoded scene images.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::storyboard::Scene;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Splits a `data:<mime>;base64,<payload>` URL.
pub fn decode_data_url(url: &str) -> Result<DecodedImage> {
    let rest = url
        .strip_prefix("data:")
        .context("image url is not a data url")?;
    let (header, payload) = rest
        .split_once(',')
        .context("data url is missing its payload")?;
    let mime_type = header
        .strip_suffix(";base64")
        .context("data url is not base64 encoded")?;
    let bytes = BASE64
        .decode(payload.trim().as_bytes())
        .context("data url base64 decode failed")?;
    Ok(DecodedImage {
        mime_type: if mime_type.is_empty() {
            "image/png".to_string()
        } else {
            mime_type.to_string()
        },
        bytes,
    })
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime.trim().to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

#[derive(Debug, Clone)]
pub struct StoryboardExport {
    pub document: PathBuf,
    pub images: Vec<PathBuf>,
}

/// Writes `storyboard.md` and one `scene-NN.<ext>` per illustrated scene.
/// Scenes still generating are skipped.
pub fn export_storyboard(out_dir: &Path, scenes: &[Scene]) -> Result<StoryboardExport> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let mut doc = String::from("# Storyboard\n");
    let mut images = Vec::new();
    let finished = scenes.iter().filter(|scene| !scene.is_generating);
    for (idx, scene) in finished.enumerate() {
        let number = idx + 1;
        let _ = write!(doc, "\n## {number:02}. {}\n\n", scene.title);
        let _ = write!(doc, "{}\n\n", scene.description);
        for line in scene.dialogue.lines() {
            let _ = writeln!(doc, "> {line}");
        }
        if let Some(url) = scene.image_url.as_deref() {
            let image = decode_data_url(url)
                .with_context(|| format!("scene {} has an unreadable image", scene.id))?;
            let file_name = format!("scene-{number:02}.{}", extension_for_mime(&image.mime_type));
            let path = out_dir.join(&file_name);
            std::fs::write(&path, &image.bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
            let _ = write!(doc, "\n![{}]({file_name})\n", scene.title);
            images.push(path);
        }
    }

    let document = out_dir.join("storyboard.md");
    std::fs::write(&document, doc)
        .with_context(|| format!("failed to write {}", document.display()))?;
    Ok(StoryboardExport { document, images })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storyboard::{Scene, SceneDraft, SceneId};

    fn finished_scene(title: &str, image_url: Option<String>) -> Scene {
        Scene::placeholder(SceneId::generate())
            .with_draft(&SceneDraft {
                title: title.to_string(),
                description: format!("{title} description"),
                dialogue: "A: 你好\nB: 再见".to_string(),
            })
            .finished(image_url)
    }

    #[test]
    fn decode_data_url_reads_mime_and_bytes() -> Result<()> {
        let url = format!("data:image/jpeg;base64,{}", BASE64.encode(b"jpeg-bytes"));
        let decoded = decode_data_url(&url)?;
        assert_eq!(decoded.mime_type, "image/jpeg");
        assert_eq!(decoded.bytes, b"jpeg-bytes");

        assert!(decode_data_url("https://example.com/a.png").is_err());
        assert!(decode_data_url("data:image/png,plain").is_err());
        Ok(())
    }

    #[test]
    fn export_writes_document_and_images() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let url = format!("data:image/png;base64,{}", BASE64.encode(b"png-bytes"));
        let scenes = vec![
            finished_scene("第一幕", Some(url)),
            Scene::placeholder(SceneId::generate()),
            finished_scene("第二幕", None),
        ];

        let export = export_storyboard(temp.path(), &scenes)?;
        let doc = std::fs::read_to_string(&export.document)?;
        assert!(doc.contains("## 01. 第一幕"));
        assert!(doc.contains("## 02. 第二幕"));
        assert!(doc.contains("> A: 你好"));
        assert!(doc.contains("![第一幕](scene-01.png)"));
        assert!(!doc.contains("正在构思场景"));

        assert_eq!(export.images.len(), 1);
        assert_eq!(std::fs::read(&export.images[0])?, b"png-bytes");
        Ok(())
    }
}
