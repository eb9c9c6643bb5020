use std::io::Cursor;

use anyhow::{Context, Result};
use async_trait::async_trait;
use aura_contracts::storyboard::{ChatTurn, Role};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::json;
use sha2::{Digest, Sha256};

use super::{truncate_text, AiGateway};

const DRYRUN_IMAGE_WIDTH: u32 = 64;
const DRYRUN_IMAGE_HEIGHT: u32 = 36;

const SETTINGS: &[&str] = &["空旷的黑匣子剧场", "雨夜的旧码头", "烛光摇曳的阁楼", "黎明前的城墙"];

/// Offline gateway: deterministic content derived from the prompt text.
#[derive(Debug, Default)]
pub struct DryrunGateway;

impl DryrunGateway {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AiGateway for DryrunGateway {
    fn name(&self) -> &str {
        "dryrun"
    }

    async fn generate_structured_scene(&self, prompt_hint: &str) -> Result<String> {
        let digest = digest(prompt_hint);
        let setting = SETTINGS[digest[0] as usize % SETTINGS.len()];
        let hint = truncate_text(prompt_hint.trim(), 24);
        let payload = json!({
            "title": format!("{setting}·{hint}"),
            "description": format!("{setting}，一束追光落在舞台中央，{hint}。"),
            "dialogue": format!("甲：你听见了吗？\n乙：{hint}，一切都从今晚开始。"),
        });
        Ok(payload.to_string())
    }

    async fn generate_image(&self, prompt: &str) -> Result<Option<String>> {
        let bytes = solid_png(prompt)?;
        Ok(Some(format!(
            "data:image/png;base64,{}",
            BASE64.encode(bytes)
        )))
    }

    async fn converse(&self, history: &[ChatTurn], message: &str) -> Result<String> {
        let turn = history
            .iter()
            .filter(|entry| entry.role == Role::User)
            .count()
            + 1;
        Ok(format!(
            "（离线模式）第 {turn} 轮：我收到了「{}」。",
            truncate_text(message.trim(), 40)
        ))
    }
}

fn digest(text: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.finalize().into()
}

fn solid_png(prompt: &str) -> Result<Vec<u8>> {
    let digest = digest(prompt);
    let image = RgbImage::from_pixel(
        DRYRUN_IMAGE_WIDTH,
        DRYRUN_IMAGE_HEIGHT,
        Rgb([digest[0], digest[1], digest[2]]),
    );
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut buffer, ImageFormat::Png)
        .context("failed to encode dryrun image")?;
    Ok(buffer.into_inner())
}
