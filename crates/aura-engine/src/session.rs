use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use aura_contracts::events::{now_utc_iso, EventLog, StudioEvent};
use aura_contracts::session::export::{export_storyboard, StoryboardExport};
use aura_contracts::session::summary::{write_summary, SessionSummary};
use aura_contracts::storyboard::Scene;
use chrono::Utc;
use serde_json::{Map, Value};

use crate::studio::StudioStats;

/// On-disk artifacts of one studio session: the event log, the closing
/// summary and storyboard exports.
#[derive(Debug)]
pub struct StudioSession {
    out_dir: PathBuf,
    session_id: String,
    events: EventLog,
    summary_path: PathBuf,
    started_at: String,
}

impl StudioSession {
    pub fn open(out_dir: impl Into<PathBuf>, events_path: Option<PathBuf>) -> Result<Self> {
        let out_dir = out_dir.into();
        std::fs::create_dir_all(&out_dir)
            .with_context(|| format!("failed to create session dir {}", out_dir.display()))?;
        let session_id = Utc::now().format("session-%Y%m%dT%H%M%S").to_string();
        let events_path = events_path.unwrap_or_else(|| out_dir.join("events.jsonl"));
        let events = EventLog::open(events_path, session_id.clone())?;
        let summary_path = out_dir.join("summary.json");
        let started_at = now_utc_iso();

        events.record(&StudioEvent::SessionStarted {
            out_dir: out_dir.to_string_lossy().to_string(),
        })?;

        Ok(Self {
            out_dir,
            session_id,
            events,
            summary_path,
            started_at,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Shared handle on the session's open event log.
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Writes `storyboard.md` and scene images into `dir`, or the session
    /// directory when `dir` is `None`.
    pub fn export(&self, dir: Option<&Path>, scenes: &[Scene]) -> Result<StoryboardExport> {
        let target = dir.unwrap_or(&self.out_dir);
        let export = export_storyboard(target, scenes)?;
        self.events.record(&StudioEvent::StoryboardExported {
            document: export.document.to_string_lossy().to_string(),
            images: export.images.len(),
        })?;
        Ok(export)
    }

    pub fn finish(&self, stats: StudioStats, gateway: &str) -> Result<PathBuf> {
        let summary = SessionSummary {
            session_id: self.session_id.clone(),
            started_at: self.started_at.clone(),
            finished_at: now_utc_iso(),
            total_messages: stats.messages,
            total_scenes: stats.scenes,
            failed_scenes: stats.failed_scenes,
        };
        let mut extra = Map::new();
        extra.insert("gateway".to_string(), Value::String(gateway.to_string()));
        write_summary(&self.summary_path, &summary, Some(&extra))?;
        self.events.record(&StudioEvent::SessionFinished {
            summary_path: self.summary_path.to_string_lossy().to_string(),
        })?;
        Ok(self.summary_path.clone())
    }
}
