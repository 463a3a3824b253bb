//! Stage snapshots for postmortem debugging
//!
//! Every capture is best-effort: a failed screenshot is logged and skipped,
//! it never fails the order.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::driver::Driver;

/// One captured screenshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub label: String,
    /// PNG bytes, base64 in JSON
    #[serde(with = "base64_bytes")]
    pub image: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

/// Collects snapshots for one order
#[derive(Debug, Default)]
pub struct Recorder {
    records: Vec<SnapshotRecord>,
    screenshot_dir: Option<PathBuf>,
    page_state_limit: usize,
}

impl Recorder {
    pub fn new(screenshot_dir: Option<PathBuf>, page_state_limit: usize) -> Self {
        Self {
            records: Vec::new(),
            screenshot_dir,
            page_state_limit,
        }
    }

    /// Screenshot the page and append it under `label`
    pub async fn capture(&mut self, driver: &dyn Driver, label: &str) {
        let image = match driver.screenshot().await {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(label, error = %e, "snapshot capture failed");
                return;
            }
        };

        let record = SnapshotRecord {
            label: label.to_string(),
            image,
            timestamp: Utc::now(),
        };
        self.persist(&record);
        tracing::debug!(label, bytes = record.image.len(), "captured snapshot");
        self.records.push(record);
    }

    /// Final capture after an abort: screenshot plus truncated page HTML
    pub async fn capture_failure(&mut self, driver: &dyn Driver, label: &str) -> Option<String> {
        self.capture(driver, label).await;

        match driver.page_html().await {
            Ok(html) => Some(truncate_chars(&html, self.page_state_limit)),
            Err(e) => {
                tracing::warn!(label, error = %e, "page state capture failed");
                None
            }
        }
    }

    pub fn records(&self) -> &[SnapshotRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<SnapshotRecord> {
        self.records
    }

    fn persist(&self, record: &SnapshotRecord) {
        let Some(dir) = &self.screenshot_dir else {
            return;
        };
        let filename = dir.join(format!(
            "{}_{}.png",
            sanitize_label(&record.label),
            record.timestamp.timestamp_millis()
        ));
        let written = std::fs::create_dir_all(dir)
            .and_then(|_| std::fs::write(&filename, &record.image));
        if let Err(e) = written {
            tracing::warn!(path = %filename.display(), error = %e, "could not write snapshot");
        }
    }
}

fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}
