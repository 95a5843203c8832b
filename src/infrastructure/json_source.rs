// JSON measurement file source
use crate::application::channel_source::{ChannelSource, SourceLayout};
use crate::domain::channel::ChannelInfo;
use crate::domain::timestamp::Timestamp;
use crate::infrastructure::config::SourceSettings;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;

#[derive(Debug, Deserialize)]
struct MeasurementFile {
    groups: Vec<GroupRecord>,
}

#[derive(Debug, Deserialize)]
struct GroupRecord {
    name: String,
    #[serde(default)]
    channels: Vec<ChannelRecord>,
}

#[derive(Debug, Deserialize)]
struct ChannelRecord {
    name: String,
    #[serde(default)]
    properties: HashMap<String, serde_json::Value>,
    #[serde(default)]
    samples: Vec<f64>,
    #[serde(default)]
    timestamps: Vec<DateTime<Utc>>,
}

/// On-disk identity of a parsed file; any change forces a re-read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

#[derive(Debug)]
struct CachedFile {
    stamp: FileStamp,
    parsed: Arc<MeasurementFile>,
}

/// Reads `*.json` measurement files from one directory. Parsed files are cached by id
/// until the file's size or modification time changes.
#[derive(Debug)]
pub struct JsonFileSource {
    data_dir: PathBuf,
    layout: SourceLayout,
    axis_property: String,
    cache: RwLock<HashMap<String, CachedFile>>,
}

impl JsonFileSource {
    pub fn new(settings: &SourceSettings) -> Self {
        Self {
            data_dir: settings.data_dir.clone(),
            layout: SourceLayout::from(settings),
            axis_property: settings.axis_property.clone(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn path_for(&self, file: &str) -> Result<PathBuf> {
        if file.is_empty() || file.contains(['/', '\\']) || file.contains("..") {
            bail!("invalid file id {:?}", file);
        }
        Ok(self.data_dir.join(file))
    }

    async fn load(&self, file: &str) -> Result<Arc<MeasurementFile>> {
        let path = self.path_for(file)?;
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                self.cache.write().await.remove(file);
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };
        let stamp = FileStamp {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        };

        if let Some(cached) = self.cache.read().await.get(file).filter(|c| c.stamp == stamp) {
            return Ok(cached.parsed.clone());
        }

        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let parsed: MeasurementFile = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::debug!("Loaded {} ({} groups)", file, parsed.groups.len());

        let parsed = Arc::new(parsed);
        self.cache.write().await.insert(
            file.to_string(),
            CachedFile {
                stamp,
                parsed: parsed.clone(),
            },
        );
        Ok(parsed)
    }

    fn data_channel<'a>(&self, file: &'a MeasurementFile, channel: &str) -> Option<&'a ChannelRecord> {
        file.groups
            .iter()
            .filter(|g| self.layout.is_data_group(&g.name))
            .flat_map(|g| &g.channels)
            .find(|c| c.name == channel)
    }
}

#[async_trait]
impl ChannelSource for JsonFileSource {
    async fn list_files(&self) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.data_dir)
            .await
            .with_context(|| format!("Failed to list {}", self.data_dir.display()))?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") && entry.file_type().await?.is_file() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    files.push(name.to_string());
                }
            }
        }
        files.sort();

        // Files gone from the directory are never served again.
        self.cache
            .write()
            .await
            .retain(|id, _| files.binary_search(id).is_ok());

        Ok(files)
    }

    async fn list_groups(&self, file: &str) -> Result<Vec<String>> {
        let parsed = self.load(file).await?;
        Ok(parsed.groups.iter().map(|g| g.name.clone()).collect())
    }

    async fn list_channels(&self, file: &str, group: &str) -> Result<Vec<ChannelInfo>> {
        let parsed = self.load(file).await?;
        let group = parsed
            .groups
            .iter()
            .find(|g| g.name == group)
            .with_context(|| format!("No group {} in {}", group, file))?;

        Ok(group
            .channels
            .iter()
            .map(|c| {
                let axis = c
                    .properties
                    .get(&self.axis_property)
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                ChannelInfo::new(c.name.as_str(), axis)
            })
            .collect())
    }

    async fn read_samples(&self, file: &str, channel: &str) -> Result<Vec<f64>> {
        let parsed = self.load(file).await?;
        let record = self
            .data_channel(&parsed, channel)
            .with_context(|| format!("No channel {} in {}", channel, file))?;
        Ok(record.samples.clone())
    }

    async fn read_timestamps(&self, file: &str, axis: &str) -> Result<Vec<Timestamp>> {
        let parsed = self.load(file).await?;
        let record = parsed
            .groups
            .iter()
            .filter(|g| g.name == self.layout.timestamp_group)
            .flat_map(|g| &g.channels)
            .find(|c| c.name == axis)
            .with_context(|| format!("No time axis {} in {}", axis, file))?;

        record
            .timestamps
            .iter()
            .map(|t| Timestamp::from_datetime(*t).map_err(anyhow::Error::from))
            .collect()
    }
}
