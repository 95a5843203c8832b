// Source trait for measurement file access
use crate::domain::channel::ChannelInfo;
use crate::domain::timestamp::Timestamp;
use async_trait::async_trait;

/// Which groups of a file hold time axes and which hold data channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLayout {
    pub timestamp_group: String,
    /// `None` reads data channels from every group except the timestamp group.
    pub data_group: Option<String>,
}

impl Default for SourceLayout {
    fn default() -> Self {
        Self {
            timestamp_group: "TimeStamps".to_string(),
            data_group: Some("RTAC Data".to_string()),
        }
    }
}

impl SourceLayout {
    pub fn is_data_group(&self, group: &str) -> bool {
        match &self.data_group {
            Some(data_group) => data_group == group,
            None => group != self.timestamp_group,
        }
    }
}

#[async_trait]
pub trait ChannelSource: Send + Sync {
    /// List all file ids this source can read
    async fn list_files(&self) -> anyhow::Result<Vec<String>>;

    /// Group names of a file, in file order
    async fn list_groups(&self, file: &str) -> anyhow::Result<Vec<String>>;

    /// Channels of one group, in file order
    async fn list_channels(&self, file: &str, group: &str) -> anyhow::Result<Vec<ChannelInfo>>;

    /// Samples of a data channel
    async fn read_samples(&self, file: &str, channel: &str) -> anyhow::Result<Vec<f64>>;

    /// Timestamps of a time axis
    async fn read_timestamps(&self, file: &str, axis: &str) -> anyhow::Result<Vec<Timestamp>>;
}
