// View service - Builds merged views from files and decimates them for rendering
use crate::application::channel_source::{ChannelSource, SourceLayout};
use crate::application::view_registry::{View, ViewHandle, ViewRegistry};
use crate::domain::align::align;
use crate::domain::channel::{ChannelData, ChannelInfo, ChannelSelection, FileChannels, Trace};
use crate::domain::decimate::{decimate, DecimatedSeries, DecimationRequest};
use crate::domain::error::{AlignError, DecimateError, MergeError};
use crate::domain::merge::merge;
use crate::domain::table::TimeTable;
use crate::domain::timestamp::TimeRange;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("unknown file {0}")]
    UnknownFile(String),
    #[error("unknown or expired view {0}")]
    UnknownView(ViewHandle),
    #[error("view build for session {0} was superseded by a newer request")]
    Superseded(String),
    #[error("failed to align {file}: {source}")]
    Align {
        file: String,
        #[source]
        source: AlignError,
    },
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error(transparent)]
    Decimate(#[from] DecimateError),
    #[error("channel source failed: {0:#}")]
    Source(#[from] anyhow::Error),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Budget bounds applied to every decimation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetLimits {
    pub default_budget: usize,
    pub max_budget: usize,
}

impl Default for BudgetLimits {
    fn default() -> Self {
        Self {
            default_budget: 3000,
            max_budget: 20_000,
        }
    }
}

impl BudgetLimits {
    pub fn resolve(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_budget).min(self.max_budget)
    }
}

/// What a caller needs to render a freshly built view.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSummary {
    pub handle: ViewHandle,
    pub files: Vec<String>,
    pub traces: Vec<Trace>,
    pub missing_channels: Vec<String>,
    pub rows: usize,
    pub span: Option<TimeRange>,
}

impl From<&View> for ViewSummary {
    fn from(view: &View) -> Self {
        Self {
            handle: view.handle,
            files: view.files.clone(),
            traces: view.traces.clone(),
            missing_channels: view.missing_channels.clone(),
            rows: view.table.row_count(),
            span: view.table.span(),
        }
    }
}

#[derive(Clone)]
pub struct ViewService {
    source: Arc<dyn ChannelSource>,
    registry: Arc<ViewRegistry>,
    layout: SourceLayout,
    limits: BudgetLimits,
}

impl ViewService {
    pub fn new(
        source: Arc<dyn ChannelSource>,
        registry: Arc<ViewRegistry>,
        layout: SourceLayout,
        limits: BudgetLimits,
    ) -> Self {
        Self {
            source,
            registry,
            layout,
            limits,
        }
    }

    pub fn limits(&self) -> BudgetLimits {
        self.limits
    }

    pub async fn list_files(&self) -> Result<Vec<String>, ViewError> {
        Ok(self.source.list_files().await?)
    }

    /// Sorted, de-duplicated data channel names across `files`.
    pub async fn discover_channels(&self, files: &[String]) -> Result<Vec<String>, ViewError> {
        self.ensure_known(files).await?;

        let mut names = BTreeSet::new();
        for file in files {
            names.extend(self.data_channels(file).await?.into_iter().map(|c| c.name));
        }
        tracing::info!("Discovered {} channels in {} files", names.len(), files.len());

        Ok(names.into_iter().collect())
    }

    /// Align every file, merge them and register the result under `session`.
    ///
    /// Any per-file failure fails the whole build. No files or no channels yields an
    /// empty view. A newer build for the same session makes this one return
    /// [`ViewError::Superseded`]; it checks between files and again before committing.
    pub async fn build_view(
        &self,
        session: &str,
        files: &[String],
        selection: &ChannelSelection,
    ) -> Result<ViewSummary, ViewError> {
        let ticket = self.registry.begin_build(session).await;
        tracing::info!(
            "Building view for session {}: {} files, {} primary, {} secondary channels",
            session,
            files.len(),
            selection.primary.len(),
            selection.secondary.len()
        );

        let selected = selection.channel_names();
        let mut tables = Vec::with_capacity(files.len());

        if !selection.is_empty() && !files.is_empty() {
            self.ensure_known(files).await?;

            for file in files {
                if !self.registry.is_current(&ticket).await {
                    tracing::debug!("Abandoning stale build for session {} before {}", session, file);
                    return Err(ViewError::Superseded(session.to_string()));
                }

                let channels = self.read_file(file, &selected).await?;
                let wanted = selected.clone();
                let table = tokio::task::spawn_blocking(move || align(&channels, &wanted))
                    .await?
                    .map_err(|source| ViewError::Align {
                        file: file.clone(),
                        source,
                    })?;

                tracing::debug!(
                    "Aligned {}: {} rows, {} channels",
                    file,
                    table.row_count(),
                    table.channels().len()
                );
                tables.push(table);
            }
        }

        let table = tokio::task::spawn_blocking(move || merge(&tables)).await??;

        let present: HashSet<&str> = table.channels().iter().map(String::as_str).collect();
        let missing_channels: Vec<String> = selected
            .iter()
            .filter(|name| !present.contains(name.as_str()))
            .cloned()
            .collect();
        if !missing_channels.is_empty() && !files.is_empty() {
            tracing::warn!("Channels not found in any file: {:?}", missing_channels);
        }
        let traces = selection
            .traces()
            .into_iter()
            .filter(|t| present.contains(t.channel.as_str()))
            .collect();

        let rows = table.row_count();
        let view = self
            .registry
            .commit(ticket, files.to_vec(), traces, missing_channels, table)
            .await
            .ok_or_else(|| ViewError::Superseded(session.to_string()))?;

        tracing::info!("Session {} now shows view {} ({} rows)", session, view.handle, rows);
        Ok(ViewSummary::from(view.as_ref()))
    }

    pub async fn summary(&self, handle: ViewHandle) -> Result<ViewSummary, ViewError> {
        Ok(ViewSummary::from(self.view(handle).await?.as_ref()))
    }

    /// Decimate one channel of a built view; only rows inside `range` are scanned.
    pub async fn decimate(
        &self,
        handle: ViewHandle,
        channel: &str,
        range: Option<TimeRange>,
        budget: Option<usize>,
        buckets: Option<usize>,
    ) -> Result<DecimatedSeries, ViewError> {
        let view = self.view(handle).await?;
        let request = DecimationRequest::new(channel, self.limits.resolve(budget))
            .with_range(range)
            .with_buckets(buckets);

        let series =
            tokio::task::spawn_blocking(move || decimate(&view.table, &request)).await??;
        if series.is_reduced() {
            tracing::debug!(
                "Decimated {} of view {}: {} -> {} points",
                channel,
                handle,
                series.source_rows,
                series.points.len()
            );
        }

        Ok(series)
    }

    /// Re-decimate every trace of a view for a new visible range.
    pub async fn relayout(
        &self,
        handle: ViewHandle,
        range: Option<TimeRange>,
        budget: Option<usize>,
    ) -> Result<Vec<(Trace, DecimatedSeries)>, ViewError> {
        let view = self.view(handle).await?;
        let budget = self.limits.resolve(budget);

        tokio::task::spawn_blocking(move || {
            view.traces
                .iter()
                .map(|trace| {
                    let request =
                        DecimationRequest::new(trace.channel.as_str(), budget).with_range(range);
                    Ok((trace.clone(), decimate(&view.table, &request)?))
                })
                .collect::<Result<Vec<_>, ViewError>>()
        })
        .await?
    }

    pub async fn close_session(&self, session: &str) -> bool {
        let closed = self.registry.close_session(session).await;
        tracing::info!(
            "Closed session {} ({} active)",
            session,
            self.registry.active_sessions().await
        );
        closed
    }

    pub async fn view(&self, handle: ViewHandle) -> Result<Arc<View>, ViewError> {
        self.registry
            .get(handle)
            .await
            .ok_or(ViewError::UnknownView(handle))
    }

    async fn ensure_known(&self, files: &[String]) -> Result<(), ViewError> {
        let known: HashSet<String> = self.source.list_files().await?.into_iter().collect();
        match files.iter().find(|f| !known.contains(*f)) {
            Some(unknown) => Err(ViewError::UnknownFile(unknown.clone())),
            None => Ok(()),
        }
    }

    /// Data channels of a file; the first group wins when a name repeats.
    async fn data_channels(&self, file: &str) -> Result<Vec<ChannelInfo>, ViewError> {
        let mut seen = HashSet::new();
        let mut channels = Vec::new();

        for group in self.source.list_groups(file).await? {
            if !self.layout.is_data_group(&group) {
                continue;
            }
            for channel in self.source.list_channels(file, &group).await? {
                if seen.insert(channel.name.clone()) {
                    channels.push(channel);
                }
            }
        }

        Ok(channels)
    }

    /// Read every time axis of one file plus its selected channels. Channels whose
    /// axis cannot be resolved are passed on without samples so the aligner reports them.
    async fn read_file(
        &self,
        file: &str,
        selected: &BTreeSet<String>,
    ) -> Result<FileChannels, ViewError> {
        let mut data = FileChannels::default();

        let groups = self.source.list_groups(file).await?;
        if groups.contains(&self.layout.timestamp_group) {
            for axis in self
                .source
                .list_channels(file, &self.layout.timestamp_group)
                .await?
            {
                let timestamps = self.source.read_timestamps(file, &axis.name).await?;
                data.axes.insert(axis.name, timestamps);
            }
        }

        for info in self.data_channels(file).await? {
            if !selected.contains(&info.name) {
                continue;
            }

            let axis = info.axis_name();
            let samples = match &axis {
                Some(axis) if data.axes.contains_key(axis) => {
                    self.source.read_samples(file, &info.name).await?
                }
                _ => Vec::new(),
            };

            data.channels.push(ChannelData::new(info.name, axis, samples));
        }

        tracing::debug!(
            "Read {} channels on {} axes from {}",
            data.channels.len(),
            data.axes.len(),
            file
        );
        Ok(data)
    }
}
