// Streaming relayout service - Progressive re-decimation of every trace in a view
use crate::application::view_registry::ViewHandle;
use crate::application::view_service::{ViewError, ViewService};
use crate::domain::channel::Trace;
use crate::domain::decimate::{decimate, DecimatedSeries, DecimationRequest};
use crate::domain::error::DecimateError;
use crate::domain::timestamp::TimeRange;
use std::time::Instant;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    /// Sent first so the client can lay out every trace before data arrives.
    Skeleton {
        handle: ViewHandle,
        traces: Vec<Trace>,
        range: Option<TimeRange>,
        budget: usize,
    },
    Series {
        trace: Trace,
        series: DecimatedSeries,
    },
    Complete {
        delivered: usize,
        duration_ms: i64,
    },
}

#[derive(Clone)]
pub struct StreamingViewService {
    views: ViewService,
}

impl StreamingViewService {
    pub fn new(views: ViewService) -> Self {
        Self { views }
    }

    /// Re-decimate all traces of a view for a new visible range, one task per trace.
    ///
    /// Messages arrive as skeleton, then one `Series` per trace in completion order,
    /// then `Complete` once every trace task has finished.
    pub async fn stream_relayout(
        &self,
        handle: ViewHandle,
        range: Option<TimeRange>,
        budget: Option<usize>,
    ) -> Result<mpsc::Receiver<StreamMessage>, ViewError> {
        let view = self.views.view(handle).await?;
        let budget = self.views.limits().resolve(budget);

        // Reject bad arguments up front instead of failing every trace.
        if budget == 0 {
            return Err(DecimateError::ZeroBudget.into());
        }
        if let Some(range) = range.filter(TimeRange::is_inverted) {
            return Err(DecimateError::InvalidRange {
                start: range.start,
                end: range.end,
            }
            .into());
        }

        let (tx, rx) = mpsc::channel(100);
        let start_time = Instant::now();

        let skeleton = StreamMessage::Skeleton {
            handle,
            traces: view.traces.clone(),
            range,
            budget,
        };
        let _ = tx.send(skeleton).await;

        let mut tasks = Vec::with_capacity(view.traces.len());
        for trace in view.traces.iter().cloned() {
            let tx = tx.clone();
            let view = view.clone();

            tasks.push(tokio::spawn(async move {
                let request = DecimationRequest::new(trace.channel.as_str(), budget).with_range(range);
                match tokio::task::spawn_blocking(move || decimate(&view.table, &request)).await {
                    Ok(Ok(series)) => {
                        tracing::debug!(
                            "Streaming {} ({} of {} rows)",
                            trace.channel,
                            series.points.len(),
                            series.source_rows
                        );
                        tx.send(StreamMessage::Series { trace, series }).await.is_ok()
                    }
                    Ok(Err(e)) => {
                        tracing::warn!("Skipping trace {}: {}", trace.channel, e);
                        false
                    }
                    Err(e) => {
                        tracing::error!("Decimation task for {} failed: {}", trace.channel, e);
                        false
                    }
                }
            }));
        }

        tokio::spawn(async move {
            let delivered = futures::future::join_all(tasks)
                .await
                .into_iter()
                .filter(|sent| matches!(sent, Ok(true)))
                .count();

            let duration_ms = start_time.elapsed().as_millis() as i64;
            tracing::debug!("Relayout of view {} streamed {} traces in {}ms", handle, delivered, duration_ms);
            let _ = tx
                .send(StreamMessage::Complete {
                    delivered,
                    duration_ms,
                })
                .await;
        });

        Ok(rx)
    }
}
