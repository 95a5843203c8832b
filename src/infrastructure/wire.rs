// Mapper to convert domain models to JSON wire types
use crate::application::streaming_service::StreamMessage;
use crate::application::view_registry::ViewHandle;
use crate::application::view_service::ViewSummary;
use crate::domain::channel::{AxisSide, Trace};
use crate::domain::decimate::{DecimatedPoint, DecimatedSeries};
use crate::domain::timestamp::{TimeRange, Timestamp};
use crate::infrastructure::config::TimestampFormat;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WireTimestamp {
    Iso(String),
    EpochMs(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointDto {
    pub timestamp: WireTimestamp,
    /// `null` marks a gap in the line.
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesDto {
    pub channel: String,
    pub source_rows: usize,
    pub points: Vec<PointDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceDto {
    pub channel: String,
    pub side: SideDto,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SideDto {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceSeriesDto {
    pub trace: TraceDto,
    pub series: SeriesDto,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSummaryDto {
    pub handle: ViewHandle,
    pub files: Vec<String>,
    pub traces: Vec<TraceDto>,
    pub missing_channels: Vec<String>,
    pub rows: usize,
    pub start: Option<WireTimestamp>,
    pub end: Option<WireTimestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessageDto {
    Skeleton {
        handle: ViewHandle,
        traces: Vec<TraceDto>,
        start: Option<WireTimestamp>,
        end: Option<WireTimestamp>,
        budget: usize,
    },
    Series {
        trace: TraceDto,
        series: SeriesDto,
    },
    Complete {
        delivered: usize,
        duration_ms: i64,
    },
}

pub fn timestamp_to_wire(timestamp: Timestamp, format: TimestampFormat) -> WireTimestamp {
    match format {
        TimestampFormat::Iso8601 => WireTimestamp::Iso(timestamp.to_rfc3339()),
        TimestampFormat::EpochMs => WireTimestamp::EpochMs(timestamp.epoch_millis()),
    }
}

fn range_to_wire(
    range: Option<TimeRange>,
    format: TimestampFormat,
) -> (Option<WireTimestamp>, Option<WireTimestamp>) {
    match range {
        Some(r) => (
            Some(timestamp_to_wire(r.start, format)),
            Some(timestamp_to_wire(r.end, format)),
        ),
        None => (None, None),
    }
}

pub fn trace_to_wire(trace: Trace) -> TraceDto {
    let side = match trace.side {
        AxisSide::Primary => SideDto::Primary,
        AxisSide::Secondary => SideDto::Secondary,
    };
    TraceDto {
        channel: trace.channel,
        side,
    }
}

fn point_to_wire(point: DecimatedPoint, format: TimestampFormat) -> PointDto {
    PointDto {
        timestamp: timestamp_to_wire(point.timestamp, format),
        value: point.value.filter(|v| v.is_finite()),
    }
}

pub fn series_to_wire(series: DecimatedSeries, format: TimestampFormat) -> SeriesDto {
    SeriesDto {
        channel: series.channel,
        source_rows: series.source_rows,
        points: series
            .points
            .into_iter()
            .map(|p| point_to_wire(p, format))
            .collect(),
    }
}

pub fn traces_to_wire(
    traces: Vec<(Trace, DecimatedSeries)>,
    format: TimestampFormat,
) -> Vec<TraceSeriesDto> {
    traces
        .into_iter()
        .map(|(trace, series)| TraceSeriesDto {
            trace: trace_to_wire(trace),
            series: series_to_wire(series, format),
        })
        .collect()
}

pub fn summary_to_wire(summary: ViewSummary, format: TimestampFormat) -> ViewSummaryDto {
    let (start, end) = range_to_wire(summary.span, format);
    ViewSummaryDto {
        handle: summary.handle,
        files: summary.files,
        traces: summary.traces.into_iter().map(trace_to_wire).collect(),
        missing_channels: summary.missing_channels,
        rows: summary.rows,
        start,
        end,
    }
}

pub fn message_to_wire(message: StreamMessage, format: TimestampFormat) -> StreamMessageDto {
    match message {
        StreamMessage::Skeleton {
            handle,
            traces,
            range,
            budget,
        } => {
            let (start, end) = range_to_wire(range, format);
            StreamMessageDto::Skeleton {
                handle,
                traces: traces.into_iter().map(trace_to_wire).collect(),
                start,
                end,
                budget,
            }
        }
        StreamMessage::Series { trace, series } => StreamMessageDto::Series {
            trace: trace_to_wire(trace),
            series: series_to_wire(series, format),
        },
        StreamMessage::Complete {
            delivered,
            duration_ms,
        } => StreamMessageDto::Complete {
            delivered,
            duration_ms,
        },
    }
}
