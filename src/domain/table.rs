// Time-keyed tables with nullable channel columns
use super::timestamp::{TimeRange, Timestamp};
use std::collections::HashMap;

/// Channel values, one per `datetime` row; `None` where the channel has no sample.
pub type Column = Vec<Option<f64>>;

/// Ordered, time-keyed tabular data with typed nulls.
///
/// Implementations keep `datetime` sorted ascending and every column the same
/// length as `datetime`.
pub trait TimeTable {
    fn datetime(&self) -> &[Timestamp];

    /// Column names in table order.
    fn channels(&self) -> &[String];

    fn column(&self, channel: &str) -> Option<&[Option<f64>]>;

    fn row_count(&self) -> usize {
        self.datetime().len()
    }

    fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    fn span(&self) -> Option<TimeRange> {
        let datetime = self.datetime();
        Some(TimeRange::new(*datetime.first()?, *datetime.last()?))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Frame {
    datetime: Vec<Timestamp>,
    channels: Vec<String>,
    columns: HashMap<String, Column>,
}

impl Frame {
    fn new(datetime: Vec<Timestamp>, columns: Vec<(String, Column)>) -> Self {
        let mut frame = Self {
            datetime,
            channels: Vec::with_capacity(columns.len()),
            columns: HashMap::with_capacity(columns.len()),
        };
        for (name, column) in columns {
            debug_assert_eq!(column.len(), frame.datetime.len());
            if frame.columns.insert(name.clone(), column).is_none() {
                frame.channels.push(name);
            }
        }
        frame
    }

    fn column(&self, channel: &str) -> Option<&[Option<f64>]> {
        self.columns.get(channel).map(Vec::as_slice)
    }
}

/// One file's channels joined onto a single duplicate-free `datetime` column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignedTable(Frame);

impl AlignedTable {
    pub(super) fn new(datetime: Vec<Timestamp>, columns: Vec<(String, Column)>) -> Self {
        debug_assert!(datetime.windows(2).all(|w| w[0] < w[1]));
        Self(Frame::new(datetime, columns))
    }
}

impl TimeTable for AlignedTable {
    fn datetime(&self) -> &[Timestamp] {
        &self.0.datetime
    }

    fn channels(&self) -> &[String] {
        &self.0.channels
    }

    fn column(&self, channel: &str) -> Option<&[Option<f64>]> {
        self.0.column(channel)
    }
}

/// Rows of every file in one table, sorted by `datetime`; timestamps may repeat.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedTable(Frame);

impl MergedTable {
    pub(super) fn new(datetime: Vec<Timestamp>, columns: Vec<(String, Column)>) -> Self {
        debug_assert!(datetime.windows(2).all(|w| w[0] <= w[1]));
        Self(Frame::new(datetime, columns))
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl TimeTable for MergedTable {
    fn datetime(&self) -> &[Timestamp] {
        &self.0.datetime
    }

    fn channels(&self) -> &[String] {
        &self.0.channels
    }

    fn column(&self, channel: &str) -> Option<&[Option<f64>]> {
        self.0.column(channel)
    }
}
