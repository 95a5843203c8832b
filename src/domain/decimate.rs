// Decimation - bounded, extremum-preserving reduction of one channel over a visible range
use super::error::DecimateError;
use super::table::TimeTable;
use super::timestamp::{TimeRange, Timestamp};

#[derive(Debug, Clone, PartialEq)]
pub struct DecimationRequest {
    pub channel: String,
    /// `None` means the table's full span.
    pub range: Option<TimeRange>,
    pub budget: usize,
    /// Defaults to `budget / 2`.
    pub buckets: Option<usize>,
}

impl DecimationRequest {
    pub fn new(channel: impl Into<String>, budget: usize) -> Self {
        Self {
            channel: channel.into(),
            range: None,
            budget,
            buckets: None,
        }
    }

    pub fn with_range(mut self, range: Option<TimeRange>) -> Self {
        self.range = range;
        self
    }

    pub fn with_buckets(mut self, buckets: Option<usize>) -> Self {
        self.buckets = buckets;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecimatedPoint {
    pub timestamp: Timestamp,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecimatedSeries {
    pub channel: String,
    /// Rows of the table inside the requested range, before reduction.
    pub source_rows: usize,
    pub points: Vec<DecimatedPoint>,
}

impl DecimatedSeries {
    pub fn is_reduced(&self) -> bool {
        self.points.len() < self.source_rows
    }
}

/// Reduce `request.channel` to at most `request.budget` points.
///
/// Only rows inside the range are scanned, located by binary search on `datetime`.
/// At or below budget every row comes back unchanged, nulls included. Above budget
/// the rows are split into buckets of equal time span and each bucket contributes its
/// minimum and maximum rows in timestamp order, so spikes survive. Nulls and NaN never
/// win a bucket; a bucket with no numeric value contributes nothing.
pub fn decimate<T: TimeTable + ?Sized>(
    table: &T,
    request: &DecimationRequest,
) -> Result<DecimatedSeries, DecimateError> {
    if request.budget == 0 {
        return Err(DecimateError::ZeroBudget);
    }
    let column = table
        .column(&request.channel)
        .ok_or_else(|| DecimateError::UnknownChannel(request.channel.clone()))?;
    let buckets = bucket_count(request)?;

    let datetime = table.datetime();
    if column.len() != datetime.len() {
        return Err(DecimateError::ColumnLength {
            channel: request.channel.clone(),
            expected: datetime.len(),
            actual: column.len(),
        });
    }
    let rows = match request.range {
        Some(range) if range.is_inverted() => {
            return Err(DecimateError::InvalidRange {
                start: range.start,
                end: range.end,
            });
        }
        Some(range) => range.row_span(datetime),
        None => 0..datetime.len(),
    };
    let times = &datetime[rows.clone()];
    let values = &column[rows];

    let points = if times.len() <= request.budget {
        times
            .iter()
            .zip(values)
            .map(|(&timestamp, &value)| DecimatedPoint { timestamp, value })
            .collect()
    } else {
        min_max_buckets(times, values, buckets, request.budget > 1)
    };

    Ok(DecimatedSeries {
        channel: request.channel.clone(),
        source_rows: times.len(),
        points,
    })
}

fn bucket_count(request: &DecimationRequest) -> Result<usize, DecimateError> {
    let max = (request.budget / 2).max(1);
    match request.buckets {
        None => Ok(max),
        Some(buckets) if (1..=max).contains(&buckets) => Ok(buckets),
        Some(buckets) => Err(DecimateError::InvalidBucketCount {
            buckets,
            budget: request.budget,
            max,
        }),
    }
}

/// Bucket index for `t` when `[first, last]` is cut into `buckets` equal spans.
fn bucket_of(t: Timestamp, first: Timestamp, last: Timestamp, buckets: usize) -> usize {
    let offset = i128::from(t.as_nanos()) - i128::from(first.as_nanos());
    let width = i128::from(last.as_nanos()) - i128::from(first.as_nanos()) + 1;
    (offset * buckets as i128 / width) as usize
}

fn min_max_buckets(
    times: &[Timestamp],
    values: &[Option<f64>],
    buckets: usize,
    keep_min: bool,
) -> Vec<DecimatedPoint> {
    let (Some(&first), Some(&last)) = (times.first(), times.last()) else {
        return Vec::new();
    };

    let mut points = Vec::with_capacity(buckets * 2);
    let mut extremes = Extremes::default();
    let mut current = 0;

    for (row, (&t, value)) in times.iter().zip(values).enumerate() {
        let bucket = bucket_of(t, first, last, buckets);
        if bucket != current {
            extremes.flush(keep_min, times, values, &mut points);
            current = bucket;
        }
        if let Some(v) = value.filter(|v| !v.is_nan()) {
            extremes.observe(row, v);
        }
    }
    extremes.flush(keep_min, times, values, &mut points);

    points
}

/// Running extremes of one bucket as `(row, value)`.
/// The minimum keeps its first occurrence and the maximum its last, so a flat bucket
/// still yields both ends.
#[derive(Default)]
struct Extremes {
    min: Option<(usize, f64)>,
    max: Option<(usize, f64)>,
}

impl Extremes {
    fn observe(&mut self, row: usize, value: f64) {
        if self.min.is_none_or(|(_, min)| value < min) {
            self.min = Some((row, value));
        }
        if self.max.is_none_or(|(_, max)| value >= max) {
            self.max = Some((row, value));
        }
    }

    fn flush(
        &mut self,
        keep_min: bool,
        times: &[Timestamp],
        values: &[Option<f64>],
        out: &mut Vec<DecimatedPoint>,
    ) {
        let (min, max) = (self.min.take(), self.max.take());
        let Some((max_row, _)) = max else {
            return;
        };

        let rows = match min {
            Some((min_row, _)) if keep_min && min_row < max_row => [Some(min_row), Some(max_row)],
            Some((min_row, _)) if keep_min && min_row > max_row => [Some(max_row), Some(min_row)],
            _ => [Some(max_row), None],
        };

        for row in rows.into_iter().flatten() {
            out.push(DecimatedPoint {
                timestamp: times[row],
                value: values[row],
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::align::align;
    use crate::domain::channel::{ChannelData, FileChannels};
    use crate::domain::merge::merge;
    use crate::domain::table::MergedTable;
    use std::collections::BTreeSet;

    fn ts(n: i64) -> Timestamp {
        Timestamp::from_nanos(n)
    }

    /// Single-channel merged table `V` sampled at `t = 0, 1, 2, ...`.
    fn table_of(values: &[f64]) -> MergedTable {
        let times = (0..values.len() as i64).map(ts).collect();
        table_at(times, values)
    }

    fn table_at(times: Vec<Timestamp>, values: &[f64]) -> MergedTable {
        let file = FileChannels::default()
            .with_axis("T", times)
            .with_channel(ChannelData::new("V", Some("T".into()), values.to_vec()));
        let selected = BTreeSet::from(["V".to_string()]);
        merge(&[align(&file, &selected).unwrap()]).unwrap()
    }

    fn wave(n: usize) -> Vec<f64> {
        (0..n).map(|i| ((i as f64) / 7.0).sin() * 10.0 + (i % 13) as f64).collect()
    }

    fn value_set(series: &DecimatedSeries) -> Vec<f64> {
        series.points.iter().filter_map(|p| p.value).collect()
    }

    #[test]
    fn test_below_budget_is_lossless() {
        let table = table_of(&[3.0, 1.0, 4.0, 1.0, 5.0]);
        let series = decimate(&table, &DecimationRequest::new("V", 5)).unwrap();

        assert_eq!(series.source_rows, 5);
        assert!(!series.is_reduced());
        let expected: Vec<DecimatedPoint> = table
            .datetime()
            .iter()
            .zip(table.column("V").unwrap())
            .map(|(&timestamp, &value)| DecimatedPoint { timestamp, value })
            .collect();
        assert_eq!(series.points, expected);
    }

    #[test]
    fn test_below_budget_keeps_nulls() {
        let a = FileChannels::default()
            .with_axis("T", vec![ts(0), ts(2)])
            .with_channel(ChannelData::new("V", Some("T".into()), vec![1.0, 2.0]));
        let b = FileChannels::default()
            .with_axis("T", vec![ts(1)])
            .with_channel(ChannelData::new("W", Some("T".into()), vec![9.0]));
        let selected = BTreeSet::from(["V".to_string(), "W".to_string()]);
        let table = merge(&[align(&a, &selected).unwrap(), align(&b, &selected).unwrap()]).unwrap();

        let series = decimate(&table, &DecimationRequest::new("V", 10)).unwrap();
        let values: Vec<Option<f64>> = series.points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![Some(1.0), None, Some(2.0)]);
    }

    #[test]
    fn test_above_budget_is_bounded_and_keeps_bucket_extremes() {
        let mut values = wave(5_000);
        values[1234] = 500.0;
        values[4321] = -500.0;
        let table = table_of(&values);

        let budget = 64;
        let series = decimate(&table, &DecimationRequest::new("V", budget)).unwrap();
        assert!(series.points.len() <= budget);
        assert!(series.is_reduced());
        assert!(series.points.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

        let kept = value_set(&series);
        let buckets = budget / 2;
        let (first, last) = (ts(0), ts(values.len() as i64 - 1));
        for bucket in 0..buckets {
            let in_bucket: Vec<f64> = values
                .iter()
                .enumerate()
                .filter(|(i, _)| bucket_of(ts(*i as i64), first, last, buckets) == bucket)
                .map(|(_, v)| *v)
                .collect();
            let min = in_bucket.iter().copied().fold(f64::INFINITY, f64::min);
            let max = in_bucket.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            assert!(kept.contains(&min), "bucket {bucket} lost its minimum {min}");
            assert!(kept.contains(&max), "bucket {bucket} lost its maximum {max}");
        }
        assert!(kept.contains(&500.0));
        assert!(kept.contains(&-500.0));
    }

    #[test]
    fn test_budget_two_over_hundred_rows_keeps_global_extremes() {
        let mut values = wave(100);
        values[17] = 99.0;
        values[83] = -99.0;
        let table = table_of(&values);

        let series = decimate(&table, &DecimationRequest::new("V", 2)).unwrap();
        assert!(series.points.len() <= 4);
        assert_eq!(value_set(&series), vec![99.0, -99.0]);
        assert_eq!(series.points[0].timestamp, ts(17));
        assert_eq!(series.points[1].timestamp, ts(83));
    }

    #[test]
    fn test_flat_bucket_still_yields_two_points() {
        let table = table_of(&[7.0; 50]);
        let series = decimate(&table, &DecimationRequest::new("V", 2)).unwrap();

        assert_eq!(series.points.len(), 2);
        assert_eq!(series.points[0].timestamp, ts(0));
        assert_eq!(series.points[1].timestamp, ts(49));
    }

    #[test]
    fn test_budget_of_one_returns_the_maximum() {
        let table = table_of(&[1.0, 8.0, 3.0]);
        let series = decimate(&table, &DecimationRequest::new("V", 1)).unwrap();

        assert_eq!(series.points.len(), 1);
        assert_eq!(series.points[0].value, Some(8.0));
    }

    #[test]
    fn test_nulls_and_nan_never_win_a_bucket() {
        let mut values = vec![f64::NAN; 40];
        values[30] = 2.0;
        values[35] = 1.0;
        let table = table_of(&values);

        // two buckets: [0, 20) is all NaN and contributes nothing
        let series = decimate(&table, &DecimationRequest::new("V", 4)).unwrap();
        assert_eq!(value_set(&series), vec![2.0, 1.0]);
        assert!(series.points.iter().all(|p| p.timestamp >= ts(20)));
    }

    #[test]
    fn test_range_restricts_rows_and_matches_direct_decimation() {
        let values = wave(2_000);
        let table = table_of(&values);
        let range = TimeRange::new(ts(500), ts(899));

        let windowed = decimate(&table, &DecimationRequest::new("V", 40).with_range(Some(range))).unwrap();
        assert_eq!(windowed.source_rows, 400);
        assert!(windowed.points.iter().all(|p| range.contains(p.timestamp)));

        // same rows as a table of their own
        let sub = table_at((500..900).map(ts).collect(), &values[500..900]);
        let direct = decimate(&sub, &DecimationRequest::new("V", 40)).unwrap();
        assert_eq!(windowed.points, direct.points);

        // re-decimating a narrower window of the previous one
        let narrower = TimeRange::new(ts(600), ts(650));
        let zoomed = decimate(&table, &DecimationRequest::new("V", 40).with_range(Some(narrower))).unwrap();
        assert!(zoomed.points.iter().all(|p| narrower.contains(p.timestamp)));
        assert_eq!(zoomed.points.len(), 40.min(51));
    }

    #[test]
    fn test_empty_range_is_empty_series() {
        let table = table_of(&wave(10));
        let range = TimeRange::new(ts(100), ts(200));
        let series = decimate(&table, &DecimationRequest::new("V", 4).with_range(Some(range))).unwrap();

        assert!(series.points.is_empty());
        assert_eq!(series.source_rows, 0);

        let empty = MergedTable::empty();
        assert!(matches!(
            decimate(&empty, &DecimationRequest::new("V", 4)),
            Err(DecimateError::UnknownChannel(_))
        ));

        let rowless = table_at(vec![], &[]);
        let series = decimate(&rowless, &DecimationRequest::new("V", 4)).unwrap();
        assert!(series.points.is_empty());
        assert_eq!(series.source_rows, 0);
    }

    struct ShortColumn {
        datetime: Vec<Timestamp>,
        channels: Vec<String>,
        values: Vec<Option<f64>>,
    }

    impl TimeTable for ShortColumn {
        fn datetime(&self) -> &[Timestamp] {
            &self.datetime
        }

        fn channels(&self) -> &[String] {
            &self.channels
        }

        fn column(&self, channel: &str) -> Option<&[Option<f64>]> {
            (channel == "V").then_some(self.values.as_slice())
        }
    }

    #[test]
    fn test_short_column_is_an_error_not_a_panic() {
        let table = ShortColumn {
            datetime: vec![ts(0), ts(1), ts(2)],
            channels: vec!["V".into()],
            values: vec![Some(1.0)],
        };

        assert_eq!(
            decimate(&table, &DecimationRequest::new("V", 10)).unwrap_err(),
            DecimateError::ColumnLength {
                channel: "V".into(),
                expected: 3,
                actual: 1,
            }
        );
    }

    #[test]
    fn test_caller_chosen_bucket_count() {
        let table = table_of(&wave(1_000));
        let series =
            decimate(&table, &DecimationRequest::new("V", 100).with_buckets(Some(5))).unwrap();
        assert!(series.points.len() <= 10);

        assert_eq!(
            decimate(&table, &DecimationRequest::new("V", 100).with_buckets(Some(51))).unwrap_err(),
            DecimateError::InvalidBucketCount {
                buckets: 51,
                budget: 100,
                max: 50,
            }
        );
    }

    #[test]
    fn test_argument_errors() {
        let table = table_of(&wave(10));

        assert_eq!(
            decimate(&table, &DecimationRequest::new("V", 0)).unwrap_err(),
            DecimateError::ZeroBudget
        );
        assert_eq!(
            decimate(&table, &DecimationRequest::new("nope", 10)).unwrap_err(),
            DecimateError::UnknownChannel("nope".into())
        );
        let inverted = TimeRange::new(ts(5), ts(1));
        assert_eq!(
            decimate(&table, &DecimationRequest::new("V", 10).with_range(Some(inverted))).unwrap_err(),
            DecimateError::InvalidRange {
                start: ts(5),
                end: ts(1),
            }
        );
    }
}
