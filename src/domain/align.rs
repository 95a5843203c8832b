// Per-file alignment - joins each channel onto its time axis, then outer-joins the axes
use super::channel::{ChannelData, FileChannels};
use super::error::AlignError;
use super::table::{AlignedTable, Column};
use super::timestamp::Timestamp;
use std::collections::{BTreeMap, BTreeSet};

/// Align the selected channels of one file onto a single `datetime` column.
///
/// The result's `datetime` is the sorted, de-duplicated union of every time axis in the
/// file, whether or not a selected channel uses it. A channel only has values at its own axis' timestamps and is null
/// elsewhere, so slower channels show gaps instead of interpolated values. Selected
/// channels the file does not contain get no column. When an axis repeats a timestamp
/// the first sample at that instant is kept.
pub fn align(file: &FileChannels, selected: &BTreeSet<String>) -> Result<AlignedTable, AlignError> {
    let by_axis = group_by_axis(file, selected)?;

    let mut datetime: Vec<Timestamp> = file.axes.values().flatten().copied().collect();
    datetime.sort_unstable();
    datetime.dedup();

    let mut columns: Vec<(String, Column)> = Vec::new();
    for (axis, channels) in &by_axis {
        let Some(timestamps) = file.axes.get(*axis) else {
            continue;
        };
        let rows: Vec<usize> = timestamps
            .iter()
            .map(|t| datetime.partition_point(|d| d < t))
            .collect();

        for channel in channels {
            let mut column: Column = vec![None; datetime.len()];
            for (&row, &value) in rows.iter().zip(&channel.samples) {
                let slot = &mut column[row];
                if slot.is_none() {
                    *slot = Some(value);
                }
            }
            columns.push((channel.name.clone(), column));
        }
    }
    columns.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(AlignedTable::new(datetime, columns))
}

fn group_by_axis<'a>(
    file: &'a FileChannels,
    selected: &BTreeSet<String>,
) -> Result<BTreeMap<&'a str, Vec<&'a ChannelData>>, AlignError> {
    let mut by_axis: BTreeMap<&str, Vec<&ChannelData>> = BTreeMap::new();

    for channel in file.channels.iter().filter(|c| selected.contains(&c.name)) {
        let (axis, timestamps) = channel
            .axis
            .as_deref()
            .and_then(|axis| file.axes.get_key_value(axis))
            .ok_or_else(|| AlignError::UnresolvedAxis {
                channel: channel.name.clone(),
                axis: channel.axis.clone(),
            })?;

        if channel.samples.len() != timestamps.len() {
            return Err(AlignError::AxisLengthMismatch {
                channel: channel.name.clone(),
                axis: axis.clone(),
                samples: channel.samples.len(),
                timestamps: timestamps.len(),
            });
        }

        by_axis.entry(axis.as_str()).or_default().push(channel);
    }

    Ok(by_axis)
}
