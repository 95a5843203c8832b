// Cross-file merge - concatenates aligned tables and sorts by datetime
use super::error::MergeError;
use super::table::{Column, MergedTable, TimeTable};
use std::collections::HashSet;

/// Concatenate tables row-wise and stably sort by `datetime`.
///
/// Column sets may differ: the result carries the union (in first-seen order) and a
/// file's rows are null for channels it does not have. Equal timestamps keep the order
/// of the input tables. No rows are de-duplicated.
pub fn merge<T: TimeTable>(tables: &[T]) -> Result<MergedTable, MergeError> {
    for (index, table) in tables.iter().enumerate() {
        validate(index, table)?;
    }

    if tables.is_empty() {
        return Ok(MergedTable::empty());
    }
    // Zero rows still carry the column union.
    let total: usize = tables.iter().map(TimeTable::row_count).sum();

    let mut seen = HashSet::new();
    let channels: Vec<&str> = tables
        .iter()
        .flat_map(|t| t.channels())
        .map(String::as_str)
        .filter(|name| seen.insert(*name))
        .collect();

    let mut datetime = Vec::with_capacity(total);
    for table in tables {
        datetime.extend_from_slice(table.datetime());
    }

    // Stable, so ties stay in file order.
    let mut order: Vec<usize> = (0..total).collect();
    order.sort_by_key(|&row| datetime[row]);

    let columns = channels
        .into_iter()
        .map(|name| {
            let mut concatenated: Column = Vec::with_capacity(total);
            for table in tables {
                match table.column(name) {
                    Some(values) => concatenated.extend_from_slice(values),
                    None => concatenated.resize(concatenated.len() + table.row_count(), None),
                }
            }
            let sorted = order.iter().map(|&row| concatenated[row]).collect();
            (name.to_string(), sorted)
        })
        .collect();

    let datetime = order.iter().map(|&row| datetime[row]).collect();
    Ok(MergedTable::new(datetime, columns))
}

fn validate<T: TimeTable>(index: usize, table: &T) -> Result<(), MergeError> {
    let datetime = table.datetime();

    if let Some(pos) = datetime.windows(2).position(|w| w[0] > w[1]) {
        return Err(MergeError::Unsorted {
            table: index,
            row: pos + 1,
        });
    }

    for channel in table.channels() {
        let actual = table.column(channel).map_or(0, <[Option<f64>]>::len);
        if actual != datetime.len() {
            return Err(MergeError::ColumnLength {
                table: index,
                channel: channel.clone(),
                expected: datetime.len(),
                actual,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::align::align;
    use crate::domain::channel::{ChannelData, FileChannels};
    use crate::domain::table::AlignedTable;
    use crate::domain::timestamp::Timestamp;
    use std::collections::BTreeSet;

    fn ts(values: &[i64]) -> Vec<Timestamp> {
        values.iter().map(|v| Timestamp::from_nanos(*v)).collect()
    }

    fn aligned(file: FileChannels) -> AlignedTable {
        let selected: BTreeSet<String> = file.channels.iter().map(|c| c.name.clone()).collect();
        align(&file, &selected).unwrap()
    }

    fn file_a() -> AlignedTable {
        aligned(
            FileChannels::default()
                .with_axis("T1", ts(&[0, 1, 2, 3]))
                .with_channel(ChannelData::new("X", Some("T1".into()), vec![10.0, 20.0, 30.0, 40.0])),
        )
    }

    fn file_b() -> AlignedTable {
        aligned(
            FileChannels::default()
                .with_axis("T1", ts(&[0, 2, 4]))
                .with_channel(ChannelData::new("Y", Some("T1".into()), vec![1.0, 2.0, 3.0])),
        )
    }

    #[test]
    fn test_two_files_with_disjoint_channels() {
        let merged = merge(&[file_a(), file_b()]).unwrap();

        assert_eq!(merged.row_count(), 7);
        assert_eq!(merged.datetime(), ts(&[0, 0, 1, 2, 2, 3, 4]).as_slice());
        assert_eq!(merged.channels(), ["X".to_string(), "Y".to_string()]);
        // t=0 appears once per file, file A first
        assert_eq!(
            merged.column("X").unwrap(),
            [Some(10.0), None, Some(20.0), Some(30.0), None, Some(40.0), None]
        );
        assert_eq!(
            merged.column("Y").unwrap(),
            [None, Some(1.0), None, None, Some(2.0), None, Some(3.0)]
        );
    }

    #[test]
    fn test_row_count_is_sum_of_inputs() {
        let tables = [file_b(), file_a(), file_b()];
        let expected: usize = tables.iter().map(TimeTable::row_count).sum();

        let merged = merge(&tables).unwrap();
        assert_eq!(merged.row_count(), expected);
        assert!(merged.datetime().windows(2).all(|w| w[0] <= w[1]));
        // first-seen column order
        assert_eq!(merged.channels(), ["Y".to_string(), "X".to_string()]);
    }

    #[test]
    fn test_empty_input_is_empty_table() {
        let merged = merge::<AlignedTable>(&[]).unwrap();
        assert!(merged.is_empty());
        assert!(merged.channels().is_empty());

        let merged = merge(&[AlignedTable::default()]).unwrap();
        assert!(merged.is_empty());
    }

    #[test]
    fn test_rowless_tables_keep_their_columns() {
        let empty_axis = aligned(
            FileChannels::default()
                .with_axis("T", vec![])
                .with_channel(ChannelData::new("V", Some("T".into()), vec![])),
        );
        assert_eq!(empty_axis.channels(), ["V".to_string()]);

        let merged = merge(&[empty_axis]).unwrap();
        assert!(merged.is_empty());
        assert_eq!(merged.channels(), ["V".to_string()]);
        assert_eq!(merged.column("V").map(<[Option<f64>]>::len), Some(0));
    }

    struct Ragged {
        datetime: Vec<Timestamp>,
        channels: Vec<String>,
        values: Vec<Option<f64>>,
    }

    impl TimeTable for Ragged {
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
    fn test_rejects_tables_that_break_invariants() {
        let short = Ragged {
            datetime: ts(&[0, 1, 2]),
            channels: vec!["V".into()],
            values: vec![Some(1.0)],
        };
        assert_eq!(
            merge(&[short]).unwrap_err(),
            MergeError::ColumnLength {
                table: 0,
                channel: "V".into(),
                expected: 3,
                actual: 1,
            }
        );

        let unsorted = Ragged {
            datetime: ts(&[0, 5, 2]),
            channels: vec![],
            values: vec![],
        };
        assert_eq!(
            merge(&[unsorted]).unwrap_err(),
            MergeError::Unsorted { table: 0, row: 2 }
        );
    }
}
