// Channel and time-axis domain models
use super::timestamp::Timestamp;
use std::collections::{BTreeMap, BTreeSet};

/// Channel as listed by a source, before any samples are read.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInfo {
    pub name: String,
    /// Raw axis property, e.g. `TimeStamps/T1`.
    pub axis_property: Option<String>,
}

impl ChannelInfo {
    pub fn new(name: impl Into<String>, axis_property: Option<String>) -> Self {
        Self {
            name: name.into(),
            axis_property,
        }
    }

    pub fn axis_name(&self) -> Option<String> {
        self.axis_property.as_deref().and_then(axis_name_from_property)
    }
}

/// Resolve an axis property path to the axis name: the last segment with quotes stripped.
pub fn axis_name_from_property(property: &str) -> Option<String> {
    let name = property
        .trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()?
        .trim()
        .trim_matches(|c| c == '\'' || c == '"');

    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelData {
    pub name: String,
    pub axis: Option<String>,
    pub samples: Vec<f64>,
}

impl ChannelData {
    pub fn new(name: impl Into<String>, axis: Option<String>, samples: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            axis,
            samples,
        }
    }
}

/// Everything the aligner needs from one file: its time axes and the channels read from it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileChannels {
    pub axes: BTreeMap<String, Vec<Timestamp>>,
    pub channels: Vec<ChannelData>,
}

impl FileChannels {
    pub fn with_axis(mut self, name: impl Into<String>, timestamps: Vec<Timestamp>) -> Self {
        self.axes.insert(name.into(), timestamps);
        self
    }

    pub fn with_channel(mut self, channel: ChannelData) -> Self {
        self.channels.push(channel);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisSide {
    Primary,
    Secondary,
}

/// One plotted line: a channel drawn against the primary or secondary y-axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    pub channel: String,
    pub side: AxisSide,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSelection {
    pub primary: Vec<String>,
    pub secondary: Vec<String>,
}

impl ChannelSelection {
    pub fn new(primary: Vec<String>, secondary: Vec<String>) -> Self {
        Self { primary, secondary }
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.secondary.is_empty()
    }

    /// Distinct channel names across both axes; this is what gets aligned.
    pub fn channel_names(&self) -> BTreeSet<String> {
        self.primary
            .iter()
            .chain(&self.secondary)
            .cloned()
            .collect()
    }

    pub fn traces(&self) -> Vec<Trace> {
        let primary = self.primary.iter().map(|c| Trace {
            channel: c.clone(),
            side: AxisSide::Primary,
        });
        let secondary = self.secondary.iter().map(|c| Trace {
            channel: c.clone(),
            side: AxisSide::Secondary,
        });
        primary.chain(secondary).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_name_from_property() {
        assert_eq!(axis_name_from_property("TimeStamps/T1").as_deref(), Some("T1"));
        assert_eq!(
            axis_name_from_property("/'TimeStamps'/'Fast Clock'").as_deref(),
            Some("Fast Clock")
        );
        assert_eq!(axis_name_from_property("T2").as_deref(), Some("T2"));
        assert_eq!(axis_name_from_property("  "), None);
        assert_eq!(axis_name_from_property("''"), None);
    }

    #[test]
    fn test_channel_info_without_property_has_no_axis() {
        assert_eq!(ChannelInfo::new("X", None).axis_name(), None);
    }

    #[test]
    fn test_selection_unions_both_axes() {
        let selection = ChannelSelection::new(
            vec!["b".to_string(), "a".to_string()],
            vec!["a".to_string(), "c".to_string()],
        );

        let names: Vec<String> = selection.channel_names().into_iter().collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        let traces = selection.traces();
        assert_eq!(traces.len(), 4);
        assert_eq!(traces[0].side, AxisSide::Primary);
        assert_eq!(traces[3].channel, "c");
        assert_eq!(traces[3].side, AxisSide::Secondary);
    }
}
