use std::collections::BTreeMap;

use crate::error::EvalError;
use crate::types::{Channel, Interval};

type ChannelMap = BTreeMap<Channel, Vec<Interval>>;

/// Interval store keyed by level, sublevel and channel.
///
/// Levels, sublevels and channels are kept in key order by construction, so
/// sorting only has to order the interval lists themselves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationGraph {
    tiers: BTreeMap<u32, BTreeMap<u32, ChannelMap>>,
}

impl AnnotationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Appends an interval, creating the level/sublevel/channel path on demand.
    /// Duplicates and overlaps are accepted as-is.
    pub fn create(&mut self, level: u32, sublevel: u32, channel: Channel, interval: Interval) {
        self.tiers
            .entry(level)
            .or_default()
            .entry(sublevel)
            .or_default()
            .entry(channel)
            .or_default()
            .push(interval);
    }

    pub fn contains_tier(&self, level: u32, sublevel: u32) -> bool {
        self.tier(level, sublevel).is_some()
    }

    pub fn contains(&self, level: u32, sublevel: u32, channel: Channel) -> bool {
        self.tier(level, sublevel)
            .is_some_and(|channels| channels.contains_key(&channel))
    }

    pub fn get(&self, level: u32, sublevel: u32, channel: Channel) -> Result<&[Interval], EvalError> {
        self.channels(level, sublevel)?
            .get(&channel)
            .map(Vec::as_slice)
            .ok_or(EvalError::ChannelNotFound {
                level,
                sublevel,
                channel,
            })
    }

    /// Every channel bucket of one level/sublevel, in channel order.
    pub fn channels(&self, level: u32, sublevel: u32) -> Result<&ChannelMap, EvalError> {
        self.tier(level, sublevel)
            .ok_or(EvalError::TierNotFound { level, sublevel })
    }

    /// Flattened view: `(level, sublevel, channel, intervals)` in key order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, Channel, &[Interval])> + '_ {
        self.tiers.iter().flat_map(|(&level, sublevels)| {
            sublevels.iter().flat_map(move |(&sublevel, channels)| {
                channels
                    .iter()
                    .map(move |(&channel, intervals)| (level, sublevel, channel, intervals.as_slice()))
            })
        })
    }

    /// Orders each bucket by `(start, stop)`. Stable, so it is idempotent and
    /// keeps encounter order among identical spans.
    pub fn sort(&mut self) {
        for sublevels in self.tiers.values_mut() {
            for channels in sublevels.values_mut() {
                for intervals in channels.values_mut() {
                    intervals.sort_by(Interval::cmp_span);
                }
            }
        }
    }

    /// Background fill: every channel at `(level, sublevel)` ends up covering
    /// `[0, duration]` exactly once, with gaps labeled `label` at confidence 1.
    ///
    /// Intervals reaching past `duration` or with `start >= stop` are dropped.
    /// An interval starting before the end of the previous one is clipped.
    pub fn add(
        &mut self,
        duration: f64,
        label: &str,
        level: u32,
        sublevel: u32,
    ) -> Result<(), EvalError> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(EvalError::invalid_input(format!(
                "fill duration must be a non-negative number of seconds, got {duration}"
            )));
        }
        self.sort();
        let channels = self
            .tiers
            .get_mut(&level)
            .and_then(|sublevels| sublevels.get_mut(&sublevel))
            .ok_or(EvalError::TierNotFound { level, sublevel })?;

        for (channel, intervals) in channels.iter_mut() {
            let mut filled = Vec::with_capacity(intervals.len() * 2 + 1);
            let mut mark = 0.0f64;
            for mut interval in intervals.drain(..) {
                if interval.start > duration
                    || interval.stop > duration
                    || interval.start >= interval.stop
                {
                    tracing::debug!(
                        component = "annotation_graph",
                        channel = %channel,
                        start = interval.start,
                        stop = interval.stop,
                        duration,
                        "dropping interval outside fill range"
                    );
                    continue;
                }
                if interval.start < mark {
                    if interval.stop <= mark {
                        tracing::warn!(
                            component = "annotation_graph",
                            channel = %channel,
                            start = interval.start,
                            stop = interval.stop,
                            "dropping interval covered by its predecessor"
                        );
                        continue;
                    }
                    tracing::warn!(
                        component = "annotation_graph",
                        channel = %channel,
                        start = interval.start,
                        clipped_to = mark,
                        "clipping overlapping interval"
                    );
                    interval.start = mark;
                }
                if interval.start > mark {
                    filled.push(Interval::single(mark, interval.start, label, 1.0));
                }
                mark = interval.stop;
                filled.push(interval);
            }
            if mark < duration {
                filled.push(Interval::single(mark, duration, label, 1.0));
            }
            *intervals = filled;
        }
        Ok(())
    }

    /// Drops every interval whose label set contains `label`, whole.
    pub fn delete(&mut self, label: &str, level: u32, sublevel: u32) -> Result<(), EvalError> {
        let channels = self
            .tiers
            .get_mut(&level)
            .and_then(|sublevels| sublevels.get_mut(&sublevel))
            .ok_or(EvalError::TierNotFound { level, sublevel })?;
        for intervals in channels.values_mut() {
            intervals.retain(|interval| !interval.has_label(label));
        }
        Ok(())
    }

    fn tier(&self, level: u32, sublevel: u32) -> Option<&ChannelMap> {
        self.tiers
            .get(&level)
            .and_then(|sublevels| sublevels.get(&sublevel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(intervals: &[Interval]) -> Vec<(f64, f64, String)> {
        intervals
            .iter()
            .map(|interval| {
                let label = interval
                    .dominant_label()
                    .map(|(label, _)| label.to_string())
                    .unwrap_or_default();
                (interval.start, interval.stop, label)
            })
            .collect()
    }

    fn assert_covers_exactly(intervals: &[Interval], duration: f64) {
        let mut mark = 0.0;
        for interval in intervals {
            assert_eq!(interval.start, mark, "gap or overlap at {mark}");
            assert!(interval.start < interval.stop);
            mark = interval.stop;
        }
        assert_eq!(mark, duration);
    }

    #[test]
    fn add_fills_gaps_with_background() {
        let mut graph = AnnotationGraph::new();
        graph.create(0, 0, Channel::All, Interval::single(30.0, 50.0, "seiz", 1.0));
        graph.create(0, 0, Channel::All, Interval::single(20.0, 25.0, "seiz", 1.0));

        graph.add(150.0, "bckg", 0, 0).expect("fill should succeed");

        let filled = graph.get(0, 0, Channel::All).expect("bucket exists");
        assert_eq!(
            spans(filled),
            vec![
                (0.0, 20.0, "bckg".to_string()),
                (20.0, 25.0, "seiz".to_string()),
                (25.0, 30.0, "bckg".to_string()),
                (30.0, 50.0, "seiz".to_string()),
                (50.0, 150.0, "bckg".to_string()),
            ]
        );
    }

    #[test]
    fn add_covers_every_channel_exactly_once() {
        let mut graph = AnnotationGraph::new();
        graph.create(0, 0, Channel::Index(0), Interval::single(0.0, 4.0, "spsw", 0.9));
        graph.create(0, 0, Channel::Index(0), Interval::single(3.0, 9.0, "gped", 0.8));
        graph.create(0, 0, Channel::Index(0), Interval::single(5.0, 6.0, "pled", 0.8));
        graph.create(0, 0, Channel::Index(1), Interval::single(12.0, 12.0, "spsw", 1.0));
        graph.create(0, 0, Channel::Index(1), Interval::single(7.0, 25.0, "spsw", 1.0));
        graph.create(0, 0, Channel::Index(2), Interval::single(0.0, 20.0, "eyem", 1.0));

        graph.add(20.0, "bckg", 0, 0).expect("fill should succeed");

        for (_, _, _, intervals) in graph.iter() {
            assert_covers_exactly(intervals, 20.0);
        }
        let channel_one = graph.get(0, 0, Channel::Index(1)).expect("bucket exists");
        assert_eq!(spans(channel_one), vec![(0.0, 20.0, "bckg".to_string())]);
    }

    #[test]
    fn add_rejects_missing_tier_and_bad_duration() {
        let mut graph = AnnotationGraph::new();
        graph.create(0, 0, Channel::All, Interval::single(0.0, 1.0, "seiz", 1.0));
        assert!(matches!(
            graph.add(10.0, "bckg", 1, 0),
            Err(EvalError::TierNotFound { level: 1, sublevel: 0 })
        ));
        assert!(graph.add(f64::NAN, "bckg", 0, 0).is_err());
    }

    #[test]
    fn delete_drops_whole_multi_label_intervals() {
        let mut graph = AnnotationGraph::new();
        let mut both = Interval::single(0.0, 5.0, "seiz", 0.7);
        both.labels.insert("bckg".to_string(), 0.3);
        graph.create(0, 0, Channel::All, both);
        graph.create(0, 0, Channel::All, Interval::single(5.0, 9.0, "bckg", 1.0));

        graph.delete("seiz", 0, 0).expect("tier exists");
        let left = graph.get(0, 0, Channel::All).expect("bucket exists");
        assert_eq!(spans(left), vec![(5.0, 9.0, "bckg".to_string())]);

        assert!(graph.delete("seiz", 0, 3).is_err());
    }

    #[test]
    fn missing_bucket_is_distinct_from_empty_bucket() {
        let mut graph = AnnotationGraph::new();
        graph.create(0, 0, Channel::All, Interval::single(0.0, 5.0, "seiz", 1.0));
        graph.delete("seiz", 0, 0).expect("tier exists");

        assert_eq!(graph.get(0, 0, Channel::All).expect("empty but valid").len(), 0);
        let err = graph.get(0, 0, Channel::Index(4)).expect_err("no such channel");
        assert!(err.is_not_found());
        assert!(!graph.contains(0, 0, Channel::Index(4)));
        assert!(graph.contains_tier(0, 0));
    }

    #[test]
    fn sort_is_idempotent() {
        let mut graph = AnnotationGraph::new();
        graph.create(0, 0, Channel::All, Interval::single(10.0, 12.0, "a", 1.0));
        graph.create(0, 0, Channel::All, Interval::single(1.0, 3.0, "b", 1.0));
        graph.create(0, 0, Channel::All, Interval::single(1.0, 2.0, "c", 1.0));
        graph.sort();
        let once = graph.clone();
        graph.sort();
        assert_eq!(once, graph);
        let sorted = graph.get(0, 0, Channel::All).expect("bucket exists");
        assert_eq!(
            spans(sorted),
            vec![
                (1.0, 2.0, "c".to_string()),
                (1.0, 3.0, "b".to_string()),
                (10.0, 12.0, "a".to_string()),
            ]
        );
    }
}
