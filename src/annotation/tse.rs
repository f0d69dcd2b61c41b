use std::io::Write;
use std::path::Path;

use crate::annotation::graph::AnnotationGraph;
use crate::annotation::traits::{write_error, AnnotationCodec};
use crate::annotation::AnnotationFormat;
use crate::error::EvalError;
use crate::types::{Channel, Interval, LabelScores};

/// Time-synchronous event file: one label set per interval, no channel axis.
#[derive(Debug, Clone, Default)]
pub struct TseAnnotation {
    graph: AnnotationGraph,
}

impl TseAnnotation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_graph(graph: AnnotationGraph) -> Self {
        Self { graph }
    }

    pub fn into_graph(self) -> AnnotationGraph {
        self.graph
    }

    /// All intervals of a level/sublevel with channel buckets folded together.
    pub fn unique_events(&self, level: u32, sublevel: u32) -> Result<Vec<Interval>, EvalError> {
        let channels = self.graph.channels(level, sublevel)?;
        Ok(unique_events(channels.values().flatten().cloned()))
    }
}

/// Merges intervals sharing an identical `(start, stop)`: labels are united
/// and a label present in both keeps the higher confidence. On equal
/// confidence the earlier copy wins. Output is sorted by span.
pub fn unique_events(events: impl IntoIterator<Item = Interval>) -> Vec<Interval> {
    let mut events: Vec<Interval> = events.into_iter().collect();
    events.sort_by(Interval::cmp_span);

    let mut merged: Vec<Interval> = Vec::with_capacity(events.len());
    for event in events {
        match merged.last_mut() {
            Some(last) if last.same_span(&event) => {
                for (label, confidence) in event.labels {
                    let kept = last.labels.entry(label).or_insert(confidence);
                    if confidence > *kept {
                        *kept = confidence;
                    }
                }
            }
            _ => merged.push(event),
        }
    }
    merged
}

impl AnnotationCodec for TseAnnotation {
    fn format(&self) -> AnnotationFormat {
        AnnotationFormat::Tse
    }

    fn graph(&self) -> &AnnotationGraph {
        &self.graph
    }

    fn graph_mut(&mut self) -> &mut AnnotationGraph {
        &mut self.graph
    }

    fn parse(&mut self, content: &str, source: &Path) -> Result<(), EvalError> {
        let mut graph = AnnotationGraph::new();
        for (index, line) in content.lines().enumerate() {
            let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
            if compact.is_empty() || compact.starts_with('#') || compact.starts_with("version") {
                continue;
            }
            let interval = parse_event(line)
                .map_err(|message| EvalError::parse(source, index + 1, message))?;
            graph.create(0, 0, Channel::All, interval);
        }
        graph.sort();
        self.graph = graph;
        Ok(())
    }

    fn write_to(&self, out: &mut dyn Write, level: u32, sublevel: u32) -> Result<(), EvalError> {
        let events = self.unique_events(level, sublevel)?;
        writeln!(out, "version = {}", AnnotationFormat::Tse.signature()).map_err(write_error)?;
        writeln!(out).map_err(write_error)?;
        let unlabeled = events.iter().filter(|event| event.labels.is_empty()).count();
        if unlabeled > 0 {
            tracing::warn!(
                component = "annotation",
                level,
                sublevel,
                skipped = unlabeled,
                "dropping intervals without labels from tse output"
            );
        }
        for event in events.iter().filter(|event| !event.labels.is_empty()) {
            let mut line = format!("{:.4} {:.4}", event.start, event.stop);
            for (label, confidence) in &event.labels {
                line.push_str(&format!(" {label} {confidence:.4}"));
            }
            writeln!(out, "{line}").map_err(write_error)?;
        }
        Ok(())
    }

    fn display(&self, out: &mut dyn Write, level: u32, sublevel: u32) -> Result<(), EvalError> {
        for event in self.unique_events(level, sublevel)? {
            let mut line = format!("{:>10}: {:>10.4} {:>10.4}", "ALL", event.start, event.stop);
            for (label, confidence) in &event.labels {
                line.push_str(&format!(" {label:>8} {confidence:>10.4}"));
            }
            writeln!(out, "{line}").map_err(write_error)?;
        }
        Ok(())
    }
}

fn parse_event(line: &str) -> Result<Interval, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 4 || parts.len() % 2 != 0 {
        return Err(format!(
            "expected 'start stop (label confidence)+', got {} fields",
            parts.len()
        ));
    }
    let start = parse_number(parts[0], "start")?;
    let stop = parse_number(parts[1], "stop")?;
    let mut labels = LabelScores::new();
    for pair in parts[2..].chunks_exact(2) {
        let confidence = parse_number(pair[1], "confidence")?;
        labels.insert(pair[0].to_string(), confidence);
    }
    Ok(Interval::new(start, stop, labels))
}

fn parse_number(token: &str, field: &str) -> Result<f64, String> {
    token
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| format!("invalid {field} value '{token}'"))
}
