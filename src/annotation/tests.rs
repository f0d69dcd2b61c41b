use std::path::Path;

use super::lbl::LblAnnotation;
use super::traits::AnnotationCodec;
use super::tse::{unique_events, TseAnnotation};
use super::{Annotation, AnnotationFormat};
use crate::annotation::graph::AnnotationGraph;
use crate::error::EvalError;
use crate::types::{Channel, Interval, LabelScores};

const TSE_SAMPLE: &str = "version = tse_v1.0.0

0.0000 20.0000 bckg 1.0000
20.0000 50.0000 seiz 0.8000
# annotator note
50.0000 120.0000 bckg 1.0000 seiz 0.1250
";

const LBL_SAMPLE: &str = "
version = lbl_v1.0.0

montage = 0, FP1-F7: EEG FP1-REF -- EEG F7-REF
montage = 1, F7-T3: EEG F7-REF -- EEG T3-REF

number_of_levels = 1

level[0] = 1

symbols[0] = {0: 'null', 1: 'spsw', 2: 'seiz', 3: 'bckg'}

label = {0, 0, 0.0000, 10.5000, 0, [0.0, 0.0, 0.0, 1.0]}
label = {0, 0, 10.5000, 30.0000, FP1-F7, [0.0, 0.0, 0.75, 0.25]}
label = {0, 0, 0.0000, 30.0000, 1, [0.0, 1.0, 0.0, 0.0]}
";

fn labels(pairs: &[(&str, f64)]) -> LabelScores {
    pairs
        .iter()
        .map(|(label, confidence)| (label.to_string(), *confidence))
        .collect()
}

#[test]
fn tse_parse_skips_comments_and_reads_multi_label_lines() {
    let mut tse = TseAnnotation::new();
    tse.parse(TSE_SAMPLE, Path::new("sample.tse"))
        .expect("valid tse");
    let events = tse.get(0, 0, Channel::All).expect("all-channel bucket");
    assert_eq!(events.len(), 3);
    assert_eq!(events[1].labels, labels(&[("seiz", 0.8)]));
    assert_eq!(events[2].labels, labels(&[("bckg", 1.0), ("seiz", 0.125)]));
}

#[test]
fn tse_parse_rejects_malformed_line() {
    let mut tse = TseAnnotation::new();
    let err = tse
        .parse("version = tse_v1.0.0\n\n0.0 10.0 seiz\n", Path::new("bad.tse"))
        .expect_err("odd field count must fail");
    assert!(matches!(err, EvalError::Parse { line: 3, .. }));

    let err = tse
        .parse("0.0 ten seiz 1.0\n", Path::new("bad.tse"))
        .expect_err("non-numeric stop must fail");
    assert!(matches!(err, EvalError::Parse { line: 1, .. }));
}

#[test]
fn tse_write_uses_four_decimals_and_header() {
    let mut graph = AnnotationGraph::new();
    graph.create(0, 0, Channel::All, Interval::single(0.0, 1.23456, "seiz", 0.5));
    let tse = TseAnnotation::from_graph(graph);
    let mut out = Vec::new();
    tse.write_to(&mut out, 0, 0).expect("tier exists");
    let text = String::from_utf8(out).expect("utf8");
    assert_eq!(text, "version = tse_v1.0.0\n\n0.0000 1.2346 seiz 0.5000\n");
}

#[test]
fn tse_write_unknown_tier_fails() {
    let tse = TseAnnotation::new();
    let mut out = Vec::new();
    let err = tse.write_to(&mut out, 0, 0).expect_err("empty graph");
    assert!(err.is_not_found());
}

#[test]
fn unique_events_merge_labels_keeping_higher_confidence() {
    let merged = unique_events(vec![
        Interval::single(0.0, 10.0, "seiz", 0.5),
        Interval::single(0.0, 10.0, "vfib", 0.9),
        Interval::single(10.0, 20.0, "bckg", 1.0),
    ]);
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].labels, labels(&[("seiz", 0.5), ("vfib", 0.9)]));

    let merged = unique_events(vec![
        Interval::single(0.0, 10.0, "seiz", 0.5),
        Interval::single(0.0, 10.0, "seiz", 0.7),
    ]);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].labels, labels(&[("seiz", 0.7)]));
}

#[test]
fn tse_write_folds_channels_into_one_stream() {
    let mut graph = AnnotationGraph::new();
    graph.create(0, 0, Channel::Index(0), Interval::single(0.0, 10.0, "seiz", 0.5));
    graph.create(0, 0, Channel::Index(1), Interval::single(0.0, 10.0, "vfib", 0.9));
    graph.create(0, 0, Channel::Index(1), Interval::single(10.0, 12.0, "bckg", 1.0));
    let tse = TseAnnotation::from_graph(graph);
    let mut out = Vec::new();
    tse.write_to(&mut out, 0, 0).expect("tier exists");
    let text = String::from_utf8(out).expect("utf8");
    let body: Vec<&str> = text.lines().skip(2).collect();
    assert_eq!(
        body,
        vec![
            "0.0000 10.0000 seiz 0.5000 vfib 0.9000",
            "10.0000 12.0000 bckg 1.0000"
        ]
    );
}

#[test]
fn lbl_parse_reads_montage_symbols_and_channels() {
    let mut lbl = LblAnnotation::new();
    lbl.parse(LBL_SAMPLE, Path::new("sample.lbl"))
        .expect("valid lbl");

    assert_eq!(lbl.montage_lines().len(), 2);
    assert_eq!(lbl.channel_name(Channel::Index(1)), Some("F7-T3"));
    assert_eq!(lbl.num_levels(), 1);
    assert_eq!(lbl.num_sublevels(0), Some(1));
    assert_eq!(lbl.symbols(0).map(Vec::len), Some(4));

    let channel_zero = lbl.get(0, 0, Channel::Index(0)).expect("channel 0");
    assert_eq!(channel_zero.len(), 2);
    assert_eq!(channel_zero[0].labels, labels(&[("bckg", 1.0)]));
    assert_eq!(
        channel_zero[1].labels,
        labels(&[("seiz", 0.75), ("bckg", 0.25)])
    );
    let channel_one = lbl.get(0, 0, Channel::Index(1)).expect("channel 1");
    assert_eq!(channel_one[0].labels, labels(&[("spsw", 1.0)]));
    assert!(lbl.get(0, 0, Channel::All).is_err());
}

#[test]
fn lbl_parse_rejects_probability_count_mismatch() {
    let text = "symbols[0] = {0: 'seiz', 1: 'bckg'}\nlabel = {0, 0, 0.0, 1.0, all, [1.0]}\n";
    let mut lbl = LblAnnotation::new();
    let err = lbl
        .parse(text, Path::new("short.lbl"))
        .expect_err("one probability for two symbols");
    assert!(matches!(err, EvalError::Parse { line: 2, .. }));
}

#[test]
fn lbl_write_round_trips_through_parse() {
    let mut lbl = LblAnnotation::new();
    lbl.parse(LBL_SAMPLE, Path::new("sample.lbl"))
        .expect("valid lbl");
    let mut out = Vec::new();
    lbl.write_to(&mut out, 0, 0).expect("tier exists");
    let text = String::from_utf8(out).expect("utf8");
    assert!(text.starts_with("\nversion = lbl_v1.0.0\n\n"));
    assert!(text.contains("symbols[0] = {0: 'null', 1: 'spsw', 2: 'seiz', 3: 'bckg'}"));
    assert!(text.contains("label = {0, 0, 10.5000, 30.0000, 0, [0.0, 0.0, 0.75, 0.25]}"));

    let mut reloaded = LblAnnotation::new();
    reloaded
        .parse(&text, Path::new("rewritten.lbl"))
        .expect("rewritten file parses");
    assert_eq!(reloaded.graph(), lbl.graph());
}

#[test]
fn lbl_write_without_montage_synthesizes_symbols() {
    let mut graph = AnnotationGraph::new();
    graph.create(0, 0, Channel::All, Interval::single(0.0, 20.0, "bckg", 1.0));
    graph.create(0, 0, Channel::All, Interval::single(20.0, 50.0, "seiz", 0.9));
    let lbl = LblAnnotation::from_graph(graph);
    let mut out = Vec::new();
    lbl.write_to(&mut out, 0, 0).expect("tier exists");
    let text = String::from_utf8(out).expect("utf8");
    assert!(text.contains("symbols[0] = {0: 'bckg', 1: 'seiz'}"));
    assert!(text.contains("label = {0, 0, 20.0000, 50.0000, all, [0.0, 0.9]}"));
}

#[test]
fn lbl_display_shows_channel_names_and_dominant_label() {
    let mut lbl = LblAnnotation::new();
    lbl.parse(LBL_SAMPLE, Path::new("sample.lbl"))
        .expect("valid lbl");
    let mut out = Vec::new();
    lbl.display(&mut out, 0, 0).expect("tier exists");
    let text = String::from_utf8(out).expect("utf8");
    let second = text.lines().nth(1).expect("two channel-0 rows");
    assert!(second.trim_start().starts_with("FP1-F7:"));
    assert!(second.contains("seiz"));
}

#[test]
fn format_detection_reads_version_header() {
    assert_eq!(
        AnnotationFormat::detect_str(TSE_SAMPLE, Path::new("a.tse")).expect("tse"),
        AnnotationFormat::Tse
    );
    assert_eq!(
        AnnotationFormat::detect_str(LBL_SAMPLE, Path::new("a.lbl")).expect("lbl"),
        AnnotationFormat::Lbl
    );
    let err = AnnotationFormat::detect_str("version = csv_v1.0.0\n", Path::new("a.csv"))
        .expect_err("unknown signature");
    assert!(matches!(err, EvalError::UnknownFormat { .. }));
    assert_eq!("lbl".parse::<AnnotationFormat>().expect("known"), AnnotationFormat::Lbl);
}

#[test]
fn facade_requires_a_loaded_file() {
    let mut annotation = Annotation::new();
    assert!(matches!(annotation.get(0, 0, Channel::All), Err(EvalError::NotLoaded)));
    assert!(matches!(annotation.delete("seiz", 0, 0), Err(EvalError::NotLoaded)));
    assert!(matches!(annotation.set_type(AnnotationFormat::Lbl), Err(EvalError::NotLoaded)));
    let mut sink = Vec::new();
    assert!(matches!(annotation.write_to(&mut sink, 0, 0), Err(EvalError::NotLoaded)));
}

#[test]
fn facade_set_type_moves_graph_between_codecs() {
    let mut graph = AnnotationGraph::new();
    graph.create(0, 0, Channel::All, Interval::single(0.0, 20.0, "bckg", 1.0));
    graph.create(0, 0, Channel::All, Interval::single(20.0, 50.0, "seiz", 1.0));
    let mut annotation = Annotation::from_graph(AnnotationFormat::Tse, graph.clone());

    annotation.set_type(AnnotationFormat::Lbl).expect("loaded");
    assert_eq!(annotation.format(), Some(AnnotationFormat::Lbl));
    assert_eq!(annotation.graph().expect("loaded"), &graph);

    let mut out = Vec::new();
    annotation.write_to(&mut out, 0, 0).expect("tier exists");
    let text = String::from_utf8(out).expect("utf8");
    assert_eq!(
        AnnotationFormat::detect_str(&text, Path::new("converted.lbl")).expect("lbl header"),
        AnnotationFormat::Lbl
    );
}

#[test]
fn lbl_write_declares_labels_missing_from_the_symbol_table() {
    let text = "
version = lbl_v1.0.0

montage = 0, FP1-F7: EEG FP1-REF -- EEG F7-REF

number_of_levels = 1

level[0] = 1

symbols[0] = {0: 'null', 1: 'seiz'}

label = {0, 0, 10.0000, 20.0000, 0, [0.0, 1.0]}
";
    let mut lbl = LblAnnotation::new();
    lbl.parse(text, Path::new("sparse.lbl")).expect("valid lbl");
    lbl.add(30.0, "bckg", 0, 0).expect("tier exists");

    let mut out = Vec::new();
    lbl.write_to(&mut out, 0, 0).expect("tier exists");
    let written = String::from_utf8(out).expect("utf8");
    assert!(written.contains("symbols[0] = {0: 'null', 1: 'seiz', 2: 'bckg'}"));
    assert!(written.contains("label = {0, 0, 0.0000, 10.0000, 0, [0.0, 0.0, 1.0]}"));

    let mut reloaded = LblAnnotation::new();
    reloaded
        .parse(&written, Path::new("filled.lbl"))
        .expect("rewritten file parses");
    let intervals = reloaded.get(0, 0, Channel::Index(0)).expect("channel 0");
    let reloaded_labels: Vec<LabelScores> =
        intervals.iter().map(|interval| interval.labels.clone()).collect();
    assert_eq!(
        reloaded_labels,
        vec![
            labels(&[("bckg", 1.0)]),
            labels(&[("seiz", 1.0)]),
            labels(&[("bckg", 1.0)]),
        ]
    );
}

#[test]
fn tse_write_skips_intervals_without_labels() {
    let mut graph = AnnotationGraph::new();
    graph.create(0, 0, Channel::All, Interval::single(0.0, 10.0, "bckg", 1.0));
    graph.create(0, 0, Channel::All, Interval::new(10.0, 20.0, LabelScores::new()));
    let tse = TseAnnotation::from_graph(graph);
    let mut out = Vec::new();
    tse.write_to(&mut out, 0, 0).expect("tier exists");
    let text = String::from_utf8(out).expect("utf8");
    let body: Vec<&str> = text.lines().skip(2).collect();
    assert_eq!(body, vec!["0.0000 10.0000 bckg 1.0000"]);

    let mut reloaded = TseAnnotation::new();
    reloaded
        .parse(&text, Path::new("written.tse"))
        .expect("written file parses");
}
