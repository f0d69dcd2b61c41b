use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use crate::annotation::graph::AnnotationGraph;
use crate::annotation::traits::{write_error, AnnotationCodec};
use crate::annotation::AnnotationFormat;
use crate::error::EvalError;
use crate::types::{Channel, Interval, LabelScores};

/// Characters stripped from a `symbols[..]` definition before splitting.
const SYMBOL_STRIP: &[char] = &['{', '}', '\'', '"', ';', ' ', '\t'];

/// Symbol table of one level: `(index, name)` in file order. The label
/// probability vectors are aligned to this order, not to the indices.
pub type SymbolTable = Vec<(u32, String)>;

/// Multi-level, multi-channel label file with a montage and symbol tables.
#[derive(Debug, Clone)]
pub struct LblAnnotation {
    graph: AnnotationGraph,
    channel_names: BTreeMap<Channel, String>,
    montage_lines: Vec<String>,
    num_levels: u32,
    num_sublevels: BTreeMap<u32, u32>,
    symbols: BTreeMap<u32, SymbolTable>,
}

impl Default for LblAnnotation {
    fn default() -> Self {
        Self {
            graph: AnnotationGraph::new(),
            channel_names: BTreeMap::from([(Channel::All, Channel::ALL_NAME.to_string())]),
            montage_lines: Vec::new(),
            num_levels: 1,
            num_sublevels: BTreeMap::from([(0, 1)]),
            symbols: BTreeMap::new(),
        }
    }
}

impl LblAnnotation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing graph with default montage/level metadata.
    pub fn from_graph(graph: AnnotationGraph) -> Self {
        Self {
            graph,
            ..Self::default()
        }
    }

    pub fn into_graph(self) -> AnnotationGraph {
        self.graph
    }

    pub fn montage_lines(&self) -> &[String] {
        &self.montage_lines
    }

    pub fn channel_name(&self, channel: Channel) -> Option<&str> {
        self.channel_names.get(&channel).map(String::as_str)
    }

    pub fn num_levels(&self) -> u32 {
        self.num_levels
    }

    pub fn num_sublevels(&self, level: u32) -> Option<u32> {
        self.num_sublevels.get(&level).copied()
    }

    pub fn symbols(&self, level: u32) -> Option<&SymbolTable> {
        self.symbols.get(&level)
    }

    /// Symbol tables to serialize. Without a montage (a graph converted from
    /// the flat format) the written level's table is rebuilt from the labels
    /// on the all-channel bucket, indexed in first-seen order.
    /// Symbol tables as written. A file without a montage gets a table built
    /// from the labels in use; a declared table is extended with any label it
    /// lacks, so labels added after loading survive a reload.
    fn symbols_for_write(
        &self,
        level: u32,
        sublevel: u32,
    ) -> Result<BTreeMap<u32, SymbolTable>, EvalError> {
        let mut symbols = self.symbols.clone();
        let mut table = if self.montage_lines.is_empty() {
            SymbolTable::new()
        } else {
            symbols.get(&level).cloned().unwrap_or_default()
        };
        let declared = table.len();
        for interval in self.graph.channels(level, sublevel)?.values().flatten() {
            for label in interval.labels.keys() {
                if !table.iter().any(|(_, name)| name == label) {
                    let index = table.iter().map(|(index, _)| index + 1).max().unwrap_or(0);
                    table.push((index, label.clone()));
                }
            }
        }
        if !self.montage_lines.is_empty() && table.len() > declared {
            tracing::debug!(
                component = "annotation",
                level,
                added = table.len() - declared,
                "extended symbol table with undeclared labels"
            );
        }
        symbols.insert(level, table);
        Ok(symbols)
    }

    fn parse_line(&mut self, line: &str) -> Result<(), String> {
        if line.starts_with("montage") {
            self.parse_montage(line)
        } else if line.starts_with("number_of_levels") {
            self.num_levels = parse_int(value_after_equals(line)?, "number_of_levels")?;
            Ok(())
        } else if line.starts_with("level") {
            let level = parse_int(bracket_index(line)?, "level index")?;
            let count = parse_int(value_after_equals(line)?, "sublevel count")?;
            self.num_sublevels.insert(level, count);
            Ok(())
        } else if line.starts_with("symbols") {
            let level = parse_int(bracket_index(line)?, "symbol level")?;
            let table = parse_symbol_table(value_after_equals(line)?)?;
            self.symbols.insert(level, table);
            Ok(())
        } else if line.starts_with("label") {
            self.parse_label(line)
        } else {
            Ok(())
        }
    }

    fn parse_montage(&mut self, line: &str) -> Result<(), String> {
        let body = value_after_equals(line)?;
        let (number, rest) = body
            .split_once(',')
            .ok_or_else(|| format!("montage line without channel name: '{line}'"))?;
        let name = rest.split(':').next().unwrap_or(rest).trim();
        let index: u32 = parse_int(number.trim(), "montage channel")?;
        self.channel_names
            .insert(Channel::Index(index), name.to_string());
        self.montage_lines.push(line.to_string());
        Ok(())
    }

    fn parse_label(&mut self, line: &str) -> Result<(), String> {
        let body = value_after_equals(line)?;
        let (head, tail) = body
            .split_once('[')
            .ok_or_else(|| format!("label line without probability vector: '{line}'"))?;
        let fields: Vec<&str> = head
            .trim_matches(|c: char| c == '{' || c.is_whitespace())
            .split(',')
            .map(str::trim)
            .filter(|field| !field.is_empty())
            .collect();
        if fields.len() != 5 {
            return Err(format!(
                "expected level, sublevel, start, stop, channel before the probabilities, got {} fields",
                fields.len()
            ));
        }
        let level: u32 = parse_int(fields[0], "label level")?;
        let sublevel: u32 = parse_int(fields[1], "label sublevel")?;
        let start = parse_float(fields[2], "start")?;
        let stop = parse_float(fields[3], "stop")?;
        let channel = self.resolve_channel(fields[4])?;

        let vector = tail
            .split(']')
            .next()
            .ok_or_else(|| format!("unterminated probability vector: '{line}'"))?;
        let probabilities = vector
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(|token| parse_float(token, "probability"))
            .collect::<Result<Vec<_>, _>>()?;

        let table = self
            .symbols
            .get(&level)
            .ok_or_else(|| format!("no symbol table declared for level {level}"))?;
        if table.len() != probabilities.len() {
            return Err(format!(
                "{} probabilities for {} symbols on level {level}",
                probabilities.len(),
                table.len()
            ));
        }
        let labels: LabelScores = table
            .iter()
            .zip(&probabilities)
            .filter(|(_, probability)| **probability > 0.0)
            .map(|((_, name), &probability)| (name.clone(), probability))
            .collect();
        self.graph
            .create(level, sublevel, channel, Interval::new(start, stop, labels));
        Ok(())
    }

    fn resolve_channel(&self, token: &str) -> Result<Channel, String> {
        if let Ok(raw) = token.parse::<i64>() {
            return Channel::from_raw(raw).ok_or_else(|| format!("invalid channel number {raw}"));
        }
        if token.eq_ignore_ascii_case(Channel::ALL_NAME) {
            return Ok(Channel::All);
        }
        self.channel_names
            .iter()
            .find(|(_, name)| name.as_str() == token)
            .map(|(&channel, _)| channel)
            .ok_or_else(|| format!("unknown channel '{token}'"))
    }
}

impl AnnotationCodec for LblAnnotation {
    fn format(&self) -> AnnotationFormat {
        AnnotationFormat::Lbl
    }

    fn graph(&self) -> &AnnotationGraph {
        &self.graph
    }

    fn graph_mut(&mut self) -> &mut AnnotationGraph {
        &mut self.graph
    }

    fn parse(&mut self, content: &str, source: &Path) -> Result<(), EvalError> {
        let mut parsed = Self::new();
        for (index, raw_line) in content.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }
            parsed
                .parse_line(line)
                .map_err(|message| EvalError::parse(source, index + 1, message))?;
        }
        parsed.graph.sort();
        *self = parsed;
        Ok(())
    }

    fn write_to(&self, out: &mut dyn Write, level: u32, sublevel: u32) -> Result<(), EvalError> {
        let channels = self.graph.channels(level, sublevel)?;
        let symbols = self.symbols_for_write(level, sublevel)?;
        let table = symbols
            .get(&level)
            .ok_or_else(|| EvalError::invalid_input(format!("no symbol table for level {level}")))?;

        let mut text = String::new();
        text.push('\n');
        text.push_str(&format!("version = {}\n\n", AnnotationFormat::Lbl.signature()));
        for line in &self.montage_lines {
            text.push_str(line);
            text.push('\n');
        }
        text.push('\n');
        text.push_str(&format!("number_of_levels = {}\n\n", self.num_levels));
        for (lev, count) in &self.num_sublevels {
            text.push_str(&format!("level[{lev}] = {count}\n"));
        }
        text.push('\n');
        for (lev, entries) in &symbols {
            text.push_str(&format!("symbols[{lev}] = {}\n", format_symbol_table(entries)));
        }
        text.push('\n');

        for (channel, intervals) in channels {
            for interval in intervals {
                let probabilities = table
                    .iter()
                    .map(|(_, name)| {
                        let probability = interval.labels.get(name).copied().unwrap_or(0.0);
                        format!("{probability:?}")
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                text.push_str(&format!(
                    "label = {{{level}, {sublevel}, {:.4}, {:.4}, {channel}, [{probabilities}]}}\n",
                    interval.start, interval.stop
                ));
            }
        }
        out.write_all(text.as_bytes()).map_err(write_error)
    }

    fn display(&self, out: &mut dyn Write, level: u32, sublevel: u32) -> Result<(), EvalError> {
        for (channel, intervals) in self.graph.channels(level, sublevel)? {
            let name = self
                .channel_name(*channel)
                .map(str::to_string)
                .unwrap_or_else(|| channel.to_string());
            for interval in intervals {
                let (label, confidence) = interval.dominant_label().unwrap_or(("", 0.0));
                writeln!(
                    out,
                    "{name:>10}: {:>10.4} {:>10.4} {label:>8} {confidence:>10.4}",
                    interval.start, interval.stop
                )
                .map_err(write_error)?;
            }
        }
        Ok(())
    }
}

fn value_after_equals(line: &str) -> Result<&str, String> {
    line.split_once('=')
        .map(|(_, value)| value.trim())
        .ok_or_else(|| format!("missing '=' in '{line}'"))
}

fn bracket_index(line: &str) -> Result<&str, String> {
    let open = line
        .find('[')
        .ok_or_else(|| format!("missing '[' in '{line}'"))?;
    let close = line[open..]
        .find(']')
        .ok_or_else(|| format!("missing ']' in '{line}'"))?;
    Ok(line[open + 1..open + close].trim())
}

fn parse_symbol_table(body: &str) -> Result<SymbolTable, String> {
    let cleaned: String = body.chars().filter(|c| !SYMBOL_STRIP.contains(c)).collect();
    cleaned
        .split(',')
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (index, name) = entry
                .split_once(':')
                .ok_or_else(|| format!("symbol entry without ':' in '{entry}'"))?;
            Ok((parse_int(index, "symbol index")?, name.to_string()))
        })
        .collect()
}

fn format_symbol_table(entries: &SymbolTable) -> String {
    let body = entries
        .iter()
        .map(|(index, name)| format!("{index}: '{name}'"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{body}}}")
}

fn parse_int(token: &str, field: &str) -> Result<u32, String> {
    token
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid {field} '{token}'"))
}

fn parse_float(token: &str, field: &str) -> Result<f64, String> {
    token
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| format!("invalid {field} value '{token}'"))
}
