use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EvalError;

/// One canonical scoring class and the raw labels collapsed into it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScoringClass {
    pub label: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Ordered label-collapsing map. Class order decides report order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ScoringMap {
    classes: Vec<ScoringClass>,
}

const SEIZURE_ALIASES: [&str; 11] = [
    "fnsz", "gnsz", "spsz", "cpsz", "absz", "tnsz", "cnsz", "tcsz", "atsz", "mysz", "nesz",
];

impl ScoringMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Two-class seizure/background map over the TUSZ seizure subtypes.
    pub fn seizure_default() -> Self {
        Self::new()
            .with_class("seiz", &SEIZURE_ALIASES)
            .with_class("bckg", &["null"])
    }

    pub fn with_class(mut self, label: &str, aliases: &[&str]) -> Self {
        self.classes.push(ScoringClass {
            label: label.to_string(),
            aliases: aliases.iter().map(|alias| alias.to_string()).collect(),
        });
        self
    }

    pub fn load(path: &Path) -> Result<Self, EvalError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| EvalError::io("reading scoring map", path, e))?;
        let map: Self =
            serde_json::from_str(&data).map_err(|e| EvalError::json("parsing scoring map", e))?;
        map.validate()?;
        Ok(map)
    }

    /// Rejects empty maps and raw labels claimed by two classes.
    pub fn validate(&self) -> Result<(), EvalError> {
        if self.classes.is_empty() {
            return Err(EvalError::invalid_input("scoring map has no classes"));
        }
        let mut seen: Vec<&str> = Vec::new();
        for class in &self.classes {
            for raw in std::iter::once(&class.label).chain(&class.aliases) {
                if seen.contains(&raw.as_str()) {
                    return Err(EvalError::invalid_input(format!(
                        "label '{raw}' appears more than once in the scoring map"
                    )));
                }
                seen.push(raw.as_str());
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn classes(&self) -> &[ScoringClass] {
        &self.classes
    }

    /// Canonical labels in map order.
    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.classes.iter().map(|class| class.label.as_str())
    }

    /// Canonical class of a raw label. A canonical label maps to itself.
    pub fn canonical(&self, raw: &str) -> Option<&str> {
        self.classes
            .iter()
            .find(|class| class.label == raw || class.aliases.iter().any(|alias| alias == raw))
            .map(|class| class.label.as_str())
    }
}
