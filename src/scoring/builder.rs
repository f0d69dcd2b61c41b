use crate::config::{NistConfig, ScoringConfig};
use crate::error::EvalError;
use crate::scoring::kwseval::ProcessRunner;
use crate::scoring::map::ScoringMap;
use crate::scoring::nist::{NistScorer, NistScorerParts};
use crate::scoring::traits::ToolRunner;
use crate::types::Channel;

pub struct NistScorerBuilder {
    map: ScoringMap,
    config: NistConfig,
    level: u32,
    sublevel: u32,
    channel: Channel,
    runner: Option<Box<dyn ToolRunner>>,
}

impl NistScorerBuilder {
    pub fn new(map: ScoringMap) -> Self {
        Self {
            map,
            config: NistConfig::default(),
            level: 0,
            sublevel: 0,
            channel: Channel::All,
            runner: None,
        }
    }

    /// Takes the tier and the KWSEval settings from a loaded config.
    pub fn from_config(map: ScoringMap, config: &ScoringConfig) -> Result<Self, EvalError> {
        Ok(Self::new(map)
            .with_config(config.nist.clone())
            .with_tier(config.level, config.sublevel, config.channel()?))
    }

    pub fn with_config(mut self, config: NistConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_tier(mut self, level: u32, sublevel: u32, channel: Channel) -> Self {
        self.level = level;
        self.sublevel = sublevel;
        self.channel = channel;
        self
    }

    pub fn with_runner(mut self, runner: Box<dyn ToolRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn build(self) -> Result<NistScorer, EvalError> {
        self.map.validate()?;
        validate_config(&self.config)?;
        Ok(NistScorer::from_parts(NistScorerParts {
            config: self.config,
            map: self.map,
            level: self.level,
            sublevel: self.sublevel,
            channel: self.channel,
            runner: self.runner.unwrap_or_else(|| Box::new(ProcessRunner)),
        }))
    }
}

fn validate_config(config: &NistConfig) -> Result<(), EvalError> {
    for (name, value) in [
        ("koefcorrect", config.koefcorrect),
        ("koefincorrect", config.koefincorrect),
        ("delta", config.delta),
        ("probterm", config.probterm),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(EvalError::invalid_input(format!(
                "nist.{name} must be a non-negative number, got {value}"
            )));
        }
    }
    if config.command.trim().is_empty() {
        return Err(EvalError::invalid_input("nist.command is empty"));
    }
    if config.timeout_secs == Some(0) {
        return Err(EvalError::invalid_input("nist.timeout_secs must be positive"));
    }
    Ok(())
}
