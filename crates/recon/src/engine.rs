use crate::carryover::carry_over;
use crate::config::ReconConfig;
use crate::crossmatch::cross_match;
use crate::enrich::enrich;
use crate::error::ReconError;
use crate::model::{CarryoverOutput, CrossMatchOutput, EnrichOutput, Snapshot, Table};

/// Explicit stage selection with the typed inputs each stage needs.
#[derive(Debug, Clone)]
pub enum StageInput {
    CrossMatch { raw: Table },
    Enrich { processed: Snapshot, feed: Table },
    Carryover { yesterday: Snapshot, today: Snapshot },
}

#[derive(Debug, Clone)]
pub enum StageOutput {
    CrossMatch(CrossMatchOutput),
    Enrich(EnrichOutput),
    Carryover(CarryoverOutput),
}

impl StageInput {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CrossMatch { .. } => "cross-match",
            Self::Enrich { .. } => "enrich",
            Self::Carryover { .. } => "carryover",
        }
    }
}

/// Run one stage. Each invocation is independent: nothing carries over
/// between calls except what the caller passes in.
pub fn run(config: &ReconConfig, input: &StageInput) -> Result<StageOutput, ReconError> {
    config.validate()?;

    let span = tracing::info_span!("stage", name = input.name());
    let _guard = span.enter();

    match input {
        StageInput::CrossMatch { raw } => cross_match(raw, config).map(StageOutput::CrossMatch),
        StageInput::Enrich { processed, feed } => {
            Ok(StageOutput::Enrich(enrich(processed, feed, config)))
        }
        StageInput::Carryover { yesterday, today } => {
            carry_over(yesterday, today, config).map(StageOutput::Carryover)
        }
    }
}
