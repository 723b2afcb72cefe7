use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    allocation::AllocationModel,
    allocator::{Allocator, AllocatorSettings},
    envelope::{EnvelopeSearch, EnvelopeSettings},
    minimize::BfgsSettings,
    penalty::ConstraintSettings,
    Result,
};

/// Every tunable of the allocator and the envelope search
///
/// Missing fields fall back to their defaults when deserializing, so a settings file
/// only needs to name what it overrides.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub constraints: ConstraintSettings,
    pub allocator: AllocatorSettings,
    pub minimizer: BfgsSettings,
    pub envelope: EnvelopeSettings,
}

impl Settings {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn allocator<'a>(&self, model: &'a AllocationModel) -> Allocator<'a> {
        Allocator::new(model, self.constraints, self.allocator, self.minimizer)
    }

    pub fn envelope_search<'a>(&self, model: &'a AllocationModel) -> EnvelopeSearch<'a> {
        EnvelopeSearch::new(self.allocator(model), self.envelope)
    }
}
