//! Query configuration.
//!
//! Every field has a default, so a partial JSON document is enough:
//!
//! ```json
//! { "search": { "max_distance": 25.0 }, "kind": "Manhattan" }
//! ```

use serde::{Deserialize, Serialize};

use crate::distance::{DistanceMeasure, MeasureConfig, MeasureKind};
use crate::search::SearchSettings;
use crate::{Error, Result};

/// Search settings plus the similarity measure to score with.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub search: SearchSettings,
    pub measure: MeasureConfig,
    pub kind: MeasureKind,
}

impl QueryConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: QueryConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.search.validate()?;
        let mismatch = self.measure.attribute_mismatch_distance;
        if !mismatch.is_finite() || mismatch < 0.0 {
            return Err(Error::Config(format!(
                "attribute_mismatch_distance must be finite and non-negative, got {mismatch}"
            )));
        }
        Ok(())
    }

    /// Build the configured measure.
    pub fn build_measure(&self) -> Box<dyn DistanceMeasure> {
        self.kind.build(self.measure)
    }
}
