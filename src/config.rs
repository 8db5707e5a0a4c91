// Copyright (c) 2025 SynaDB Contributors
// Licensed under the SynaDB License. See LICENSE file for details.

//! Matching configuration.
//!
//! [`MatchingParams`] gathers everything a match request needs besides the
//! descriptors themselves. Every field has a default, so a JSON file only
//! needs the keys it changes:
//!
//! ```json
//! {
//!   "matcher_type": "FASTCASCADEHASHINGL2",
//!   "ratio_thresh": 0.8,
//!   "cross_check": true,
//!   "cascade": { "bits_per_bucket": 8 }
//! }
//! ```
//!
//! | Key | Default | Meaning |
//! |-----|---------|---------|
//! | `matcher_type` | `FASTCASCADEHASHINGL2` | Strategy name |
//! | `ratio_thresh` | 0.8 | Ratio test threshold, in (0, 1) |
//! | `cross_check` | false | Keep only mutual matches |
//! | `max_matches` | 0 | Keep the N closest matches (0 = all) |
//! | `cascade` | see [`CascadeConfig`] | Hashing layout |

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cascade::CascadeConfig;
use crate::error::Result;
use crate::matcher::{validate_ratio, MatcherType};

/// Default ratio test threshold.
pub const DEFAULT_RATIO_THRESH: f32 = 0.8;

/// Parameters of a match request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingParams {
    /// Matching strategy
    pub matcher_type: MatcherType,
    /// Ratio test threshold
    pub ratio_thresh: f32,
    /// Keep only matches found in both directions
    pub cross_check: bool,
    /// Keep only the N closest matches (0 = unlimited)
    pub max_matches: usize,
    /// Cascade hashing layout, ignored by exhaustive matchers
    pub cascade: CascadeConfig,
}

impl Default for MatchingParams {
    fn default() -> Self {
        Self {
            matcher_type: MatcherType::default(),
            ratio_thresh: DEFAULT_RATIO_THRESH,
            cross_check: false,
            max_matches: 0,
            cascade: CascadeConfig::default(),
        }
    }
}

impl MatchingParams {
    /// Default parameters for `matcher_type`.
    pub fn for_matcher(matcher_type: MatcherType) -> Self {
        Self {
            matcher_type,
            ..Default::default()
        }
    }

    /// Parse parameters from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Read parameters from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the ratio threshold and the cascade layout.
    pub fn validate(&self) -> Result<()> {
        validate_ratio(self.ratio_thresh)?;
        self.cascade.validate()
    }
}
