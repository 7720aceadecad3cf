use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Alert state of a composite score.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum AlertState {
    Overheat,
    Oversold,
    Normal,
}

/// Direction of a raised alert.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    Overheat,
    Oversold,
}

impl AlertState {
    /// The alert this state raises, if any.
    pub fn alert(&self) -> Option<AlertKind> {
        match self {
            AlertState::Overheat => Some(AlertKind::Overheat),
            AlertState::Oversold => Some(AlertKind::Oversold),
            AlertState::Normal => None,
        }
    }
}

/// Configured score thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Thresholds {
    pub overheat: f64,
    pub oversold: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            overheat: 60.0,
            oversold: 30.0,
        }
    }
}

impl Thresholds {
    pub fn classify(&self, score: f64) -> AlertState {
        classify(score, self.overheat, self.oversold)
    }

    /// True when the thresholds overlap and Overheat shadows Oversold.
    pub fn is_inverted(&self) -> bool {
        self.overheat <= self.oversold
    }
}

/// Classify `score` against the two thresholds.
///
/// Overheat is tested first, so when `overheat_threshold <= oversold_threshold`
/// a score satisfying both classifies as Overheat.
pub fn classify(score: f64, overheat_threshold: f64, oversold_threshold: f64) -> AlertState {
    if score >= overheat_threshold {
        AlertState::Overheat
    } else if score <= oversold_threshold {
        AlertState::Oversold
    } else {
        AlertState::Normal
    }
}
