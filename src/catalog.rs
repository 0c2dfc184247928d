//! Fixed menus the agent chooses from: detectors, trackers, recovery
//! actions, and the instruments expected in each surgical phase.

use serde::{Deserialize, Serialize};

/// Instrument detection strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Detector {
    /// Fast, low accuracy.
    SimpleDetector,
    /// Balanced, high accuracy.
    #[default]
    #[serde(rename = "yolov8_surgical")]
    Yolov8Surgical,
    /// Slow, handles smoke and blood.
    AdvancedDetector,
}

/// Multi-object tracking strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tracker {
    /// Fast, poor occlusion handling.
    SimpleTracker,
    /// Balanced, good occlusion handling.
    #[default]
    ByteTrack,
    /// Slow, excellent occlusion handling.
    DeepSort,
}

/// Named remediation steps offered to the model after a failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    #[default]
    Reinitialize,
    SwitchDetector,
    SwitchTracker,
    IncreaseThreshold,
    SkipFrames,
}

/// Relative cost of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speed {
    Fast,
    Medium,
    Slow,
}

impl Speed {
    /// Word used for this speed in prompt menus.
    pub fn label(&self) -> &'static str {
        match self {
            Speed::Fast => "fast",
            Speed::Medium => "balanced",
            Speed::Slow => "slow",
        }
    }
}

/// Detector characteristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DetectorProfile {
    pub speed: Speed,
    pub accuracy: &'static str,
    pub smoke_robust: bool,
}

/// Tracker characteristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrackerProfile {
    pub speed: Speed,
    pub occlusion_handling: &'static str,
}

impl Detector {
    /// Every detector in menu order.
    pub const ALL: [Detector; 3] = [
        Detector::SimpleDetector,
        Detector::Yolov8Surgical,
        Detector::AdvancedDetector,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Detector::SimpleDetector => "simple_detector",
            Detector::Yolov8Surgical => "yolov8_surgical",
            Detector::AdvancedDetector => "advanced_detector",
        }
    }

    pub fn profile(&self) -> DetectorProfile {
        match self {
            Detector::SimpleDetector => DetectorProfile {
                speed: Speed::Fast,
                accuracy: "low",
                smoke_robust: false,
            },
            Detector::Yolov8Surgical => DetectorProfile {
                speed: Speed::Medium,
                accuracy: "high",
                smoke_robust: false,
            },
            Detector::AdvancedDetector => DetectorProfile {
                speed: Speed::Slow,
                accuracy: "very high",
                smoke_robust: true,
            },
        }
    }

    /// One-line summary of the profile used in the strategy prompt menu.
    pub fn menu_line(&self) -> String {
        let profile = self.profile();
        let mut line = format!("{}, {} accuracy", profile.speed.label(), profile.accuracy);
        if profile.smoke_robust {
            line.push_str(", handles smoke/blood");
        }
        line
    }
}

impl Tracker {
    /// Every tracker in menu order.
    pub const ALL: [Tracker; 3] = [Tracker::SimpleTracker, Tracker::ByteTrack, Tracker::DeepSort];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tracker::SimpleTracker => "simple_tracker",
            Tracker::ByteTrack => "byte_track",
            Tracker::DeepSort => "deep_sort",
        }
    }

    pub fn profile(&self) -> TrackerProfile {
        match self {
            Tracker::SimpleTracker => TrackerProfile {
                speed: Speed::Fast,
                occlusion_handling: "poor",
            },
            Tracker::ByteTrack => TrackerProfile {
                speed: Speed::Medium,
                occlusion_handling: "good",
            },
            Tracker::DeepSort => TrackerProfile {
                speed: Speed::Slow,
                occlusion_handling: "excellent",
            },
        }
    }

    /// One-line summary of the profile used in the strategy prompt menu.
    pub fn menu_line(&self) -> String {
        let profile = self.profile();
        format!(
            "{}, {} occlusion handling",
            profile.speed.label(),
            profile.occlusion_handling
        )
    }
}

impl RecoveryAction {
    /// Every recovery action in menu order.
    pub const ALL: [RecoveryAction; 5] = [
        RecoveryAction::Reinitialize,
        RecoveryAction::SwitchDetector,
        RecoveryAction::SwitchTracker,
        RecoveryAction::IncreaseThreshold,
        RecoveryAction::SkipFrames,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryAction::Reinitialize => "reinitialize",
            RecoveryAction::SwitchDetector => "switch_detector",
            RecoveryAction::SwitchTracker => "switch_tracker",
            RecoveryAction::IncreaseThreshold => "increase_threshold",
            RecoveryAction::SkipFrames => "skip_frames",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RecoveryAction::Reinitialize => "Reset tracker with new parameters",
            RecoveryAction::SwitchDetector => "Use a different detector",
            RecoveryAction::SwitchTracker => "Use a different tracker",
            RecoveryAction::IncreaseThreshold => "Raise IoU threshold",
            RecoveryAction::SkipFrames => "Skip problematic frames",
        }
    }
}

macro_rules! impl_display_from_str {
    ($ty:ty, $label:literal) => {
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim().to_lowercase();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| format!("Unknown {}: {}", $label, s))
            }
        }
    };
}

impl_display_from_str!(Detector, "detector");
impl_display_from_str!(Tracker, "tracker");
impl_display_from_str!(RecoveryAction, "recovery action");

/// Instruments expected and forbidden during a surgical phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseConstraint {
    pub phase: &'static str,
    pub expected: &'static [&'static str],
    pub forbidden: &'static [&'static str],
}

/// Laparoscopic cholecystectomy phase constraints.
pub const PHASE_CONSTRAINTS: &[PhaseConstraint] = &[
    PhaseConstraint {
        phase: "preparation",
        expected: &["grasper"],
        forbidden: &["clipper", "scissors"],
    },
    PhaseConstraint {
        phase: "calot_triangle_dissection",
        expected: &["grasper", "hook", "bipolar"],
        forbidden: &[],
    },
    PhaseConstraint {
        phase: "clipping_cutting",
        expected: &["clipper", "scissors", "grasper"],
        forbidden: &["hook"],
    },
    PhaseConstraint {
        phase: "gallbladder_dissection",
        expected: &["grasper", "hook", "bipolar"],
        forbidden: &["clipper"],
    },
];

/// Constraint for a phase name, if one is known.
pub fn phase_constraint(phase: &str) -> Option<&'static PhaseConstraint> {
    let phase = phase.trim().to_lowercase();
    PHASE_CONSTRAINTS.iter().find(|c| c.phase == phase)
}

/// Instruments seen that the phase forbids, in the order given.
pub fn phase_violations<'a>(phase: &str, instruments: &[&'a str]) -> Vec<&'a str> {
    let Some(constraint) = phase_constraint(phase) else {
        return Vec::new();
    };
    instruments
        .iter()
        .copied()
        .filter(|i| constraint.forbidden.contains(&i.to_lowercase().as_str()))
        .collect()
}
