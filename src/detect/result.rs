use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Detector capabilities a `DetectorSet` can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Face,
    Gaze,
    HeadPose,
    Blink,
    Object,
    Audio,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Face => "face",
            Capability::Gaze => "gaze",
            Capability::HeadPose => "head_pose",
            Capability::Blink => "blink",
            Capability::Object => "object",
            Capability::Audio => "audio",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Face bounding box in frame pixel coordinates.
///
/// This is the one face-region record every face-consuming capability receives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Horizontal centre of the box.
    pub fn center_x(&self) -> u32 {
        self.x.saturating_add(self.width / 2)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceStatus {
    #[default]
    Normal,
    NoFace,
    MultipleFaces,
    NoFrame,
    Error,
}

impl FaceStatus {
    /// Status implied by a face count.
    pub fn from_count(count: usize) -> Self {
        match count {
            0 => FaceStatus::NoFace,
            1 => FaceStatus::Normal,
            _ => FaceStatus::MultipleFaces,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GazeStatus {
    #[default]
    Center,
    LookingAway,
    NoEyes,
    NoFace,
    Error,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadPoseStatus {
    #[default]
    Normal,
    HeadTurned,
    NoFace,
    Error,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlinkStatus {
    Blink,
    #[default]
    NoBlink,
    Error,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioStatus {
    SuspiciousAudio,
    #[default]
    NormalAudio,
    NotStarted,
    Error,
}

/// Output of the face capability.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FaceReading {
    pub status: FaceStatus,
    pub faces: Vec<FaceRegion>,
}

impl FaceReading {
    /// Reading whose status follows from the number of regions.
    pub fn from_regions(faces: Vec<FaceRegion>) -> Self {
        Self {
            status: FaceStatus::from_count(faces.len()),
            faces,
        }
    }
}

/// Output of the blink capability: open eyes visible across every face in
/// the frame.
///
/// Blinks are edges between frames (open eyes, then none), so they are
/// derived by the session that owns the previous reading, never by the
/// detector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EyeReading {
    /// No face to look at. Leaves the session's previous reading untouched.
    #[default]
    NoFace,
    Visible(u32),
    Error,
}

impl EyeReading {
    /// Reading for `count` open eyes. An empty region list yields `NoFace`.
    pub fn from_count(faces: &[FaceRegion], count: u32) -> Self {
        if faces.is_empty() {
            EyeReading::NoFace
        } else {
            EyeReading::Visible(count)
        }
    }
}

/// Output of the optional audio capability.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioReading {
    pub status: AudioStatus,
    pub peak_volume: u32,
}

/// Deduplicated suspicious-object labels.
pub type ObjectLabels = BTreeSet<String>;
