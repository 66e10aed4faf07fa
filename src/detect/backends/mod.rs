pub mod cpu;
pub mod stub;

pub use cpu::{
    LabelClassifier, OffCenterHeadPose, PeakLevelAudio, SampleSource, ScoredLabel,
    VocabularyFilter,
};
pub use stub::StubBackend;
