pub mod depth;
pub mod drift;
pub mod engagement;
pub mod learning_rate;
pub mod sequence;
pub mod surprise;
pub mod topic;

pub use depth::DepthTracker;
pub use drift::DriftDetector;
pub use engagement::EngagementTracker;
pub use learning_rate::LearningRateController;
pub use sequence::SequencePredictor;
pub use surprise::SurpriseTracker;
pub use topic::TopicTracker;
