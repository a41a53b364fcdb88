pub mod bandit;
pub mod blender;
pub mod coldstart;

pub use bandit::BanditSelector;
pub use blender::RecommendationBlender;
pub use coldstart::ColdStartController;
