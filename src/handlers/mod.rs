pub mod aggregator;
pub mod estimator;
pub mod identifier;
pub mod pipeline;
pub mod recommender;
pub mod session;

pub use aggregator::NutritionAggregator;
pub use estimator::QuantityEstimator;
pub use identifier::FoodIdentifier;
pub use pipeline::{Analysis, Pipeline};
pub use recommender::FoodRecommender;
pub use session::{EstimateTarget, Outcome, PipelineSession, SessionSnapshot};
