//! Feature engineering and column scaling.

pub mod features;
pub mod scaler;

pub use features::{FeaturePipeline, FeatureStep};
pub use scaler::{ColumnTransformer, ScalerType};
