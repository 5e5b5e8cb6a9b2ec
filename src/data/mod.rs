//! Feature scaling and train/validation/test partitioning.

mod scaler;
mod split;

pub use scaler::{ScalerScope, StandardScaler};
pub use split::DataSplit;
