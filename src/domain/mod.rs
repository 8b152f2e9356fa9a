// Domain layer - time ranges, granularities and their wire forms
pub mod error;
pub mod granularity;
pub mod range;
pub mod selection;
pub mod window;
