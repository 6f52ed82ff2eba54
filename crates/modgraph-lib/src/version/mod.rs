pub mod compare;
pub mod constraint;

pub use compare::{compare_versions, Version};
pub use constraint::{VersionBound, VersionConstraint};
