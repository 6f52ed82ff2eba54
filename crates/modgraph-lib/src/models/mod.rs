pub mod conflict;
pub mod graph;
pub mod metadata;
pub mod snapshot;

pub use conflict::{Conflict, ConflictRule, ConflictType, DetailValue, Severity};
pub use graph::{Edge, Graph, Node};
pub use metadata::{Dependency, Environment, LoaderType, ModIdentity, ModMetadata};
pub use snapshot::{Modpack, ModpackEntry};
