pub mod candidate;
pub mod constraint;
pub mod filters;
pub mod geography;
pub mod requirements;

pub use candidate::SearchCandidate;
pub use constraint::{Constraint, Relaxation, satisfies_hard_constraints};
pub use filters::{ScopeFilters, StructuredFilters};
pub use geography::GeographyIndex;
pub use requirements::{District, SearchRequirements, TransactionType, parse_requirements};
