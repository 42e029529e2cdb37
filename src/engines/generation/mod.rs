pub mod node;
pub mod operators;
pub mod chromosome;
pub mod simulator;
pub mod progress;

pub use node::{Action, Edge, Gene, GenomeTree, NodeId, ParentLink, Predicate};
pub use chromosome::{Chromosome, GenomeId};
pub use simulator::{Population, Scores, Simulator};
pub use progress::{GenerationSummary, LogProgressCallback, NoProgress, ProgressCallback};
