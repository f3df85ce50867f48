pub mod classifier;
pub mod dispatcher;
pub mod heuristics;
pub mod queue;
pub mod rule_engine;
pub mod trust_ledger;
pub mod verdict;

pub use classifier::{Classifier, ClassifierGateway, HttpClassifier, TextSignal};
pub use dispatcher::{ActionDispatcher, LoggingDispatcher};
pub use heuristics::ContentHeuristics;
pub use queue::ModerationQueue;
pub use rule_engine::{AutoModResult, RuleEngine};
pub use trust_ledger::TrustScoreLedger;
pub use verdict::VerdictCombiner;
