//! Batch evaluation: run the agent on each case, execute the gold and
//! submitted queries, and grade the results with a loose comparison.

pub mod case;
pub mod outcome;
pub mod runner;

pub use case::{EvalCase, EvalError, load_cases};
pub use outcome::{EvalResult, EvalSummary, FailureType};
pub use runner::{AgentFactory, Submission, evaluate, extract_submission, run_single};

#[cfg(test)]
pub(crate) mod test_helpers;
