//! Running the agent over eval cases and grading its submissions.

use std::sync::Arc;

use sqlclaw_agent::{Agent, AgentEvent};
use sqlclaw_core::error::DatabaseError;
use sqlclaw_core::provider::Usage;
use sqlclaw_core::tool::{ANSWER_SUBMITTED_PREFIX, SUBMIT_TOOL_NAME};
use sqlclaw_database::{SqlEngine, loosely_compare};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::case::EvalCase;
use crate::outcome::{EvalResult, FailureType};

/// Builds a fresh agent for each case so runs never share a conversation.
pub trait AgentFactory: Send + Sync {
    fn build(&self) -> Agent;
}

impl<F> AgentFactory for F
where
    F: Fn() -> Agent + Send + Sync,
{
    fn build(&self) -> Agent {
        self()
    }
}

/// What a finished run handed in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    pub query: Option<String>,
    /// Set when the run ended in an error event.
    pub error: Option<String>,
    pub usage: Usage,
}

/// Read the submitted query out of a run's events.
///
/// Only a `submit_answer` result carrying the submission prefix counts, so
/// submissions held back by the verifier are ignored. An error event wins
/// over any earlier submission.
pub fn extract_submission(events: &[AgentEvent]) -> Submission {
    let mut submission = Submission::default();
    for event in events {
        match event {
            AgentEvent::Error { error, usage } => {
                return Submission {
                    query: None,
                    error: Some(error.clone()),
                    usage: *usage,
                };
            }
            AgentEvent::Complete { usage, .. } => submission.usage = *usage,
            AgentEvent::ToolExecutionEnd { name, result } if name == SUBMIT_TOOL_NAME => {
                if let Some(query) = result.strip_prefix(ANSWER_SUBMITTED_PREFIX) {
                    submission.query = Some(query.trim().to_string());
                }
            }
            _ => {}
        }
    }
    submission
}

fn reason(e: DatabaseError) -> String {
    match e {
        DatabaseError::Query(reason) => reason,
        other => other.to_string(),
    }
}

/// Run one case and grade the submission against the gold query.
pub async fn run_single(
    agent: &mut Agent,
    case: EvalCase,
    engine: &dyn SqlEngine,
    epsilon: f64,
) -> EvalResult {
    debug!(prompt = %case.prompt, "Running eval case");
    let (events, _) = agent.run_collect(&case.prompt).await;
    let Submission { query, error, usage } = extract_submission(&events);

    if let Some(error) = error {
        return EvalResult::failed(case, query, FailureType::AgentError, format!("Agent error: {error}"), usage);
    }
    let Some(query) = query else {
        return EvalResult::failed(
            case,
            None,
            FailureType::NoSubmission,
            "No answer submitted (agent did not call submit_answer)",
            usage,
        );
    };

    let gold = match engine.execute(&case.gold_query).await {
        Ok(gold) => gold,
        Err(e) => {
            let error = format!("Gold query execution failed: {}", reason(e));
            return EvalResult::failed(case, Some(query), FailureType::InfraError, error, usage);
        }
    };
    let submitted = match engine.execute(&query).await {
        Ok(submitted) => submitted,
        Err(e) => {
            let error = format!("Submitted query execution failed: {}", reason(e));
            return EvalResult::failed(case, Some(query), FailureType::SqlError, error, usage);
        }
    };

    match loosely_compare(&gold, &submitted, epsilon) {
        Ok(true) => EvalResult::passed(case, query, usage),
        Ok(false) => {
            let mut result = EvalResult::failed(
                case,
                Some(query),
                FailureType::Mismatch,
                "Results do not match",
                usage,
            );
            result.gold = Some(gold);
            result.submitted = Some(submitted);
            result
        }
        Err(e) => EvalResult::failed(case, Some(query), FailureType::InfraError, e.to_string(), usage),
    }
}

/// Evaluate every case with at most `concurrency` runs in flight.
///
/// Results come back in case order.
pub async fn evaluate(
    cases: Vec<EvalCase>,
    factory: Arc<dyn AgentFactory>,
    engine: Arc<dyn SqlEngine>,
    concurrency: usize,
    epsilon: f64,
) -> Vec<EvalResult> {
    let total = cases.len();
    let slots: Arc<Mutex<Vec<Option<EvalResult>>>> = Arc::new(Mutex::new(vec![None; total]));
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    info!(total, concurrency, "Starting evaluation");

    let mut tasks = JoinSet::new();
    for (index, case) in cases.iter().cloned().enumerate() {
        let factory = factory.clone();
        let engine = engine.clone();
        let semaphore = semaphore.clone();
        let slots = slots.clone();

        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            let mut agent = factory.build();
            let result = run_single(&mut agent, case, engine.as_ref(), epsilon).await;
            let passed = result.passed;

            let mut slots = slots.lock().await;
            slots[index] = Some(result);
            let done = slots.iter().filter(|s| s.is_some()).count();
            info!(case = index, passed, done, total, "Eval case finished");
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Eval task failed");
        }
    }

    let slots = std::mem::take(&mut *slots.lock().await);
    slots
        .into_iter()
        .zip(cases)
        .map(|(slot, case)| {
            slot.unwrap_or_else(|| {
                EvalResult::failed(
                    case,
                    None,
                    FailureType::Exception,
                    "Worker exception: evaluation task did not finish",
                    Usage::default(),
                )
            })
        })
        .collect()
}
