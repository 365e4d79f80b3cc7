//! Plan executor: steps, bounded retries, resumable failures.

use tokio::time::sleep;

use droidpilot_bridge::DeviceBridge;
use droidpilot_core::plan::{ActionResult, Plan, PlanResult};
use droidpilot_core::prelude::*;

use crate::session::SessionGuard;

/// Execute a plan from `start_index` onward on the held session.
///
/// Each step runs as its own interaction round. A retryable failure gets
/// up to the configured number of fresh rounds before the plan stops;
/// fatal errors stop immediately. The returned [`PlanResult`] records one
/// entry per step in its final attempt, and on failure carries the index
/// to resume from.
pub async fn execute_plan<B: DeviceBridge>(
    session: &mut SessionGuard<B>,
    plan: &Plan,
    start_index: usize,
) -> PlanResult {
    if start_index >= plan.len() {
        return PlanResult::empty();
    }
    info!(
        plan = plan.name,
        steps = plan.len(),
        start_index,
        serial = session.serial(),
        "executing plan"
    );

    let executor = session.config().executor.clone();
    let mut results: Vec<ActionResult> = Vec::new();

    for (index, step) in plan.steps.iter().enumerate().skip(start_index) {
        let mut attempt = 0u32;
        loop {
            let round = session.run_round(std::slice::from_ref(step), index).await;
            match round.error {
                None => {
                    results.extend(round.results);
                    break;
                }
                Some(error) => {
                    let out_of_attempts = attempt >= executor.max_retries;
                    if error.is_retryable() && !out_of_attempts {
                        attempt += 1;
                        warn!(
                            step = step.display_name(),
                            index,
                            attempt,
                            error = %error,
                            "step failed, retrying"
                        );
                        sleep(executor.retry_delay()).await;
                        continue;
                    }
                    error!(
                        step = step.display_name(),
                        index,
                        error = %error,
                        "step failed, stopping plan"
                    );
                    results.extend(round.results);
                    return PlanResult::failed(results, index);
                }
            }
        }
    }

    PlanResult::completed(results)
}
