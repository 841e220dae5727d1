//! Periodic sampling, update and pruning jobs.

use oracle_config::ScheduleConfig;
use oracle_core::{CoreError, OracleEngine};
use oracle_types::OperationResult;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

/// Spawns one loop per job. Each loop awaits its run before the next tick,
/// and ticks missed while a run was in progress are skipped.
pub fn spawn(engine: Arc<OracleEngine>, schedule: &ScheduleConfig) -> Vec<JoinHandle<()>> {
	vec![
		spawn_job(
			"sample",
			Duration::from_secs(schedule.sample_interval_secs),
			engine.clone(),
			|engine| async move { engine.record_sample().await },
		),
		spawn_job(
			"update",
			Duration::from_secs(schedule.update_interval_secs),
			engine.clone(),
			|engine| async move { engine.evaluate_and_maybe_update().await },
		),
		spawn_job(
			"prune",
			Duration::from_secs(schedule.prune_interval_secs),
			engine,
			|engine| async move { engine.prune_old_samples().await },
		),
	]
}

fn spawn_job<F, Fut>(
	name: &'static str,
	period: Duration,
	engine: Arc<OracleEngine>,
	job: F,
) -> JoinHandle<()>
where
	F: Fn(Arc<OracleEngine>) -> Fut + Send + 'static,
	Fut: Future<Output = Result<OperationResult, CoreError>> + Send + 'static,
{
	tokio::spawn(async move {
		info!(job = name, period_secs = period.as_secs(), "Starting scheduled job");
		let mut ticker = tokio::time::interval(period);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

		loop {
			ticker.tick().await;
			match job(engine.clone()).await {
				Ok(result) => info!(job = name, status = result.status, "{}", result.message),
				Err(e) => {
					// error_result logs the failure
					engine.error_result(&e);
				}
			}
		}
	})
}
