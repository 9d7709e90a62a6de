//! Observer-driven job lifecycle (§4.6, §4.7): walks the graph one generation
//! at a time, wires each generation's dependencies from the ones already
//! finished, submits bounded batches to an executor backend, and reports
//! every status/progress/task-result transition to the registered observers.
//!
//! Retrying restarts the whole job from `initializing` (§4.6) — the graph is
//! rebuilt from scratch each attempt, so a job config whose preprocessing
//! tasks have side effects (e.g. a counter closed over by an `Arc`) is
//! expected to make forward progress across attempts, not the job runner.

use crate::executor::{self, Executor};
use crate::graph::{self, Generation};
use crate::resolver;
use crate::tile_task::TileBatchRole;
use crate::JobRuntime;
use geotask_core::config::JobConfig;
use geotask_core::error::{CancelledError, EngineError};
use geotask_core::{InterpolateFrom, Progress, Status, Task, TaskResult, TileAddress};
use std::collections::HashMap;
use std::sync::Arc;

/// One notification an observer receives (§4.6, §6 "Observer interface").
/// Usually carries exactly one of its fields; never more than one status
/// transition and one task result at once.
#[derive(Debug, Clone, Default)]
pub struct JobEvent {
	pub status: Option<Status>,
	pub progress: Option<Progress>,
	pub message: Option<String>,
	pub task_result: Option<TaskResult>,
}

impl JobEvent {
	pub fn status(status: Status) -> Self {
		Self { status: Some(status), ..Default::default() }
	}

	pub fn progress(progress: Progress) -> Self {
		Self { progress: Some(progress), ..Default::default() }
	}

	pub fn task_result(result: TaskResult) -> Self {
		Self { task_result: Some(result), ..Default::default() }
	}
}

/// A capability that receives job events (§6). Every registered observer is
/// notified, in registration order, for every event; an observer that
/// returns an error is fatal to the job — it aborts the current attempt the
/// same way a task failure would (§4.6).
pub trait Observer: Send + Sync {
	fn notify(&self, event: &JobEvent) -> anyhow::Result<()>;
}

fn notify_all(observers: &[Arc<dyn Observer>], runtime: &JobRuntime, event: JobEvent) -> anyhow::Result<()> {
	if let Some(status) = event.status {
		runtime.set_status(status);
	}
	for observer in observers {
		observer.notify(&event)?;
	}
	Ok(())
}

/// The two exception classes that parameterize the retry/cancel branches of
/// the state machine (§4.6). Defaults: anything that isn't the cancellation
/// sentinel is retry-eligible, and only the cancellation sentinel cancels.
#[derive(Clone)]
pub struct RetryPolicy {
	pub retries: u32,
	pub retry_on: Arc<dyn Fn(&anyhow::Error) -> bool + Send + Sync>,
	pub cancel_on: Arc<dyn Fn(&anyhow::Error) -> bool + Send + Sync>,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			retries: 0,
			retry_on: Arc::new(|err| !geotask_core::error::is_cancelled(err)),
			cancel_on: Arc::new(geotask_core::error::is_cancelled),
		}
	}
}

/// Executor selection and submission bounds (§4.4, §6 "Executor interface").
#[derive(Clone)]
pub struct JobOptions {
	/// Backend name, as accepted by `executor::backend_by_name` — ignored
	/// when the job or its largest generation is trivially small (§4.4).
	pub concurrency: String,
	/// Caps how many tasks of one generation are ever in flight at once
	/// (§4.4 "bounded in-flight submission"). `usize::MAX` submits a whole
	/// generation in one go.
	pub max_submitted_tasks: usize,
	/// Forwarded to the dataflow backend's per-round spawn cap (§4.4).
	pub chunksize: usize,
	pub retry_policy: RetryPolicy,
}

impl Default for JobOptions {
	fn default() -> Self {
		Self {
			concurrency: "threads".to_string(),
			max_submitted_tasks: usize::MAX,
			chunksize: 1,
			retry_policy: RetryPolicy::default(),
		}
	}
}

/// Auto-select the backend (§4.4): a job with at most one task in its
/// largest generation, or a runtime configured for one worker, always runs
/// sequentially regardless of `options.concurrency`.
fn select_backend(options: &JobOptions, max_workers: usize, largest_generation: usize) -> &str {
	if largest_generation <= 1 || max_workers <= 1 {
		"sequential"
	} else {
		options.concurrency.as_str()
	}
}

fn generation_len(generation: &Generation) -> usize {
	match generation {
		Generation::Preprocessing(batch) => batch.len(),
		Generation::Tile(tile_gen) => tile_gen.batch.len(),
	}
}

/// Run a job end to end (§4.6): `parsing` → `initializing` → `running`,
/// looping back through `retrying` → `initializing` on a retry-eligible
/// failure, and ending in `done`, `failed` or `cancelled`.
pub async fn run_job(config: Arc<dyn JobConfig>, runtime: JobRuntime, observers: Vec<Arc<dyn Observer>>, options: JobOptions) -> anyhow::Result<Status> {
	log::info!("job starting");
	notify_all(&observers, &runtime, JobEvent::status(Status::Parsing))?;
	notify_all(&observers, &runtime, JobEvent::status(Status::Initializing))?;

	let total_tasks = config.preprocessing_tasks_count() + config.count_tiles();
	if total_tasks == 0 {
		log::debug!("job has no tasks, short-circuiting to done");
		notify_all(&observers, &runtime, JobEvent::status(Status::Done))?;
		return Ok(Status::Done);
	}

	let mut retries_left = options.retry_policy.retries;
	let mut attempt: u32 = 0;
	loop {
		attempt += 1;
		log::debug!("starting attempt {attempt}");
		let graph = graph::build_graph(config.clone())?;
		let largest = graph.generations.iter().map(generation_len).max().unwrap_or(0);
		let backend_name = select_backend(&options, runtime.concurrency().cpu_bound, largest).to_string();
		let executor = executor::backend_by_name(&backend_name, &runtime, Some(options.chunksize))?;

		notify_all(&observers, &runtime, JobEvent::status(Status::Running))?;
		let outcome = run_attempt(&graph, &runtime, &observers, &options, executor.as_ref(), total_tasks).await;

		match outcome {
			Ok(()) => {
				log::info!("job done after {attempt} attempt(s)");
				notify_all(&observers, &runtime, JobEvent::status(Status::PostProcessing))?;
				notify_all(&observers, &runtime, JobEvent::status(Status::Done))?;
				return Ok(Status::Done);
			}
			Err(err) if (options.retry_policy.cancel_on)(&err) => {
				log::error!("job cancelled: {err}");
				notify_all(&observers, &runtime, JobEvent::status(Status::Cancelled))?;
				return Err(err);
			}
			Err(err) if retries_left > 0 && (options.retry_policy.retry_on)(&err) => {
				retries_left -= 1;
				log::warn!("attempt {attempt} failed, retrying ({retries_left} retries left): {err}");
				notify_all(&observers, &runtime, JobEvent::status(Status::Failed))?;
				notify_all(&observers, &runtime, JobEvent::status(Status::Retrying))?;
				runtime.events().warn(format!("retrying after error: {err}"));
				notify_all(&observers, &runtime, JobEvent::status(Status::Initializing))?;
			}
			Err(err) => {
				log::error!("job failed after {attempt} attempt(s): {err}");
				notify_all(&observers, &runtime, JobEvent::status(Status::Failed))?;
				return Err(err);
			}
		}
	}
}

/// Run one attempt through every generation of `graph`, stopping at the
/// first failed or cancelled result (§4.7 "already-submitted work is drained
/// and its results discarded").
async fn run_attempt(
	graph: &graph::Graph,
	runtime: &JobRuntime,
	observers: &[Arc<dyn Observer>],
	options: &JobOptions,
	executor: &dyn Executor,
	total_tasks: usize,
) -> anyhow::Result<()> {
	let progress_handle = runtime.create_progress("processing", total_tasks as u64);
	let mut progress = Progress::new(total_tasks as u64);
	notify_all(observers, runtime, JobEvent::progress(progress))?;

	// The one preprocessing batch, kept around so baselevel tile generations
	// can spatially filter their candidate dependencies against it (§4.2,
	// §4.3), plus the completed results keyed by full task id.
	let preprocessing_batch = graph.generations.iter().find_map(|g| match g {
		Generation::Preprocessing(batch) => Some(batch),
		Generation::Tile(_) => None,
	});
	let mut preprocessing_results: HashMap<String, TaskResult> = HashMap::new();

	// Completed tile results, kept per zoom rather than as a single rolling
	// window: the graph builder emits baselevel zooms first, then ascends
	// above the highest one, then descends below the lowest one (§4.1), so
	// the first descending generation depends on a baselevel zoom's results
	// that were produced several generations earlier, not the immediately
	// preceding one. Keying by zoom lets each interpolated generation look up
	// exactly the zoom±1 it actually depends on instead of whatever ran right
	// before it.
	let mut tile_results_by_zoom: HashMap<u8, HashMap<TileAddress, TaskResult>> = HashMap::new();

	for generation in &graph.generations {
		match generation {
			Generation::Preprocessing(batch) => {
				let tasks: Vec<Task> = batch.ids().filter_map(|id| batch.get(id).cloned()).collect();
				let results = run_tasks_bounded(tasks, runtime, options, executor).await;
				for result in results {
					report_result(observers, runtime, &mut progress, &progress_handle, result.clone())?;
					bail_on_cancel_or_failure(&result)?;
					preprocessing_results.insert(result.id.clone(), result);
				}
			}
			Generation::Tile(tile_gen) => {
				let mut entries: Vec<(TileAddress, Task)> = tile_gen
					.batch
					.tiles()
					.filter_map(|tile| tile_gen.batch.get(tile).cloned().map(|task| (tile, task)))
					.collect();

				match tile_gen.role {
					TileBatchRole::Baselevel => {
						if let Some(pre_batch) = preprocessing_batch {
							for (_tile, task) in &mut entries {
								let Some(bounds) = task.bounds else { continue };
								let deps: HashMap<String, TaskResult> = pre_batch
									.intersection(bounds)
									.into_iter()
									.filter_map(|candidate| preprocessing_results.get(&candidate.id).map(|r| (candidate.id.clone(), r.clone())))
									.collect();
								task.add_dependencies(deps);
							}
						}
					}
					TileBatchRole::Interpolated(from) => {
						let needed_zoom = match from {
							InterpolateFrom::Higher => tile_gen.zoom - 1,
							InterpolateFrom::Lower => tile_gen.zoom + 1,
						};
						if let Some(source_results) = tile_results_by_zoom.get(&needed_zoom) {
							for (tile, task) in &mut entries {
								task.add_dependencies(resolver::interpolation_dependencies(*tile, from, source_results));
							}
						}
					}
				}

				let id_to_tile: HashMap<String, TileAddress> = entries.iter().map(|(tile, task)| (task.id.clone(), *tile)).collect();
				let tasks: Vec<Task> = entries.into_iter().map(|(_, task)| task).collect();
				let results = run_tasks_bounded(tasks, runtime, options, executor).await;

				let mut this_zoom_results: HashMap<TileAddress, TaskResult> = HashMap::new();
				for mut result in results {
					result.tile = id_to_tile.get(&result.id).copied();
					report_result(observers, runtime, &mut progress, &progress_handle, result.clone())?;
					bail_on_cancel_or_failure(&result)?;
					if let Some(tile) = result.tile {
						this_zoom_results.insert(tile, result);
					}
				}
				tile_results_by_zoom.insert(tile_gen.zoom, this_zoom_results);
			}
		}
	}

	progress_handle.finish();
	Ok(())
}

/// Submit `tasks` in chunks of at most `options.max_submitted_tasks`,
/// stopping before the next chunk once cancellation is observed (§4.4, §8
/// S5 "no more than `max_submitted_tasks` processed tasks beyond the
/// cancellation point").
async fn run_tasks_bounded(tasks: Vec<Task>, runtime: &JobRuntime, options: &JobOptions, executor: &dyn Executor) -> Vec<TaskResult> {
	let mut all_results = Vec::with_capacity(tasks.len());
	for chunk in tasks.chunks(options.max_submitted_tasks.max(1)) {
		if runtime.is_cancelled() {
			break;
		}
		let results = executor.run(chunk.to_vec(), runtime).await;
		let saw_cancellation = results.iter().any(|r| r.cancelled);
		all_results.extend(results);
		if saw_cancellation {
			runtime.cancel();
			break;
		}
	}
	all_results
}

fn report_result(
	observers: &[Arc<dyn Observer>],
	runtime: &JobRuntime,
	progress: &mut Progress,
	progress_handle: &crate::ProgressHandle,
	result: TaskResult,
) -> anyhow::Result<()> {
	notify_all(observers, runtime, JobEvent::task_result(result))?;
	progress.inc(1);
	progress_handle.inc(1);
	notify_all(observers, runtime, JobEvent::progress(*progress))?;
	Ok(())
}

fn bail_on_cancel_or_failure(result: &TaskResult) -> anyhow::Result<()> {
	if result.cancelled {
		anyhow::bail!(CancelledError);
	}
	if result.is_failure() {
		anyhow::bail!(EngineError::Executor(result.error.clone().unwrap_or_default()));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::MockJobConfig;
	use geotask_core::config::PreprocessingTaskSpec;
	use geotask_core::TaskOutput;
	use pretty_assertions::assert_eq;
	use std::sync::atomic::{AtomicU32, Ordering};
	use std::sync::Mutex;

	struct RecordingObserver {
		statuses: Mutex<Vec<Status>>,
		results: Mutex<Vec<TaskResult>>,
	}

	impl RecordingObserver {
		fn new() -> Arc<Self> {
			Arc::new(Self {
				statuses: Mutex::new(Vec::new()),
				results: Mutex::new(Vec::new()),
			})
		}
	}

	impl Observer for RecordingObserver {
		fn notify(&self, event: &JobEvent) -> anyhow::Result<()> {
			if let Some(status) = event.status {
				self.statuses.lock().unwrap().push(status);
			}
			if let Some(result) = &event.task_result {
				self.results.lock().unwrap().push(result.clone());
			}
			Ok(())
		}
	}

	#[tokio::test]
	async fn small_job_runs_to_completion() {
		let config: Arc<dyn JobConfig> = Arc::new(MockJobConfig::new().with_zoom_levels([4]));
		let runtime = JobRuntime::new_silent();
		let observer = RecordingObserver::new();
		let status = run_job(config, runtime, vec![observer.clone()], JobOptions::default()).await.unwrap();

		assert_eq!(status, Status::Done);
		let statuses = observer.statuses.lock().unwrap().clone();
		// S1's exact status trace (§8): no retry, no cancellation in the way.
		assert_eq!(statuses, vec![Status::Parsing, Status::Initializing, Status::Running, Status::PostProcessing, Status::Done]);

		let results = observer.results.lock().unwrap();
		assert!(results.iter().all(|r| r.processed));
	}

	#[tokio::test]
	async fn baselevel_interpolation_mosaics_finished_children() {
		// S2: baselevel at zoom 4, one zoom below it (3). Every zoom-3 tile's
		// four zoom-4 children must already be done (and reachable as
		// dependencies, not a fresh read) before the zoom-3 task runs.
		let config: Arc<dyn JobConfig> = Arc::new(MockJobConfig::new().with_zoom_levels([3, 4]));
		let runtime = JobRuntime::new_silent();
		let observer = RecordingObserver::new();
		let status = run_job(config, runtime, vec![observer.clone()], JobOptions::default()).await.unwrap();

		assert_eq!(status, Status::Done);
		let results = observer.results.lock().unwrap();
		assert!(results.iter().all(|r| r.processed));

		let zoom3_tile_id = TileAddress::new(3, 0, 0).task_id();
		let zoom3_result = results.iter().find(|r| r.id == zoom3_tile_id).expect("zoom 3 tile result present");
		assert_eq!(zoom3_result.output, TaskOutput::Value(serde_json::json!({"mosaicked_children": 4})));
	}

	#[tokio::test]
	async fn baselevel_interpolation_works_both_above_and_below() {
		// Generations run in order [4 (baselevel), 5, 6, 3] (§4.1): zoom 3 is
		// built four generations after zoom 4, so it must still mosaic zoom
		// 4's *own* children rather than whatever zoom ran immediately before
		// it (zoom 6). Exercises the default `MockJobConfig` shape (zooms
		// 3..=6, baselevel {4}) end to end.
		let config: Arc<dyn JobConfig> = Arc::new(MockJobConfig::new());
		let runtime = JobRuntime::new_silent();
		let observer = RecordingObserver::new();
		let status = run_job(config, runtime, vec![observer.clone()], JobOptions::default()).await.unwrap();

		assert_eq!(status, Status::Done);
		let results = observer.results.lock().unwrap();
		assert!(results.iter().all(|r| r.processed));

		let zoom3_tile_id = TileAddress::new(3, 0, 0).task_id();
		let zoom3_result = results.iter().find(|r| r.id == zoom3_tile_id).expect("zoom 3 tile result present");
		assert_eq!(zoom3_result.output, TaskOutput::Value(serde_json::json!({"mosaicked_children": 4})));

		// Zoom 5 ascends from zoom 4 (`InterpolateFrom::Higher`), which always
		// reads the parent from the output reader rather than a dependency
		// (§4.5 step 4); `MockJobConfig`'s reader was never written to, so this
		// is the no-data fallback, not a failure.
		let zoom5_tile_id = TileAddress::new(5, 0, 0).task_id();
		let zoom5_result = results.iter().find(|r| r.id == zoom5_tile_id).expect("zoom 5 tile result present");
		assert!(zoom5_result.processed);
		assert_eq!(zoom5_result.output, TaskOutput::Empty);
	}

	#[tokio::test]
	async fn preprocessing_result_reaches_baselevel_tile() {
		let received: Arc<Mutex<Option<serde_json::Value>>> = Arc::new(Mutex::new(None));
		let received_clone = received.clone();

		struct RecordingConfig {
			inner: MockJobConfig,
			received: Arc<Mutex<Option<serde_json::Value>>>,
		}

		impl JobConfig for RecordingConfig {
			fn process_pyramid(&self) -> &dyn geotask_core::TilePyramid {
				self.inner.process_pyramid()
			}
			fn output_pyramid(&self) -> &dyn geotask_core::TilePyramid {
				self.inner.output_pyramid()
			}
			fn zoom_levels(&self) -> &geotask_core::ZoomLevels {
				self.inner.zoom_levels()
			}
			fn baselevels(&self) -> Option<&geotask_core::BaselevelSpec> {
				self.inner.baselevels()
			}
			fn mode(&self) -> geotask_core::ProcessingMode {
				self.inner.mode()
			}
			fn preprocessing_tasks_count(&self) -> usize {
				1
			}
			fn preprocessing_tasks(&self) -> Vec<PreprocessingTaskSpec> {
				vec![PreprocessingTaskSpec {
					input_key: "dem".to_string(),
					task_key: "build_index".to_string(),
					bounds: None,
					func: Arc::new(|| Ok(TaskOutput::Value(serde_json::json!(42)))),
				}]
			}
			fn count_tiles(&self) -> usize {
				self.inner.count_tiles()
			}
			fn tiles_for_zoom(&self, zoom: u8) -> Vec<TileAddress> {
				self.inner.tiles_for_zoom(zoom)
			}
			fn get_inputs_for_tile(&self, _tile: TileAddress) -> HashMap<String, geotask_core::config::InputBinding> {
				let mut bindings = HashMap::new();
				bindings.insert(
					"dem".to_string(),
					geotask_core::config::InputBinding::new("dem", serde_json::Value::Null)
						.with_dependency_keys(["dem:build_index".to_string()]),
				);
				bindings
			}
			fn get_process_func_params(&self, zoom: u8) -> HashMap<String, serde_json::Value> {
				self.inner.get_process_func_params(zoom)
			}
			fn output_reader(&self) -> &dyn geotask_core::config::OutputReader {
				self.inner.output_reader()
			}
			fn output_params(&self) -> HashMap<String, serde_json::Value> {
				self.inner.output_params()
			}
			fn process(&self) -> geotask_core::config::ProcessFn {
				let received = self.received.clone();
				Arc::new(move |ctx| {
					let binding = &ctx.input["dem"];
					*received.lock().unwrap() = binding.preprocessing_results.get("build_index").and_then(|v| match v {
						TaskOutput::Value(v) => Some(v.clone()),
						TaskOutput::Empty => None,
					});
					Ok(TaskOutput::Value(serde_json::json!({"zoom": ctx.tile.zoom})))
				})
			}
			fn resample_from_parent(&self, tile: TileAddress, parent: TaskOutput, method: geotask_core::ResamplingMethod) -> anyhow::Result<TaskOutput> {
				self.inner.resample_from_parent(tile, parent, method)
			}
			fn resample_from_children(
				&self,
				tile: TileAddress,
				children: Vec<(TileAddress, TaskOutput)>,
				method: geotask_core::ResamplingMethod,
			) -> anyhow::Result<TaskOutput> {
				self.inner.resample_from_children(tile, children, method)
			}
		}

		let config: Arc<dyn JobConfig> = Arc::new(RecordingConfig {
			inner: MockJobConfig::new().with_zoom_levels([4]),
			received: received_clone,
		});
		let runtime = JobRuntime::new_silent();
		let status = run_job(config, runtime, Vec::new(), JobOptions::default()).await.unwrap();

		assert_eq!(status, Status::Done);
		assert_eq!(*received.lock().unwrap(), Some(serde_json::json!(42)));
	}

	#[tokio::test]
	async fn job_retries_then_succeeds() {
		let attempts = Arc::new(AtomicU32::new(0));
		let attempts_clone = attempts.clone();

		struct FlakyConfig {
			inner: MockJobConfig,
			attempts: Arc<AtomicU32>,
		}

		impl JobConfig for FlakyConfig {
			fn process_pyramid(&self) -> &dyn geotask_core::TilePyramid {
				self.inner.process_pyramid()
			}
			fn output_pyramid(&self) -> &dyn geotask_core::TilePyramid {
				self.inner.output_pyramid()
			}
			fn zoom_levels(&self) -> &geotask_core::ZoomLevels {
				self.inner.zoom_levels()
			}
			fn baselevels(&self) -> Option<&geotask_core::BaselevelSpec> {
				self.inner.baselevels()
			}
			fn mode(&self) -> geotask_core::ProcessingMode {
				self.inner.mode()
			}
			fn preprocessing_tasks_count(&self) -> usize {
				self.inner.preprocessing_tasks_count()
			}
			fn preprocessing_tasks(&self) -> Vec<PreprocessingTaskSpec> {
				self.inner.preprocessing_tasks()
			}
			fn count_tiles(&self) -> usize {
				1
			}
			fn tiles_for_zoom(&self, zoom: u8) -> Vec<TileAddress> {
				vec![TileAddress::new(zoom, 0, 0)]
			}
			fn get_inputs_for_tile(&self, tile: TileAddress) -> HashMap<String, geotask_core::config::InputBinding> {
				self.inner.get_inputs_for_tile(tile)
			}
			fn get_process_func_params(&self, zoom: u8) -> HashMap<String, serde_json::Value> {
				self.inner.get_process_func_params(zoom)
			}
			fn output_reader(&self) -> &dyn geotask_core::config::OutputReader {
				self.inner.output_reader()
			}
			fn output_params(&self) -> HashMap<String, serde_json::Value> {
				self.inner.output_params()
			}
			fn process(&self) -> geotask_core::config::ProcessFn {
				let attempts = self.attempts.clone();
				Arc::new(move |ctx| {
					if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
						anyhow::bail!("transient failure");
					}
					Ok(TaskOutput::Value(serde_json::json!({"zoom": ctx.tile.zoom})))
				})
			}
			fn resample_from_parent(&self, tile: TileAddress, parent: TaskOutput, method: geotask_core::ResamplingMethod) -> anyhow::Result<TaskOutput> {
				self.inner.resample_from_parent(tile, parent, method)
			}
			fn resample_from_children(
				&self,
				tile: TileAddress,
				children: Vec<(TileAddress, TaskOutput)>,
				method: geotask_core::ResamplingMethod,
			) -> anyhow::Result<TaskOutput> {
				self.inner.resample_from_children(tile, children, method)
			}
		}

		let config: Arc<dyn JobConfig> = Arc::new(FlakyConfig {
			inner: MockJobConfig::new().with_zoom_levels([4]),
			attempts: attempts_clone,
		});
		let runtime = JobRuntime::new_silent();
		let observer = RecordingObserver::new();
		let mut options = JobOptions::default();
		options.retry_policy.retries = 1;
		let status = run_job(config, runtime, vec![observer.clone()], options).await.unwrap();

		assert_eq!(status, Status::Done);
		assert_eq!(attempts.load(Ordering::SeqCst), 2);
		let statuses = observer.statuses.lock().unwrap().clone();
		assert_eq!(statuses.iter().filter(|s| **s == Status::Retrying).count(), 1);
	}

	#[tokio::test]
	async fn job_fails_without_retries_left() {
		struct AlwaysFailConfig {
			inner: MockJobConfig,
		}

		impl JobConfig for AlwaysFailConfig {
			fn process_pyramid(&self) -> &dyn geotask_core::TilePyramid {
				self.inner.process_pyramid()
			}
			fn output_pyramid(&self) -> &dyn geotask_core::TilePyramid {
				self.inner.output_pyramid()
			}
			fn zoom_levels(&self) -> &geotask_core::ZoomLevels {
				self.inner.zoom_levels()
			}
			fn baselevels(&self) -> Option<&geotask_core::BaselevelSpec> {
				self.inner.baselevels()
			}
			fn mode(&self) -> geotask_core::ProcessingMode {
				self.inner.mode()
			}
			fn preprocessing_tasks_count(&self) -> usize {
				self.inner.preprocessing_tasks_count()
			}
			fn preprocessing_tasks(&self) -> Vec<PreprocessingTaskSpec> {
				self.inner.preprocessing_tasks()
			}
			fn count_tiles(&self) -> usize {
				1
			}
			fn tiles_for_zoom(&self, zoom: u8) -> Vec<TileAddress> {
				vec![TileAddress::new(zoom, 0, 0)]
			}
			fn get_inputs_for_tile(&self, tile: TileAddress) -> HashMap<String, geotask_core::config::InputBinding> {
				self.inner.get_inputs_for_tile(tile)
			}
			fn get_process_func_params(&self, zoom: u8) -> HashMap<String, serde_json::Value> {
				self.inner.get_process_func_params(zoom)
			}
			fn output_reader(&self) -> &dyn geotask_core::config::OutputReader {
				self.inner.output_reader()
			}
			fn output_params(&self) -> HashMap<String, serde_json::Value> {
				self.inner.output_params()
			}
			fn process(&self) -> geotask_core::config::ProcessFn {
				Arc::new(|_ctx| anyhow::bail!("permanent failure"))
			}
			fn resample_from_parent(&self, tile: TileAddress, parent: TaskOutput, method: geotask_core::ResamplingMethod) -> anyhow::Result<TaskOutput> {
				self.inner.resample_from_parent(tile, parent, method)
			}
			fn resample_from_children(
				&self,
				tile: TileAddress,
				children: Vec<(TileAddress, TaskOutput)>,
				method: geotask_core::ResamplingMethod,
			) -> anyhow::Result<TaskOutput> {
				self.inner.resample_from_children(tile, children, method)
			}
		}

		let config: Arc<dyn JobConfig> = Arc::new(AlwaysFailConfig {
			inner: MockJobConfig::new().with_zoom_levels([4]),
		});
		let runtime = JobRuntime::new_silent();
		let observer = RecordingObserver::new();
		let err = run_job(config, runtime, vec![observer.clone()], JobOptions::default()).await.unwrap_err();

		assert!(err.to_string().contains("permanent failure"));
		let statuses = observer.statuses.lock().unwrap().clone();
		assert_eq!(statuses.last(), Some(&Status::Failed));
	}

	#[tokio::test]
	async fn cancellation_stops_further_submission() {
		struct CancellingConfig {
			inner: MockJobConfig,
			cancel_after: Arc<AtomicU32>,
		}

		impl JobConfig for CancellingConfig {
			fn process_pyramid(&self) -> &dyn geotask_core::TilePyramid {
				self.inner.process_pyramid()
			}
			fn output_pyramid(&self) -> &dyn geotask_core::TilePyramid {
				self.inner.output_pyramid()
			}
			fn zoom_levels(&self) -> &geotask_core::ZoomLevels {
				self.inner.zoom_levels()
			}
			fn baselevels(&self) -> Option<&geotask_core::BaselevelSpec> {
				self.inner.baselevels()
			}
			fn mode(&self) -> geotask_core::ProcessingMode {
				self.inner.mode()
			}
			fn preprocessing_tasks_count(&self) -> usize {
				self.inner.preprocessing_tasks_count()
			}
			fn preprocessing_tasks(&self) -> Vec<PreprocessingTaskSpec> {
				self.inner.preprocessing_tasks()
			}
			fn count_tiles(&self) -> usize {
				self.inner.count_tiles()
			}
			fn tiles_for_zoom(&self, zoom: u8) -> Vec<TileAddress> {
				self.inner.tiles_for_zoom(zoom)
			}
			fn get_inputs_for_tile(&self, tile: TileAddress) -> HashMap<String, geotask_core::config::InputBinding> {
				self.inner.get_inputs_for_tile(tile)
			}
			fn get_process_func_params(&self, zoom: u8) -> HashMap<String, serde_json::Value> {
				self.inner.get_process_func_params(zoom)
			}
			fn output_reader(&self) -> &dyn geotask_core::config::OutputReader {
				self.inner.output_reader()
			}
			fn output_params(&self) -> HashMap<String, serde_json::Value> {
				self.inner.output_params()
			}
			fn process(&self) -> geotask_core::config::ProcessFn {
				let cancel_after = self.cancel_after.clone();
				Arc::new(move |ctx| {
					if ctx.tile.row == 0 && ctx.tile.column == 0 {
						let _ = cancel_after.fetch_add(1, Ordering::SeqCst);
						return Err(anyhow::Error::new(CancelledError));
					}
					Ok(TaskOutput::Value(serde_json::json!({"zoom": ctx.tile.zoom})))
				})
			}
			fn resample_from_parent(&self, tile: TileAddress, parent: TaskOutput, method: geotask_core::ResamplingMethod) -> anyhow::Result<TaskOutput> {
				self.inner.resample_from_parent(tile, parent, method)
			}
			fn resample_from_children(
				&self,
				tile: TileAddress,
				children: Vec<(TileAddress, TaskOutput)>,
				method: geotask_core::ResamplingMethod,
			) -> anyhow::Result<TaskOutput> {
				self.inner.resample_from_children(tile, children, method)
			}
		}

		let config: Arc<dyn JobConfig> = Arc::new(CancellingConfig {
			inner: MockJobConfig::new().with_zoom_levels([4]),
			cancel_after: Arc::new(AtomicU32::new(0)),
		});
		let runtime = JobRuntime::new_silent();
		let observer = RecordingObserver::new();
		let err = run_job(config, runtime, vec![observer.clone()], JobOptions::default()).await.unwrap_err();

		assert!(geotask_core::error::is_cancelled(&err));
		let statuses = observer.statuses.lock().unwrap().clone();
		assert_eq!(statuses.last(), Some(&Status::Cancelled));
	}
}
