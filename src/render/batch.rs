use std::collections::BTreeMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::compile::CompileContext;
use crate::error::{Result, StencilError};
use crate::model::Model;
use crate::plan::{Plan, PlannedFile};
use crate::template::TemplateFolders;

use super::{render_template, RenderError};

/// One template to render, already loaded.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub template: String,
    pub text: Arc<str>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Worker threads; `None` lets rayon pick.
    pub jobs: Option<usize>,
    /// Stop waiting for results after this long.
    pub timeout: Option<Duration>,
}

/// A planned file together with its render result.
#[derive(Debug)]
pub struct RenderedFile {
    pub file: PlannedFile,
    pub result: std::result::Result<String, RenderError>,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// In plan order.
    pub files: Vec<RenderedFile>,
}

impl BatchOutcome {
    pub fn failures(&self) -> impl Iterator<Item = (&PlannedFile, &RenderError)> {
        self.files
            .iter()
            .filter_map(|r| r.result.as_ref().err().map(|e| (&r.file, e)))
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }
}

/// Render every file of a plan on a worker pool.
///
/// All templates are loaded before any rendering starts, so a missing
/// template aborts the whole batch. After that each file succeeds or fails
/// on its own.
pub fn render_plan(
    ctx: Arc<CompileContext>,
    plan: &Plan,
    model: Arc<Model>,
    folders: &TemplateFolders,
    options: &BatchOptions,
) -> Result<BatchOutcome> {
    let mut loaded: BTreeMap<&str, Arc<str>> = BTreeMap::new();
    let mut jobs = Vec::with_capacity(plan.files.len());
    for planned in &plan.files {
        let id = planned.file.template.as_str();
        let text = match loaded.get(id) {
            Some(text) => Arc::clone(text),
            None => {
                let text: Arc<str> = Arc::from(folders.load(id)?);
                loaded.insert(id, Arc::clone(&text));
                text
            }
        };
        jobs.push(RenderJob {
            template: id.to_string(),
            text,
        });
    }

    let results = render_batch(ctx, model, jobs, options)?;
    let files = plan
        .files
        .iter()
        .cloned()
        .zip(results)
        .map(|(file, result)| RenderedFile { file, result })
        .collect();
    Ok(BatchOutcome { files })
}

/// Run independent render jobs concurrently, returning results in job order.
pub fn render_batch(
    ctx: Arc<CompileContext>,
    model: Arc<Model>,
    jobs: Vec<RenderJob>,
    options: &BatchOptions,
) -> Result<Vec<std::result::Result<String, RenderError>>> {
    let total = jobs.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    let mut builder = rayon::ThreadPoolBuilder::new()
        .thread_name(|i| format!("stencil-render-{i}"))
        .panic_handler(|_| tracing::error!("render worker panicked"));
    if let Some(n) = options.jobs {
        builder = builder.num_threads(n);
    }
    let pool = builder
        .build()
        .map_err(|source| StencilError::WorkerPool { source })?;

    tracing::debug!(files = total, threads = pool.current_num_threads(), "rendering batch");

    let (tx, rx) = mpsc::channel();
    for (index, job) in jobs.into_iter().enumerate() {
        let tx = tx.clone();
        let ctx = Arc::clone(&ctx);
        let model = Arc::clone(&model);
        pool.spawn(move || {
            let result = render_template(&ctx, &job.template, &job.text, &model);
            // the receiver is gone only after a timeout
            let _ = tx.send((index, result));
        });
    }
    drop(tx);

    let deadline = options.timeout.map(|t| Instant::now() + t);
    let mut results: Vec<Option<std::result::Result<String, RenderError>>> =
        (0..total).map(|_| None).collect();
    let mut received = 0;

    while received < total {
        let message = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match rx.recv_timeout(remaining) {
                    Ok(message) => message,
                    Err(RecvTimeoutError::Timeout) => {
                        tracing::warn!(pending = total - received, "render batch timed out");
                        return Err(StencilError::Timeout {
                            seconds: options.timeout.map_or(0, |t| t.as_secs()),
                        });
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(message) => message,
                Err(_) => break,
            },
        };
        let (index, result) = message;
        results[index] = Some(result);
        received += 1;
    }

    if received < total {
        return Err(StencilError::WorkerLost {
            missing: total - received,
        });
    }
    Ok(results.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelBinder;

    fn job(template: &str, text: &str) -> RenderJob {
        RenderJob {
            template: template.to_string(),
            text: Arc::from(text),
        }
    }

    fn model() -> Arc<Model> {
        Arc::new(ModelBinder::new().bind("name", "Shop").build().unwrap())
    }

    #[test]
    fn test_results_keep_job_order() {
        let jobs: Vec<_> = (0..32)
            .map(|i| job(&format!("t{i}"), &format!("{i}:<%= model.name %>")))
            .collect();
        let options = BatchOptions {
            jobs: Some(4),
            timeout: None,
        };
        let results = render_batch(Arc::new(CompileContext::default()), model(), jobs, &options)
            .unwrap();
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.as_ref().unwrap(), &format!("{i}:Shop"));
        }
    }

    #[test]
    fn test_failure_is_isolated() {
        let jobs = vec![
            job("ok.tpl", "fine"),
            job("bad.tpl", "<%= model.missing %>"),
            job("broken.tpl", "<%= 1 + %>"),
            job("also_ok.tpl", "<%= model.name %>"),
        ];
        let results = render_batch(
            Arc::new(CompileContext::default()),
            model(),
            jobs,
            &BatchOptions::default(),
        )
        .unwrap();
        assert_eq!(results[0].as_ref().unwrap(), "fine");
        assert!(matches!(results[1], Err(RenderError::Execution(_))));
        assert!(matches!(results[2], Err(RenderError::Compile(_))));
        assert_eq!(results[3].as_ref().unwrap(), "Shop");
    }

    #[test]
    fn test_timeout_abandons_batch() {
        let ctx = CompileContext::new(crate::compile::EngineLimits {
            max_operations: 0,
            ..Default::default()
        });
        let jobs = vec![job(
            "spin.tpl",
            "<% let n = 0; while n < 50000000 { n += 1; } %>",
        )];
        let options = BatchOptions {
            jobs: Some(1),
            timeout: Some(Duration::from_millis(50)),
        };
        let err = render_batch(Arc::new(ctx), model(), jobs, &options).unwrap_err();
        assert!(matches!(err, StencilError::Timeout { .. }));
    }

    #[test]
    fn test_empty_batch() {
        let results = render_batch(
            Arc::new(CompileContext::default()),
            model(),
            Vec::new(),
            &BatchOptions::default(),
        )
        .unwrap();
        assert!(results.is_empty());
    }
}
