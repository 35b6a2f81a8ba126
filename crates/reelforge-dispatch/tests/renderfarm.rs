//! Render farm dispatch against a recording farm manager.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use reelforge_common::Result;
use reelforge_crawler::Crawler;
use reelforge_dispatch::{
    Dispatcher, FarmManager, JobData, JobKind, JobSubmission, RenderfarmDispatcher,
};
use reelforge_task::{Context, CrawlerMatcher, TaskHolder};
use serde_json::json;

/// Hands out `job-1`, `job-2`, ... and remembers every call.
#[derive(Default)]
struct RecordingManager {
    submitted: Mutex<Vec<(String, JobSubmission)>>,
    extended: Mutex<Vec<(String, Vec<String>)>>,
}

impl RecordingManager {
    fn submissions(&self) -> Vec<(String, JobSubmission)> {
        self.submitted.lock().clone()
    }

    fn job_file(&self, id: &str) -> PathBuf {
        self.submitted
            .lock()
            .iter()
            .find(|(job_id, _)| job_id == id)
            .map(|(_, job)| job.job_file.clone())
            .unwrap()
    }
}

impl FarmManager for RecordingManager {
    fn submit(&self, job: &JobSubmission) -> Result<String> {
        let mut submitted = self.submitted.lock();
        let id = format!("job-{}", submitted.len() + 1);
        submitted.push((id.clone(), job.clone()));
        Ok(id)
    }

    fn extend_dependency_ids(&self, job_id: &str, dependency_ids: &[String]) -> Result<()> {
        self.extended
            .lock()
            .push((job_id.to_string(), dependency_ids.to_vec()));
        Ok(())
    }
}

fn frames(ctx: &Context) -> Vec<Crawler> {
    (1001..=1010)
        .map(|frame| {
            ctx.crawlers
                .create(format!("/plates/shot_010.{frame}.exr").as_str(), None)
                .unwrap()
        })
        .collect()
}

fn dispatcher(
    job_dir: &tempfile::TempDir,
    extra: serde_json::Value,
) -> (RenderfarmDispatcher, Arc<RecordingManager>) {
    let mut options = json!({ "jobDirectory": job_dir.path().to_string_lossy() });
    if let (Some(options), Some(extra)) = (options.as_object_mut(), extra.as_object()) {
        options.extend(extra.clone());
    }
    let manager = Arc::new(RecordingManager::default());
    let dispatcher = RenderfarmDispatcher::with_manager(options.as_object().unwrap(), manager.clone());
    (dispatcher, manager)
}

/// A 10 frame convert split in chunks of 4, a review holder and an
/// awaiting publish holder.
fn split_tree(ctx: &Context) -> TaskHolder {
    let mut task = ctx.tasks.create("dummy").unwrap();
    task.set_metadata("dispatch.split", true);
    task.set_metadata("dispatch.splitSize", 4);
    let mut top = TaskHolder::new(task, "/out/{name}.{frame}.exr", CrawlerMatcher::default());

    top.add_sub_holder(TaskHolder::new(
        ctx.tasks.create("dummy").unwrap(),
        "/review/{name}.{frame}.jpg",
        CrawlerMatcher::default(),
    ));

    let mut publish = ctx.tasks.create("dummy").unwrap();
    publish.set_metadata("dispatch.await", true);
    top.add_sub_holder(TaskHolder::new(
        publish,
        "/publish/{name}.{frame}.exr",
        CrawlerMatcher::default(),
    ));
    top
}

#[test]
fn split_holder_submits_chunks_then_collapsed_jobs() {
    let ctx = Context::with_builtins().unwrap();
    let job_dir = tempfile::tempdir().unwrap();
    let (dispatcher, manager) = dispatcher(&job_dir, json!({}));

    let ids = dispatcher.dispatch(&ctx, &split_tree(&ctx), &frames(&ctx)).unwrap();
    assert_eq!(ids, vec!["job-1", "job-2", "job-3", "job-4", "job-5"]);

    let submissions = manager.submissions();
    for (_, job) in &submissions[..3] {
        assert!(job.dependency_ids.is_empty());
    }
    assert_eq!(submissions[3].1.dependency_ids, vec!["job-1", "job-2", "job-3"]);
    assert_eq!(submissions[4].1.dependency_ids, vec!["job-4"]);

    let sizes: Vec<usize> = submissions[..3]
        .iter()
        .map(|(_, job)| match JobData::read(&job.job_file).unwrap().kind {
            JobKind::Expanded { chunk_size, .. } => chunk_size,
            other => panic!("unexpected job kind: {other:?}"),
        })
        .collect();
    assert_eq!(sizes, vec![4, 4, 2]);

    let first = JobData::read(&submissions[0].1.job_file).unwrap();
    assert_eq!(first.job_id.as_deref(), Some("job-1"));
    assert!(first.task_holder.sub_task_holders.is_empty());
}

#[test]
fn await_holder_waits_on_expanded_jobs_without_siblings() {
    let ctx = Context::with_builtins().unwrap();
    let job_dir = tempfile::tempdir().unwrap();
    let (dispatcher, manager) = dispatcher(&job_dir, json!({}));

    let mut top = TaskHolder::new(
        ctx.tasks.create("dummy").unwrap(),
        "/out/{name}.{frame}.exr",
        CrawlerMatcher::default(),
    );
    for target in ["/a/{name}.{frame}.exr", "/b/{name}.{frame}.exr"] {
        let mut task = ctx.tasks.create("dummy").unwrap();
        task.set_metadata("dispatch.await", true);
        top.add_sub_holder(TaskHolder::new(task, target, CrawlerMatcher::default()));
    }

    let ids = dispatcher.dispatch(&ctx, &top, &frames(&ctx)).unwrap();
    assert_eq!(ids.len(), 3);

    let submissions = manager.submissions();
    assert_eq!(submissions[1].1.dependency_ids, vec!["job-1"]);
    assert_eq!(submissions[2].1.dependency_ids, vec!["job-2"]);
}

#[test]
fn no_match_submits_nothing() {
    let ctx = Context::with_builtins().unwrap();
    let job_dir = tempfile::tempdir().unwrap();
    let (dispatcher, manager) = dispatcher(&job_dir, json!({}));

    let ids = dispatcher.dispatch(&ctx, &split_tree(&ctx), &[]).unwrap();
    assert!(ids.is_empty());
    assert!(manager.submissions().is_empty());
}

#[test]
fn expand_on_the_farm_submits_a_single_collapsed_job() {
    let ctx = Context::with_builtins().unwrap();
    let job_dir = tempfile::tempdir().unwrap();
    let (dispatcher, manager) = dispatcher(&job_dir, json!({ "expandOnTheFarm": true }));

    let ids = dispatcher.dispatch(&ctx, &split_tree(&ctx), &frames(&ctx)).unwrap();
    assert_eq!(ids, vec!["job-1"]);

    let data = JobData::read(&manager.job_file("job-1")).unwrap();
    assert_eq!(data.task_holder.sub_task_holders.len(), 2);
    assert_eq!(data.dispatcher.options["expandOnTheFarm"], json!(false));
    match data.kind {
        JobKind::Collapsed {
            task_input_file_paths,
            dependency_ids,
        } => {
            assert_eq!(task_input_file_paths.len(), 1);
            assert!(task_input_file_paths[0].exists());
            assert!(dependency_ids.is_empty());
        }
        other => panic!("unexpected job kind: {other:?}"),
    }

    // The farm node expands the tree and extends the collapsed job.
    let new_ids = dispatcher
        .run_job(&ctx, &manager.job_file("job-1"), None)
        .unwrap();
    assert_eq!(new_ids, vec!["job-2", "job-3", "job-4", "job-5", "job-6"]);
    assert_eq!(
        manager.extended.lock().clone(),
        vec![("job-1".to_string(), new_ids.clone())]
    );
}

#[test]
fn farm_jobs_run_chunks_then_collapsed_job_once() {
    let ctx = Context::with_builtins().unwrap();
    let job_dir = tempfile::tempdir().unwrap();
    let (dispatcher, manager) = dispatcher(&job_dir, json!({}));
    dispatcher.dispatch(&ctx, &split_tree(&ctx), &frames(&ctx)).unwrap();

    for id in ["job-1", "job-2", "job-3"] {
        let ids = dispatcher.run_job(&ctx, &manager.job_file(id), None).unwrap();
        assert!(ids.is_empty());
    }
    let result = manager.job_file("job-3").with_file_name("result.json");
    let outputs = reelforge_task::wrapper::read_result_file(&ctx, &result).unwrap();
    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0].file_path(), "/out/shot_010.1009.exr");

    let review = manager.job_file("job-4");
    let ids = dispatcher.run_job(&ctx, &review, Some("job-4")).unwrap();
    assert_eq!(ids, vec!["job-6"]);
    assert_eq!(
        manager.extended.lock().clone(),
        vec![("job-4".to_string(), vec!["job-6".to_string()])]
    );

    let expanded = JobData::read(&manager.job_file("job-6")).unwrap();
    assert_eq!(expanded.task_holder.task.crawler_data.len(), 10);

    // Re-triggered after its new dependencies finish: nothing more to do.
    let again = dispatcher.run_job(&ctx, &review, Some("job-4")).unwrap();
    assert!(again.is_empty());
    assert_eq!(manager.submissions().len(), 6);
    assert_eq!(manager.extended.lock().len(), 1);
}
