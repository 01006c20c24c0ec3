use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use super::*;
use crate::runners::{DefaultRunnerFactory, ModelRunner, RunnerError};

type Events = Rc<RefCell<Vec<String>>>;

#[derive(Clone, Copy)]
enum Behavior {
    Echo,
    FailLoad,
    FailPage(u32),
}

struct FakeRunner {
    name: String,
    behavior: Behavior,
    events: Events,
}

impl ModelRunner for FakeRunner {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&mut self) -> Result<(), RunnerError> {
        self.events.borrow_mut().push(format!("load {}", self.name));
        match self.behavior {
            Behavior::FailLoad => Err(RunnerError::Init("model weights not found".to_string())),
            _ => Ok(()),
        }
    }

    fn transcribe(&mut self, page: &Page) -> Result<String, RunnerError> {
        self.events
            .borrow_mut()
            .push(format!("transcribe {} {}", self.name, page.index));
        match self.behavior {
            Behavior::FailPage(index) if index == page.index => {
                Err(RunnerError::Network("connection reset".to_string()))
            }
            _ => Ok(format!("hello page {}", page.index)),
        }
    }

    fn release(&mut self) {
        self.events.borrow_mut().push(format!("release {}", self.name));
    }
}

struct FakeFactory {
    events: Events,
}

impl FakeFactory {
    fn new() -> Self {
        Self {
            events: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }
}

impl RunnerFactory for FakeFactory {
    fn build(&self, spec: &ModelSpec) -> Result<Box<dyn ModelRunner>, RunnerError> {
        let behavior = match spec.runner.as_str() {
            "echo" => Behavior::Echo,
            "broken" => Behavior::FailLoad,
            "flaky" => Behavior::FailPage(2),
            _ => return DefaultRunnerFactory::default().build(spec),
        };
        Ok(Box::new(FakeRunner {
            name: spec.name.clone(),
            behavior,
            events: Rc::clone(&self.events),
        }))
    }
}

fn spec(name: &str, runner: &str) -> ModelSpec {
    let mut spec = ModelSpec::new(name);
    spec.runner = runner.to_string();
    spec
}

fn pages(indices: &[u32]) -> Vec<Page> {
    indices
        .iter()
        .map(|&index| Page {
            index,
            image_path: PathBuf::from(format!("page-{index}.png")),
        })
        .collect()
}

fn ground_truth() -> GroundTruth {
    let mut gt = GroundTruth::new();
    gt.insert(1, "hello page 1");
    gt.insert(2, "hello page 2");
    gt.insert(3, "hello page 3");
    gt
}

#[test]
fn no_enabled_models_yields_empty_summary() {
    let dir = tempfile::tempdir().expect("tempdir");
    let factory = FakeFactory::new();
    let mut log = RunLog::new();

    let rows = run(&[], &pages(&[1, 2]), &ground_truth(), dir.path(), &factory, &mut log);

    assert!(rows.is_empty());
    assert!(factory.events().is_empty());
    assert!(
        log.entries()
            .iter()
            .any(|entry| entry.contains("no models enabled"))
    );
}

#[test]
fn init_failure_skips_model_and_keeps_going() {
    let dir = tempfile::tempdir().expect("tempdir");
    let factory = FakeFactory::new();
    let mut log = RunLog::new();
    let models = vec![spec("broken-vlm", "broken"), spec("tesseract", "echo")];

    let rows = run(&models, &pages(&[1, 2]), &ground_truth(), dir.path(), &factory, &mut log);

    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.model == "tesseract"));
    assert!(rows.iter().all(|row| row.cer == 0.0 && row.error.is_none()));
    assert!(!dir.path().join("broken-vlm").exists());
    assert!(
        log.entries()
            .iter()
            .any(|entry| entry.contains("model broken-vlm: skipped") && entry.contains("weights"))
    );
}

#[test]
fn unknown_runner_is_skipped_with_reason() {
    let dir = tempfile::tempdir().expect("tempdir");
    let factory = FakeFactory::new();
    let mut log = RunLog::new();

    let rows = run(
        &[spec("mystery", "abbyy")],
        &pages(&[1]),
        &ground_truth(),
        dir.path(),
        &factory,
        &mut log,
    );

    assert!(rows.is_empty());
    assert!(
        log.entries()
            .iter()
            .any(|entry| entry.contains("unknown runner 'abbyy'"))
    );
}

#[test]
fn missing_credential_skips_cloud_model_only() {
    let dir = tempfile::tempdir().expect("tempdir");
    let factory = FakeFactory::new();
    let mut log = RunLog::new();
    let models = vec![spec("gemini-2.5-flash", "gemini_api"), spec("tesseract", "echo")];

    let rows = run(&models, &pages(&[1, 2]), &ground_truth(), dir.path(), &factory, &mut log);

    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.model == "tesseract"));
    assert!(log.entries().iter().any(|entry| {
        entry.contains("model gemini-2.5-flash: skipped") && entry.contains("GOOGLE_API_KEY")
    }));
}

#[test]
fn page_failure_is_recorded_and_remaining_pages_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let factory = FakeFactory::new();
    let mut log = RunLog::new();

    let rows = run(
        &[spec("gemini", "flaky")],
        &pages(&[1, 2, 3]),
        &ground_truth(),
        dir.path(),
        &factory,
        &mut log,
    );

    assert_eq!(rows.len(), 3);
    let failed = &rows[1];
    assert_eq!(failed.page, 2);
    assert_eq!(failed.hyp_len_chars, 0);
    assert_eq!(failed.cer, 1.0);
    assert!(
        failed
            .error
            .as_deref()
            .is_some_and(|error| error.contains("connection reset"))
    );
    assert_eq!(rows[2].error, None);

    let persisted = fs::read_to_string(dir.path().join("gemini").join("page_2.txt"))
        .expect("failed page should still be persisted");
    assert!(persisted.starts_with("[OCR_ERROR: "));
    assert_eq!(
        fs::read_to_string(dir.path().join("gemini").join("page_3.txt")).expect("page 3"),
        "hello page 3"
    );
    assert!(
        log.entries()
            .iter()
            .any(|entry| entry.contains("page 2 failed"))
    );
}

#[test]
fn rows_follow_model_then_page_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let factory = FakeFactory::new();
    let mut log = RunLog::new();
    let models = vec![spec("easyocr", "echo"), spec("tesseract", "echo")];

    let rows = run(&models, &pages(&[3, 1, 2]), &ground_truth(), dir.path(), &factory, &mut log);

    let order: Vec<(String, u32)> = rows.iter().map(|row| (row.model.clone(), row.page)).collect();
    assert_eq!(
        order,
        vec![
            ("easyocr".to_string(), 1),
            ("easyocr".to_string(), 2),
            ("easyocr".to_string(), 3),
            ("tesseract".to_string(), 1),
            ("tesseract".to_string(), 2),
            ("tesseract".to_string(), 3),
        ]
    );
}

#[test]
fn each_runner_is_released_before_the_next_loads() {
    let dir = tempfile::tempdir().expect("tempdir");
    let factory = FakeFactory::new();
    let mut log = RunLog::new();
    let models = vec![spec("a", "echo"), spec("b", "broken"), spec("c", "echo")];

    run(&models, &pages(&[1]), &ground_truth(), dir.path(), &factory, &mut log);

    assert_eq!(
        factory.events(),
        vec![
            "load a",
            "transcribe a 1",
            "release a",
            "load b",
            "release b",
            "load c",
            "transcribe c 1",
            "release c",
        ]
    );
}

#[test]
fn missing_ground_truth_page_scores_against_empty_reference() {
    let dir = tempfile::tempdir().expect("tempdir");
    let factory = FakeFactory::new();
    let mut log = RunLog::new();

    let rows = run(
        &[spec("tesseract", "echo")],
        &pages(&[7]),
        &ground_truth(),
        dir.path(),
        &factory,
        &mut log,
    );

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].gt_len_chars, 0);
    assert_eq!(rows[0].cer, 1.0);
    assert_eq!(rows[0].wer, 1.0);
}

#[test]
fn model_names_become_safe_folder_names() {
    let out = Path::new("results");
    assert_eq!(model_output_dir(out, "gemini-2.5-flash"), out.join("gemini-2.5-flash"));
    assert_eq!(model_output_dir(out, "org/model:7b"), out.join("org_model_7b"));
    assert_eq!(model_output_dir(out, ".."), out.join("model"));
}
