//! Tests for the resource loader module.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use minijinja::Value;
use serde_json::json;
use tempfile::TempDir;

use super::watcher::{dispatch, dispatch_tree, handle_fs_event, WatchPatterns};
use super::*;
use crate::category::Category;
use crate::engine::{Engine, JinjaEngine};
use crate::modules::{Export, ExprModules, ModuleTable};
use crate::options::{Log, SilentLog, ViewOptions};
use crate::settings::Settings;

#[derive(Clone, Default)]
struct RecordingLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl RecordingLog {
    fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl Log for RecordingLog {
    fn error(&self, message: &str) {
        self.lines.lock().unwrap().push(format!("error: {}", message));
    }

    fn info(&self, message: &str) {
        self.lines.lock().unwrap().push(format!("info: {}", message));
    }
}

struct Fixture {
    _dir: TempDir,
    root: std::path::PathBuf,
    log: RecordingLog,
    engine: Arc<JinjaEngine>,
    modules: ModuleTable,
    loader: Loader,
}

impl Fixture {
    fn with_options(configure: impl FnOnce(ViewOptions) -> ViewOptions) -> Self {
        let dir = TempDir::new().expect("create tempdir");
        let root = dir.path().canonicalize().unwrap();
        for sub in ["filter", "helper", "template"] {
            fs::create_dir_all(root.join(sub)).unwrap();
        }
        let log = RecordingLog::default();
        let options = configure(ViewOptions::new().view_dir(&root).log(log.clone()));
        let engine = Arc::new(JinjaEngine::new());
        let modules = ModuleTable::new();
        let loader = Loader::new(
            Arc::new(Settings::new(options)),
            engine.clone(),
            Arc::new(modules.clone()),
        );
        Self {
            _dir: dir,
            root,
            log,
            engine,
            modules,
            loader,
        }
    }

    fn new() -> Self {
        Self::with_options(|options| options)
    }

    fn path(&self, relative: &str) -> std::path::PathBuf {
        self.root.join(relative)
    }

    fn write(&self, relative: &str, contents: &str) {
        let path = self.path(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn module(&self, relative: &str, export: Export) {
        self.modules.insert(self.path(relative), export);
    }

    fn render(&self, source: &str, context: serde_json::Value) -> String {
        self.engine.add_template("__inline", source).unwrap();
        self.engine.render("__inline", &context).unwrap()
    }
}

fn upper() -> Export {
    Export::function(|args: &[Value]| {
        Ok(Value::from(args[0].as_str().unwrap_or_default().to_uppercase()))
    })
}

// ── Single-resource loaders ───────────────────────────────────

#[test]
fn function_module_registers_filter() {
    let fx = Fixture::new();
    fx.module("filter/upper", upper());

    assert!(fx.loader.load_filter("upper"));
    assert!(fx.engine.has_filter("upper"));
    assert_eq!(fx.render("{{ 'hi' | upper }}", json!({})), "HI");
    assert_eq!(fx.log.lines(), vec!["info: Filter loaded: \"upper\""]);
}

#[test]
fn function_module_registers_helper() {
    let fx = Fixture::new();
    fx.module("helper/shout", upper());

    assert!(fx.loader.load_helper("shout"));
    assert!(fx.engine.has_helper("shout"));
    assert!(!fx.engine.has_filter("shout"));
    assert_eq!(fx.render("{{ shout('a') }}", json!({})), "A");
}

#[test]
fn non_function_export_is_rejected() {
    let fx = Fixture::new();
    fx.module("filter/answer", Export::value(42));

    assert!(!fx.loader.load_filter("answer"));
    assert!(!fx.engine.has_filter("answer"));
    assert_eq!(
        fx.log.lines(),
        vec!["error: Filter \"answer\" does not export a function"]
    );
}

#[test]
fn non_function_export_keeps_previous_registration() {
    let fx = Fixture::new();
    fx.module("filter/upper", upper());
    assert!(fx.loader.load_filter("upper"));

    fx.module("filter/upper", Export::value("oops"));
    assert!(!fx.loader.load_filter("upper"));
    assert_eq!(fx.render("{{ 'x' | upper }}", json!({})), "X");
}

#[test]
fn missing_resources_report_not_found() {
    let fx = Fixture::new();

    assert!(!fx.loader.load_filter("nope"));
    assert!(!fx.loader.load_helper("nope"));
    assert!(!fx.loader.load_template("nope"));
    assert_eq!(
        fx.log.lines(),
        vec![
            "error: Filter \"nope\" does not exist",
            "error: Helper \"nope\" does not exist",
            "error: Template \"nope\" does not exist",
        ]
    );
}

#[test]
fn template_loads_under_namespaced_name() {
    let fx = Fixture::new();
    fx.write("template/baz/qux.dust", "Hello {{ who }}");

    assert!(fx.loader.load_template("baz/qux"));
    assert_eq!(
        fx.engine.render("baz/qux", &json!({ "who": "there" })).unwrap(),
        "Hello there"
    );
    assert_eq!(fx.log.lines(), vec!["info: Template loaded: \"baz/qux\""]);
}

#[test]
fn compile_failure_is_logged_with_engine_message() {
    let fx = Fixture::new();
    fx.write("template/broken.dust", "{% if %}");

    let status = fx.loader.load_status(Category::Template, "broken");
    let LoadStatus::Failed { error: LoadError::Compile { message, .. } } = &status else {
        panic!("expected a compile failure, got {:?}", status);
    };
    assert!(!message.is_empty());
    assert!(!fx.engine.has_template("broken"));

    let lines = fx.log.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("error: Template \"broken\" does not compile: "));
}

#[test]
fn load_routes_through_category() {
    let fx = Fixture::new();
    fx.module("helper/h", upper());
    fx.write("template/t.dust", "t");

    assert!(fx.loader.load(Category::Helper, "h"));
    assert!(fx.loader.load(Category::Template, "t"));
    assert!(!fx.loader.load(Category::Filter, "h"));
}

// ── Batch loaders ─────────────────────────────────────────────

#[test]
fn load_templates_uses_logical_names() {
    let fx = Fixture::new();
    fx.write("template/foo.dust", "foo");
    fx.write("template/bar.dust", "bar");
    fx.write("template/baz/qux.dust", "qux");
    fx.write("template/notes.txt", "not a template");
    fx.write("template/.hidden.dust", "hidden");

    let results = fx.loader.load_templates();
    let mut names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["bar", "baz/qux", "foo"]);
    assert!(results.iter().all(|r| r.status.is_loaded()));
    assert!(results.iter().all(|r| r.category == Category::Template));
    assert_eq!(fx.engine.templates(), vec!["bar", "baz/qux", "foo"]);
}

#[test]
fn load_filters_resolves_discovered_modules() {
    let fx = Fixture::new();
    fx.write("filter/upper.expr", "");
    fx.write("filter/text/lower.expr", "");
    fx.module("filter/upper", upper());
    fx.module("filter/text/lower", upper());

    let results = fx.loader.load_filters();
    assert_eq!(results.len(), 2);
    assert_eq!(fx.engine.filters(), vec!["text/lower", "upper"]);
}

#[test]
fn failing_resource_does_not_abort_batch() {
    let fx = Fixture::new();
    fx.write("template/good.dust", "good");
    fx.write("template/bad.dust", "{{ unclosed");
    fx.write("template/also_good.dust", "also good");

    let results = fx.loader.load_templates();
    assert_eq!(results.len(), 3);
    let failed: Vec<_> = results.iter().filter(|r| !r.status.is_loaded()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].name, "bad");
    assert!(fx.engine.has_template("good"));
    assert!(fx.engine.has_template("also_good"));
}

#[test]
fn reload_after_failure_keeps_earlier_successes() {
    let fx = Fixture::new();
    fx.write("template/stable.dust", "stable");
    fx.write("template/page.dust", "v1");
    fx.loader.load_everything();

    fx.write("template/page.dust", "{% for %}");
    assert!(!fx.loader.load_template("page"));

    fx.loader.load_everything();
    assert_eq!(fx.engine.render("stable", &json!({})).unwrap(), "stable");
    assert_eq!(fx.engine.render("page", &json!({})).unwrap(), "v1");
}

#[test]
fn missing_root_yields_no_results() {
    let fx = Fixture::with_options(|options| options.filters_path("/does/not/exist"));
    assert!(fx.loader.load_filters().is_empty());
}

#[test]
fn load_everything_orders_categories() {
    let fx = Fixture::new();
    fx.write("template/t.dust", "{{ 'a' | upper }}");
    fx.write("filter/upper.expr", "");
    fx.write("helper/h.expr", "");
    fx.module("filter/upper", upper());
    fx.module("helper/h", upper());

    let results = fx.loader.load_everything();
    let categories: Vec<Category> = results.iter().map(|r| r.category).collect();
    assert_eq!(
        categories,
        vec![Category::Filter, Category::Helper, Category::Template]
    );
    assert_eq!(fx.engine.render("t", &json!({})).unwrap(), "A");
}

#[test]
fn expression_modules_load_from_disk() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("filter")).unwrap();
    fs::write(dir.path().join("filter/reverse.expr"), "value | reverse").unwrap();
    fs::write(dir.path().join("filter/blank.expr"), "").unwrap();

    let settings = Settings::new(ViewOptions::new().view_dir(dir.path()).log(SilentLog));
    let engine = Arc::new(JinjaEngine::new());
    let loader = Loader::new(
        Arc::new(settings),
        engine.clone(),
        Arc::new(ExprModules::new("expr")),
    );

    let results = loader.load_filters();
    let mut statuses: Vec<(String, bool)> = results
        .iter()
        .map(|r| (r.name.clone(), r.status.is_loaded()))
        .collect();
    statuses.sort();
    assert_eq!(
        statuses,
        vec![("blank".to_string(), false), ("reverse".to_string(), true)]
    );

    engine.add_template("t", "{{ 'abc' | reverse }}").unwrap();
    assert_eq!(engine.render("t", &json!({})).unwrap(), "cba");
}

// ── Event dispatch ────────────────────────────────────────────

#[test]
fn dispatch_classifies_and_loads() {
    let fx = Fixture::new();
    fx.write("template/a/b.dust", "ab");
    fx.module("helper/h", upper());

    assert_eq!(dispatch(&fx.loader, &fx.path("template/a/b.dust")), Some(true));
    assert_eq!(dispatch(&fx.loader, &fx.path("helper/h.expr")), Some(true));
    assert!(fx.engine.has_template("a/b"));
    assert!(fx.engine.has_helper("h"));
    assert_eq!(
        fx.log.lines(),
        vec!["info: Template loaded: \"a/b\"", "info: Helper loaded: \"h\""]
    );
}

#[test]
fn dispatch_outside_roots_falls_back_to_template() {
    let fx = Fixture::new();
    assert_eq!(dispatch(&fx.loader, Path::new("/elsewhere/x.dust")), Some(false));
    let lines = fx.log.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("error: Template \"../"));
}

#[test]
fn strict_dispatch_ignores_paths_outside_roots() {
    let fx = Fixture::with_options(|options| options.strict_paths(true));
    assert_eq!(dispatch(&fx.loader, Path::new("/elsewhere/x.dust")), None);
    assert!(fx.log.lines().is_empty());
}

#[test]
fn single_add_event_loads_once() {
    use notify::event::{CreateKind, EventKind, ModifyKind, RenameMode};
    use notify::Event;

    let fx = Fixture::new();
    fx.write("template/a/b.dust", "ab");
    let patterns = WatchPatterns::new(fx.loader.settings());

    let event = Event::new(EventKind::Create(CreateKind::File))
        .add_path(fx.path("template/a/b.dust"));
    handle_fs_event(&event, &fx.loader, &patterns);
    assert_eq!(fx.log.lines(), vec!["info: Template loaded: \"a/b\""]);

    let ignored = Event::new(EventKind::Create(CreateKind::File))
        .add_path(fx.path("template/a/notes.txt"));
    handle_fs_event(&ignored, &fx.loader, &patterns);
    let renamed_away = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::From)))
        .add_path(fx.path("template/a/b.dust"));
    handle_fs_event(&renamed_away, &fx.loader, &patterns);
    assert_eq!(fx.log.lines().len(), 1);
}

#[test]
fn rename_loads_destination_only() {
    use notify::event::{EventKind, ModifyKind, RenameMode};
    use notify::Event;

    let fx = Fixture::new();
    fx.write("template/new.dust", "moved");
    let patterns = WatchPatterns::new(fx.loader.settings());

    let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
        .add_path(fx.path("template/old.dust"))
        .add_path(fx.path("template/new.dust"));
    handle_fs_event(&event, &fx.loader, &patterns);
    assert_eq!(fx.log.lines(), vec!["info: Template loaded: \"new\""]);
    assert!(!fx.engine.has_template("old"));
}

#[test]
fn new_directory_event_loads_its_contents() {
    use notify::event::{CreateKind, EventKind};
    use notify::Event;

    let fx = Fixture::new();
    fx.write("template/emails/welcome.dust", "welcome");
    fx.write("template/emails/deep/bye.dust", "bye");
    fx.write("template/emails/readme.txt", "ignored");
    let patterns = WatchPatterns::new(fx.loader.settings());

    let event = Event::new(EventKind::Create(CreateKind::Folder))
        .add_path(fx.path("template/emails"));
    handle_fs_event(&event, &fx.loader, &patterns);

    assert!(fx.engine.has_template("emails/welcome"));
    assert!(fx.engine.has_template("emails/deep/bye"));
    assert_eq!(fx.log.lines().len(), 2);
}

#[test]
fn directory_renamed_into_root_loads_its_contents() {
    use notify::event::{EventKind, ModifyKind, RenameMode};
    use notify::Event;

    let fx = Fixture::new();
    fx.write("filter/text/shout.expr", "");
    fx.module("filter/text/shout", upper());
    let patterns = WatchPatterns::new(fx.loader.settings());

    let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To)))
        .add_path(fx.path("filter/text"));
    handle_fs_event(&event, &fx.loader, &patterns);

    assert!(fx.engine.has_filter("text/shout"));
    assert_eq!(fx.log.lines(), vec!["info: Filter loaded: \"text/shout\""]);
}

#[test]
fn directory_scan_respects_category_extensions() {
    let fx = Fixture::new();
    fx.write("template/mixed/page.dust", "page");
    fx.write("template/mixed/stray.expr", "value");
    let patterns = WatchPatterns::new(fx.loader.settings());

    dispatch_tree(&fx.loader, &patterns, &fx.path("template/mixed"));

    assert!(fx.engine.has_template("mixed/page"));
    assert!(!fx.engine.has_filter("stray"));
    assert_eq!(fx.log.lines(), vec!["info: Template loaded: \"mixed/page\""]);
}
