use author_core::{
    Block, BlockAnalyzer, BlockAnalyzerPlugin, BlockPosition, DeleteText, DoTypes,
    HierarchicalPath, ImmediateEdit, ImmediateEditorPlugin, InsertText, PluginCapabilities,
    PluginError, PluginFrameworkPlugin, PluginRegistry, Project, ProjectError,
    ProjectPluginController, ProjectPluginProvider, ProjectSettings, ReplaceText, SetText,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const LENGTH_PATH: &str = "Length/Characters";

/// Stores the character length of each analyzed block.
#[derive(Default)]
struct LengthAnalyzer {
    calls: AtomicUsize,
}

impl BlockAnalyzerPlugin for LengthAnalyzer {
    fn analyze_block(
        &self,
        _project: &Project,
        block: &Arc<Block>,
        block_version: u64,
    ) -> Result<(), PluginError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut state = block.write();
        if state.is_stale(block_version) {
            return Ok(());
        }
        let len = state.char_len();
        state
            .properties_mut()
            .set(HierarchicalPath::from(LENGTH_PATH), len);
        Ok(())
    }
}

/// Fails every analysis in the configured way.
struct BrokenAnalyzer {
    panics: bool,
}

impl BlockAnalyzerPlugin for BrokenAnalyzer {
    fn analyze_block(
        &self,
        _project: &Project,
        _block: &Arc<Block>,
        _block_version: u64,
    ) -> Result<(), PluginError> {
        if self.panics {
            panic!("analyzer bug");
        }
        Err(PluginError::analysis("Broken", "cannot analyze"))
    }
}

/// Capitalizes the first letter of a block as soon as it is typed.
struct Capitalizer;

impl ImmediateEditorPlugin for Capitalizer {
    fn process_immediate_edits(&self, edit: &ImmediateEdit<'_>) {
        if edit.text_index() != 1 {
            return;
        }
        let Some(first) = edit.text().chars().next() else {
            return;
        };
        if first.is_lowercase() {
            let upper: String = first.to_uppercase().collect();
            edit.deferred_do(
                ReplaceText::new(edit.block().key(), 0..1, upper)
                    .with_text_position_updates(DoTypes::UNDO | DoTypes::REDO),
            );
        }
    }
}

/// Records the controllers it hears about.
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl PluginFrameworkPlugin for Recorder {
    fn initialize_plugin_framework(
        &self,
        _project: &Project,
        controllers: &[Arc<ProjectPluginController>],
    ) {
        let mut events = self.events.lock();
        for controller in controllers {
            events.push(format!("init {}", controller.key()));
        }
    }

    fn handle_added_controller(&self, _project: &Project, controller: &Arc<ProjectPluginController>) {
        let tag = controller
            .extension::<&'static str>()
            .map(|tag| tag.to_string())
            .unwrap_or_default();
        self.events
            .lock()
            .push(format!("added {} {tag}", controller.key()));
    }

    fn handle_removed_controller(
        &self,
        _project: &Project,
        controller: &Arc<ProjectPluginController>,
    ) {
        self.events
            .lock()
            .push(format!("removed {}", controller.key()));
    }
}

/// A provider building controllers from a closure.
struct TestProvider<F> {
    key: &'static str,
    multiple: bool,
    build: F,
}

impl<F> ProjectPluginProvider for TestProvider<F>
where
    F: Fn(ProjectPluginController) -> ProjectPluginController + Send + Sync,
{
    fn key(&self) -> &str {
        self.key
    }

    fn allow_multiple(&self) -> bool {
        self.multiple
    }

    fn get_project_plugin(
        &self,
        _project: &Project,
        _settings: &ProjectSettings,
    ) -> Result<ProjectPluginController, ProjectError> {
        Ok((self.build)(ProjectPluginController::new(self.key)))
    }
}

fn provider<F>(key: &'static str, multiple: bool, build: F) -> Arc<dyn ProjectPluginProvider>
where
    F: Fn(ProjectPluginController) -> ProjectPluginController + Send + Sync + 'static,
{
    Arc::new(TestProvider {
        key,
        multiple,
        build,
    })
}

fn length_registry(analyzer: Arc<LengthAnalyzer>) -> PluginRegistry {
    PluginRegistry::new().with(provider("Length", false, move |c| {
        c.with_block_analyzer(analyzer.clone())
    }))
}

fn length_of(block: &Block) -> Option<usize> {
    block.read().properties().get(&HierarchicalPath::from(LENGTH_PATH))
}

#[test]
fn test_stale_analysis_is_dropped() {
    let analyzer = Arc::new(LengthAnalyzer::default());
    let project = Project::new(Arc::new(length_registry(analyzer.clone())));
    let block = project.blocks().first();

    let captured = block.version();
    block.write().set_text("typed after capture");
    assert_eq!(block.version(), captured + 1);

    let plugin: Arc<dyn BlockAnalyzerPlugin> = analyzer.clone();
    let plugins = vec![("Length".to_string(), plugin)];
    BlockAnalyzer::new(project.clone(), block.clone(), captured, plugins).run();
    assert_eq!(analyzer.calls.load(Ordering::SeqCst), 0);

    // The plugin's own check under the write lock also refuses the stale version.
    analyzer.analyze_block(&project, &block, captured).unwrap();
    assert_eq!(length_of(&block), None);
}

#[test]
fn test_drain_barrier_sees_latest_text() {
    let analyzer = Arc::new(LengthAnalyzer::default());
    let settings = ProjectSettings::new().with_plugin("Length");
    let project =
        Project::with_settings(Arc::new(length_registry(analyzer.clone())), settings).unwrap();
    let block = project.blocks().first();
    let key = block.key();

    for i in 0..100 {
        project
            .do_command(InsertText::new(BlockPosition::new(key, i), "x"))
            .unwrap();
    }
    project.wait_for_block_analyzers();

    assert_eq!(project.plugins().running_analyzers(), 0);
    assert_eq!(length_of(&block), Some(100));
    assert!(analyzer.calls.load(Ordering::SeqCst) >= 1);

    project.undo().unwrap();
    assert!(
        project
            .plugins()
            .wait_for_block_analyzers_timeout(Duration::from_secs(10))
    );
    assert_eq!(length_of(&block), Some(99));
}

#[test]
fn test_failing_analyzers_do_not_stop_others() {
    for panics in [false, true] {
        let analyzer = Arc::new(LengthAnalyzer::default());
        let registry = length_registry(analyzer.clone()).with(provider(
            "Broken",
            false,
            move |c| c.with_block_analyzer(Arc::new(BrokenAnalyzer { panics })),
        ));
        let settings = ProjectSettings::new()
            .with_plugin("Broken")
            .with_plugin("Length");
        let project = Project::with_settings(Arc::new(registry), settings).unwrap();
        let block = project.blocks().first();

        project.do_command(SetText::new(block.key(), "four")).unwrap();
        project.wait_for_block_analyzers();
        assert_eq!(length_of(&block), Some(4));
    }
}

#[test]
fn test_single_instance_plugins() {
    let registry = length_registry(Arc::new(LengthAnalyzer::default()))
        .with(provider("Multi", true, |c| c));
    let project = Project::new(Arc::new(registry));

    assert!(project.add_plugin("Length").unwrap());
    assert!(!project.add_plugin("Length").unwrap());
    assert!(project.add_plugin("Multi").unwrap());
    assert!(project.add_plugin("Multi").unwrap());

    let keys: Vec<String> = project
        .plugins()
        .controllers()
        .iter()
        .map(|c| c.key().to_string())
        .collect();
    assert_eq!(keys, vec!["Length", "Multi", "Multi"]);

    assert!(matches!(
        project.add_plugin("Missing"),
        Err(ProjectError::UnknownPlugin(name)) if name == "Missing"
    ));
    assert!(matches!(
        Project::with_settings(
            Arc::new(PluginRegistry::new()),
            ProjectSettings::new().with_plugin("Missing")
        ),
        Err(ProjectError::UnknownPlugin(_))
    ));

    assert!(project.remove_plugin("Multi"));
    assert_eq!(project.plugins().controllers().len(), 2);
    assert!(!project.remove_plugin("Missing"));
}

#[test]
fn test_framework_sees_existing_and_added_controllers() {
    let recorder = Arc::new(Recorder::default());
    let framework = recorder.clone();
    let registry = PluginRegistry::new()
        .with(provider("Engine", true, |c| c.with_extension(Arc::new("tagged"))))
        .with(provider("Framework", false, move |c| {
            c.with_framework(framework.clone())
        }));
    let project = Project::new(Arc::new(registry));

    project.add_plugin("Engine").unwrap();
    project.add_plugin("Framework").unwrap();
    project.add_plugin("Engine").unwrap();
    project.remove_plugin("Engine");

    let framework = project
        .plugins()
        .controllers()
        .into_iter()
        .find(|c| c.key() == "Framework")
        .unwrap();
    assert_eq!(framework.capabilities(), PluginCapabilities::FRAMEWORK);

    assert_eq!(
        *recorder.events.lock(),
        vec!["init Engine", "added Engine tagged", "removed Engine"]
    );
}

#[test]
fn test_deferred_command_is_its_own_undo_entry() {
    let registry =
        PluginRegistry::new().with(provider("Capitalizer", false, |c| {
            c.with_immediate_editor(Arc::new(Capitalizer))
        }));
    let project =
        Project::with_settings(Arc::new(registry), ProjectSettings::new().with_plugin("Capitalizer"))
            .unwrap();
    let key = project.blocks().first().key();

    let cursor = project
        .do_command(InsertText::new(BlockPosition::new(key, 0), "o"))
        .unwrap();
    assert_eq!(cursor, Some(BlockPosition::new(key, 1)));
    assert_eq!(project.block_text(key).unwrap(), "O");
    assert_eq!(project.commands().undo_depth(), 2);

    project
        .do_command(InsertText::new(BlockPosition::new(key, 1), "nce"))
        .unwrap();
    assert_eq!(project.block_text(key).unwrap(), "Once");

    project.undo().unwrap();
    project.undo().unwrap();
    assert_eq!(project.block_text(key).unwrap(), "o");
    project.undo().unwrap();
    assert_eq!(project.block_text(key).unwrap(), "");
}

#[test]
fn test_deletion_skips_immediate_editors() {
    let registry =
        PluginRegistry::new().with(provider("Capitalizer", false, |c| {
            c.with_immediate_editor(Arc::new(Capitalizer))
        }));
    let project =
        Project::with_settings(Arc::new(registry), ProjectSettings::new().with_plugin("Capitalizer"))
            .unwrap();
    let key = project.blocks().first().key();
    project.do_command(SetText::new(key, "ox")).unwrap();

    let cursor = project.do_command(DeleteText::new(key, 1..2)).unwrap();
    assert_eq!(cursor, Some(BlockPosition::new(key, 1)));
    assert_eq!(project.block_text(key).unwrap(), "o");
    assert_eq!(project.commands().undo_depth(), 2);
}
