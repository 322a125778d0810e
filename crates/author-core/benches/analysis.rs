use author_core::{
    Block, BlockAnalyzerPlugin, BlockPosition, HierarchicalPath, InsertMultilineText, InsertText,
    PluginError, PluginRegistry, Project, ProjectError, ProjectPluginController,
    ProjectPluginProvider, ProjectSettings,
};
use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use std::sync::Arc;

struct WhitespaceCounter;

impl BlockAnalyzerPlugin for WhitespaceCounter {
    fn analyze_block(
        &self,
        _project: &Project,
        block: &Arc<Block>,
        block_version: u64,
    ) -> Result<(), PluginError> {
        let count = {
            let state = block.read();
            state.text().split_whitespace().count()
        };
        let mut state = block.write();
        if !state.is_stale(block_version) {
            state
                .properties_mut()
                .set(HierarchicalPath::from("Bench/Words"), count);
        }
        Ok(())
    }
}

struct WhitespaceCounterProvider;

impl ProjectPluginProvider for WhitespaceCounterProvider {
    fn key(&self) -> &str {
        "Bench"
    }

    fn get_project_plugin(
        &self,
        _project: &Project,
        _settings: &ProjectSettings,
    ) -> Result<ProjectPluginController, ProjectError> {
        Ok(ProjectPluginController::new("Bench").with_block_analyzer(Arc::new(WhitespaceCounter)))
    }
}

fn project(with_analyzer: bool) -> Arc<Project> {
    let registry = PluginRegistry::new().with(Arc::new(WhitespaceCounterProvider));
    let mut settings = ProjectSettings::new();
    if with_analyzer {
        settings = settings.with_plugin("Bench");
    }
    Project::with_settings(Arc::new(registry), settings).unwrap()
}

fn large_manuscript(paragraphs: usize) -> String {
    let mut out = String::with_capacity(paragraphs * 64);
    for i in 0..paragraphs {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!(
            "{i:05} the quick brown fox jumps over the lazy dog (author-core benchmark)"
        ));
    }
    out
}

fn bench_typing(c: &mut Criterion) {
    for (name, with_analyzer) in [("typing/no_analyzer", false), ("typing/analyzer", true)] {
        c.bench_function(name, |b| {
            b.iter_batched(
                || project(with_analyzer),
                |project| {
                    let key = project.blocks().first().key();
                    for i in 0..200 {
                        project
                            .do_command(InsertText::new(BlockPosition::new(key, i), "x"))
                            .unwrap();
                    }
                    project.wait_for_block_analyzers();
                    black_box(project.block_text(key));
                },
                BatchSize::SmallInput,
            )
        });
    }
}

fn bench_paste_and_undo(c: &mut Criterion) {
    let text = large_manuscript(1_000);
    c.bench_function("paste_1k_paragraphs/undo_redo", |b| {
        b.iter_batched(
            || project(false),
            |project| {
                let key = project.blocks().first().key();
                project
                    .do_command(InsertMultilineText::new(
                        BlockPosition::new(key, 0),
                        black_box(text.as_str()),
                    ))
                    .unwrap();
                project.undo().unwrap();
                project.redo().unwrap();
                black_box(project.blocks().len());
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_typing, bench_paste_and_undo);
criterion_main!(benches);
