use author_core::{
    Block, BlockPosition, ChangeBlockType, CompositeCommand, DeleteBlock, DeleteText,
    InsertMultilineText, InsertText, Project, ProjectSettings, PropertiesDictionary, SetText,
    SplitBlock,
};
use author_core_plugins::word_counter::paths;
use author_core_plugins::{
    IMMEDIATE_CORRECTION, ImmediateCorrectionSettings, LOCAL_WORDS, SPELLING_FRAMEWORK,
    SpellingFramework, Substitution, WORD_COUNTER, WORD_LIST_SPELLING, WordCounts,
    WordListSettings, builtin_registry,
};
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

fn project(settings: ProjectSettings) -> Arc<Project> {
    Project::with_settings(Arc::new(builtin_registry()), settings).unwrap()
}

fn counts(words: i64, characters: i64, non_whitespace_characters: i64) -> WordCounts {
    WordCounts {
        words,
        characters,
        non_whitespace_characters,
    }
}

fn type_count(properties: &PropertiesDictionary, block_type: &str) -> i64 {
    properties.get_i64(&paths::block_type(block_type))
}

/// "Chapter One" heading over two paragraphs.
fn manuscript() -> Arc<Project> {
    let project = project(ProjectSettings::new().with_plugin(WORD_COUNTER));
    let first = project.blocks().first().key();
    project
        .do_command(InsertMultilineText::new(
            BlockPosition::new(first, 0),
            "Chapter One\nLine 1\nLine 2",
        ))
        .unwrap();
    project.wait_for_block_analyzers();
    let chapter = project.block_types().chapter();
    project
        .do_command(ChangeBlockType::new(first, chapter))
        .unwrap();
    project.wait_for_block_analyzers();
    project
}

#[test]
fn test_single_block_counts() {
    let project = project(ProjectSettings::new().with_plugin(WORD_COUNTER));
    let block = project.blocks().first();
    project
        .do_command(SetText::new(block.key(), "Line 1"))
        .unwrap();
    project.wait_for_block_analyzers();

    assert_eq!(WordCounts::aggregate(block.read().properties()), counts(2, 6, 5));
    assert_eq!(WordCounts::aggregate(&project.properties()), counts(2, 6, 5));
    assert_eq!(type_count(&project.properties(), "Paragraph"), 1);
}

#[test]
fn test_typed_line_counts() {
    let project = project(ProjectSettings::new().with_plugin(WORD_COUNTER));
    let first = project.blocks().first().key();
    project
        .do_command(InsertText::new(BlockPosition::new(first, 0), "Line 1"))
        .unwrap();
    project.wait_for_block_analyzers();
    assert_eq!(WordCounts::aggregate(&project.properties()), counts(2, 6, 5));

    // The same line typed under a chapter heading.
    project.do_command(SetText::new(first, "Chapter One")).unwrap();
    project
        .do_command(SplitBlock::new(BlockPosition::new(first, 11)))
        .unwrap();
    let chapter = project.block_types().chapter();
    project
        .do_command(ChangeBlockType::new(first, chapter))
        .unwrap();
    let line = project.blocks().at(1).unwrap();
    project
        .do_command(InsertText::new(BlockPosition::new(line.key(), 0), "Line 1"))
        .unwrap();
    project.wait_for_block_analyzers();

    let parent = line.read().parent().unwrap();
    assert_eq!(parent.key(), first);
    assert_eq!(WordCounts::aggregate(line.read().properties()), counts(2, 6, 5));
    assert_eq!(WordCounts::aggregate(parent.read().properties()), counts(4, 17, 15));
    assert_eq!(WordCounts::aggregate(&project.properties()), counts(4, 17, 15));
}

#[test]
fn test_counts_roll_up_to_chapter() {
    let project = manuscript();
    let blocks = project.blocks().to_vec();
    let chapter = &blocks[0];

    assert!(Arc::ptr_eq(&blocks[1].read().parent().unwrap(), chapter));
    assert_eq!(WordCounts::aggregate(chapter.read().properties()), counts(6, 23, 20));
    assert_eq!(WordCounts::aggregate(blocks[2].read().properties()), counts(2, 6, 5));
    assert_eq!(WordCounts::aggregate(&project.properties()), counts(6, 23, 20));

    let chapter_props = chapter.read().properties().clone();
    assert_eq!(type_count(&chapter_props, "Chapter"), 1);
    assert_eq!(type_count(&chapter_props, "Paragraph"), 2);
    assert_eq!(type_count(&project.properties(), "Chapter"), 1);
    assert_eq!(type_count(&project.properties(), "Paragraph"), 2);
}

#[test]
fn test_type_change_keeps_word_counts() {
    let project = manuscript();
    let heading = project.blocks().first();
    let paragraph = project.block_types().paragraph();
    project
        .do_command(ChangeBlockType::new(heading.key(), paragraph))
        .unwrap();
    project.wait_for_block_analyzers();

    assert!(project.blocks().at(1).unwrap().read().parent().is_none());
    assert_eq!(WordCounts::aggregate(heading.read().properties()), counts(2, 11, 10));
    assert_eq!(WordCounts::aggregate(&project.properties()), counts(6, 23, 20));
    assert_eq!(type_count(&project.properties(), "Chapter"), 0);
    assert_eq!(type_count(&project.properties(), "Paragraph"), 3);

    project.undo().unwrap();
    project.wait_for_block_analyzers();
    assert_eq!(WordCounts::aggregate(heading.read().properties()), counts(6, 23, 20));
    assert_eq!(type_count(&project.properties(), "Chapter"), 1);
    assert_eq!(type_count(&project.properties(), "Paragraph"), 2);
}

#[test]
fn test_removal_and_undo_keep_totals() {
    let project = manuscript();
    let chapter = project.blocks().first();
    let last = project.blocks().at(2).unwrap().key();

    project.do_command(DeleteBlock::new(last)).unwrap();
    project.wait_for_block_analyzers();
    assert_eq!(WordCounts::aggregate(chapter.read().properties()), counts(4, 17, 15));
    assert_eq!(WordCounts::aggregate(&project.properties()), counts(4, 17, 15));
    assert_eq!(type_count(&project.properties(), "Paragraph"), 1);

    project.undo().unwrap();
    project.wait_for_block_analyzers();
    assert_eq!(WordCounts::aggregate(chapter.read().properties()), counts(6, 23, 20));
    assert_eq!(WordCounts::aggregate(&project.properties()), counts(6, 23, 20));
    assert_eq!(type_count(&project.properties(), "Paragraph"), 2);
}

#[test]
fn test_failed_structural_command_keeps_outline() {
    let project = manuscript();
    let heading = project.blocks().first();
    let paragraph = project.block_types().paragraph();
    let composite = CompositeCommand::new()
        .with(ChangeBlockType::new(heading.key(), paragraph))
        .with(DeleteText::new(heading.key(), 5..99));

    assert!(project.do_command(composite).is_err());
    project.wait_for_block_analyzers();

    let blocks = project.blocks().to_vec();
    assert_eq!(blocks[0].read().block_type().name(), "Chapter");
    for block in &blocks[1..] {
        assert!(Arc::ptr_eq(&block.read().parent().unwrap(), &heading));
    }
    assert_eq!(WordCounts::aggregate(heading.read().properties()), counts(6, 23, 20));
    assert_eq!(type_count(&project.properties(), "Chapter"), 1);
    assert_eq!(type_count(&project.properties(), "Paragraph"), 2);
}

fn add(a: WordCounts, b: WordCounts) -> WordCounts {
    counts(
        a.words + b.words,
        a.characters + b.characters,
        a.non_whitespace_characters + b.non_whitespace_characters,
    )
}

/// Check every stored aggregate against a recount of the current text and outline.
fn assert_counts_match_text(project: &Project) {
    let blocks = project.blocks().to_vec();
    let own: Vec<WordCounts> = blocks.iter().map(|b| WordCounts::count(&b.text())).collect();
    let chains: Vec<Vec<Arc<Block>>> = blocks.iter().map(|b| b.ancestors()).collect();
    let names = ["Paragraph", "Chapter", "Scene"];
    let block_type = |block: &Arc<Block>| block.read().block_type().name().to_string();

    for (index, block) in blocks.iter().enumerate() {
        let in_subtree = |other: usize| {
            other == index || chains[other].iter().any(|a| Arc::ptr_eq(a, block))
        };
        let expected = (0..blocks.len())
            .filter(|other| in_subtree(*other))
            .fold(WordCounts::default(), |total, other| add(total, own[other]));
        let properties = block.read().properties().clone();
        assert_eq!(WordCounts::aggregate(&properties), expected, "block {index}");
        for name in names {
            let expected = (0..blocks.len())
                .filter(|other| in_subtree(*other) && block_type(&blocks[*other]) == name)
                .count() as i64;
            assert_eq!(type_count(&properties, name), expected, "{name} in block {index}");
        }
    }

    let total = own.iter().fold(WordCounts::default(), |total, c| add(total, *c));
    assert_eq!(WordCounts::aggregate(&project.properties()), total);
    for name in names {
        let expected = blocks.iter().filter(|b| block_type(*b) == name).count() as i64;
        assert_eq!(type_count(&project.properties(), name), expected, "{name}");
    }
}

#[test]
fn test_randomized_edits_keep_counts_consistent() {
    let project = project(ProjectSettings::new().with_plugin(WORD_COUNTER));
    let types = [
        project.block_types().paragraph(),
        project.block_types().chapter(),
        project.block_types().scene(),
    ];
    let mut rng = StdRng::seed_from_u64(0xc0de);

    for step in 0..200 {
        let blocks = project.blocks().to_vec();
        let block = &blocks[rng.gen_range(0..blocks.len())];
        let key = block.key();
        let len = block.read().char_len();

        let result = match rng.gen_range(0..7) {
            0 | 1 => {
                let index = rng.gen_range(0..=len);
                project
                    .do_command(InsertText::new(
                        BlockPosition::new(key, index),
                        format!("word {step} "),
                    ))
                    .map(|_| ())
            }
            2 => {
                let start = rng.gen_range(0..=len);
                let end = rng.gen_range(start..=len);
                project.do_command(DeleteText::new(key, start..end)).map(|_| ())
            }
            3 => {
                let index = rng.gen_range(0..=len);
                project
                    .do_command(SplitBlock::new(BlockPosition::new(key, index)))
                    .map(|_| ())
            }
            4 if blocks.len() > 1 => project.do_command(DeleteBlock::new(key)).map(|_| ()),
            5 => project.undo().map(|_| ()),
            _ => {
                let block_type = types[rng.gen_range(0..types.len())].clone();
                project
                    .do_command(ChangeBlockType::new(key, block_type))
                    .map(|_| ())
            }
        };
        result.unwrap();

        if rng.gen_bool(0.3) {
            project.wait_for_block_analyzers();
            assert_counts_match_text(&project);
        }
    }

    project.wait_for_block_analyzers();
    assert_counts_match_text(&project);
}

fn correction_settings() -> ProjectSettings {
    ProjectSettings::new()
        .with_plugin(IMMEDIATE_CORRECTION)
        .with_plugin_settings(
            IMMEDIATE_CORRECTION,
            &ImmediateCorrectionSettings {
                substitutions: vec![Substitution::word("teh", "the")],
            },
        )
        .unwrap()
}

#[test]
fn test_immediate_correction_is_undoable() {
    let project = project(correction_settings());
    let key = project.blocks().first().key();

    let mut cursor = None;
    for (index, ch) in "teh ".chars().enumerate() {
        cursor = project
            .do_command(InsertText::new(BlockPosition::new(key, index), ch.to_string()))
            .unwrap();
    }

    assert_eq!(project.texts(), vec!["the "]);
    assert_eq!(cursor, Some(BlockPosition::new(key, 4)));
    assert_eq!(project.commands().undo_depth(), 5);

    project.undo().unwrap();
    assert_eq!(project.texts(), vec!["teh "]);
    project.undo().unwrap();
    assert_eq!(project.texts(), vec!["teh"]);
}

#[test]
fn test_correction_after_single_insert() {
    let project = project(correction_settings());
    let key = project.blocks().first().key();

    let cursor = project
        .do_command(InsertText::new(BlockPosition::new(key, 0), "teh "))
        .unwrap();
    assert_eq!(project.texts(), vec!["the "]);
    assert_eq!(cursor, Some(BlockPosition::new(key, 4)));
    assert_eq!(project.commands().undo_depth(), 2);

    project.undo().unwrap();
    assert_eq!(project.texts(), vec!["teh "]);
    assert!(project.commands().can_redo());

    project.undo().unwrap();
    assert_eq!(project.texts(), vec![""]);
    assert!(!project.commands().can_undo());
}

#[test]
fn test_only_insertions_trigger_corrections() {
    let project = project(correction_settings());
    let key = project.blocks().first().key();

    project.do_command(SetText::new(key, "teh ")).unwrap();
    assert_eq!(project.texts(), vec!["teh "]);

    project.do_command(SetText::new(key, "teh x")).unwrap();
    let cursor = project.do_command(DeleteText::new(key, 4..5)).unwrap();
    assert_eq!(cursor, Some(BlockPosition::new(key, 4)));
    assert_eq!(project.texts(), vec!["teh "]);
    assert_eq!(project.commands().undo_depth(), 3);

    // Typing after the deletion still corrects.
    project
        .do_command(InsertText::new(BlockPosition::new(key, 4), "teh."))
        .unwrap();
    assert_eq!(project.texts(), vec!["teh the."]);
}

fn spelling_settings(plugins: &[&str]) -> ProjectSettings {
    let mut settings = ProjectSettings::new();
    for plugin in plugins {
        settings = settings.with_plugin(*plugin);
    }
    settings
        .with_plugin_settings(
            WORD_LIST_SPELLING,
            &WordListSettings {
                words: ["call", "me", "said", "the", "harpooneer"]
                    .map(String::from)
                    .to_vec(),
            },
        )
        .unwrap()
        .with_plugin_settings(
            LOCAL_WORDS,
            &WordListSettings {
                words: vec!["Ishmael".to_string()],
            },
        )
        .unwrap()
}

#[test]
fn test_spelling_marks_unknown_words() {
    let project = project(spelling_settings(&[
        SPELLING_FRAMEWORK,
        WORD_LIST_SPELLING,
        LOCAL_WORDS,
    ]));
    let block = project.blocks().first();
    project
        .do_command(SetText::new(block.key(), "Call me Ishmael, said Queequeg"))
        .unwrap();
    project.wait_for_block_analyzers();

    assert_eq!(SpellingFramework::misspelled_words(&block), vec!["Queequeg"]);

    let framework = SpellingFramework::for_project(&project).unwrap();
    assert_eq!(framework.engine_count(), 2);
    assert_eq!(framework.suggestions("harpooner"), vec!["harpooneer"]);

    assert!(project.remove_plugin(LOCAL_WORDS));
    assert_eq!(framework.engine_count(), 1);
    project.reanalyze_all();
    project.wait_for_block_analyzers();
    assert_eq!(
        SpellingFramework::misspelled_words(&block),
        vec!["Ishmael", "Queequeg"]
    );
}

#[test]
fn test_spelling_framework_finds_earlier_engines() {
    let project = project(spelling_settings(&[WORD_LIST_SPELLING, SPELLING_FRAMEWORK]));
    let framework = SpellingFramework::for_project(&project).unwrap();
    assert_eq!(framework.engine_count(), 1);

    let block = project.blocks().first();
    project
        .do_command(SetText::new(block.key(), "Call me Ishmael"))
        .unwrap();
    project.wait_for_block_analyzers();
    assert_eq!(SpellingFramework::misspelled_words(&block), vec!["Ishmael"]);

    project
        .do_command(SetText::new(block.key(), "Call me"))
        .unwrap();
    project.wait_for_block_analyzers();
    assert!(SpellingFramework::misspelled_words(&block).is_empty());
}
