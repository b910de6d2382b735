/// Story integration tests: loading passages and configs from RON and
/// walking a story the way a player would.

use harlowe_engine::core::config::{ConfigError, StoryConfig};
use harlowe_engine::core::pipeline::{StoryEngine, StoryError};
use harlowe_engine::schema::passage::{Choice, RawPassage};
use harlowe_engine::schema::value::{Snapshot, Value};

fn fixture_engine() -> StoryEngine {
    StoryEngine::builder()
        .passages_path("tests/fixtures/story.ron")
        .config_path("tests/fixtures/config.ron")
        .build()
        .unwrap()
}

fn apply(snapshot: &mut Snapshot, changes: &std::collections::BTreeMap<String, Value>) {
    for (name, value) in changes {
        snapshot.insert(name.clone(), value.clone());
    }
}

#[test]
fn loads_fixture_story() {
    let engine = fixture_engine();
    assert_eq!(engine.passage_names(), ["Start", "Hall", "Cellar"]);
    assert!(engine.has_passage("Cellar"));
    assert!(!engine.has_passage("Status"));
    assert_eq!(engine.config().max_reductions, 500);
    assert_eq!(engine.start_name(), Some("Start"));
}

#[test]
fn start_passage_in_default_state() {
    let mut engine = fixture_engine();
    let start = engine.start_passage(None, None).unwrap();
    assert_eq!(start.name, "Start");
    assert_eq!(start.content, "You wake in a cold room.\nYou feel rich.");
    assert_eq!(
        start.choices,
        vec![
            Choice::new("Open the door", "Hall"),
            Choice::new("Stay in bed", "Hall"),
        ]
    );
    assert_eq!(start.state_changes["gold"], Value::Number(3.0));
    assert_eq!(start.state_changes["items"], Value::text_list(["lamp"]));
    assert_eq!(start.tags, vec!["intro".to_string()]);
}

#[test]
fn walking_the_story_carries_state() {
    let mut engine = fixture_engine();
    let mut snapshot = Snapshot::new();
    let mut visits = Vec::new();

    let start = engine.start_passage(Some(&snapshot), Some(visits.as_slice())).unwrap();
    apply(&mut snapshot, &start.state_changes);
    visits.push(start.name);

    let hall = engine
        .passage("Hall", Some(&snapshot), Some(visits.as_slice()))
        .unwrap();
    assert_eq!(
        hall.content,
        "You remember the cold room.\nYour lamp lights the way."
    );
    assert_eq!(
        hall.choices,
        vec![Choice::new("Back", "Start"), Choice::new("Cellar", "Cellar")]
    );
    assert!(hall.state_changes.is_empty());
    visits.push(hall.name);

    let cellar = engine
        .passage("Cellar", Some(&snapshot), Some(visits.as_slice()))
        .unwrap();
    assert_eq!(cellar.content, "You have seen darkness.\nYou count 13 coins.");
    assert_eq!(cellar.state_changes["gold"], Value::Number(13.0));
    assert_eq!(snapshot["gold"], Value::Number(3.0));
}

#[test]
fn first_visit_without_items() {
    let mut engine = fixture_engine();
    let hall = engine.passage("Hall", None, None).unwrap();
    assert_eq!(hall.content, "It is dark.");
}

#[test]
fn header_and_footer_render_with_snapshot() {
    let mut engine = fixture_engine();
    let mut snapshot = Snapshot::new();
    snapshot.insert("gold".to_string(), Value::Number(3.0));
    assert_eq!(engine.header_content(Some(&snapshot)).as_deref(), Some("Gold: 3"));
    assert_eq!(engine.header_content(None).as_deref(), Some("Gold:"));
    // the config's literal filter strips the question mark
    assert_eq!(engine.footer_content(None).as_deref(), Some("The End"));
}

#[test]
fn unknown_passage_is_an_error() {
    let mut engine = fixture_engine();
    let err = engine.passage("Attic", None, None).unwrap_err();
    assert!(matches!(err, StoryError::PassageNotFound(ref name) if name == "Attic"));
}

#[test]
fn directory_load_keeps_last_definition() {
    let mut engine = StoryEngine::builder()
        .passages_path("tests/fixtures/story")
        .build()
        .unwrap();
    assert_eq!(engine.passage_names(), ["Start", "Next"]);
    let start = engine.start_passage(None, None).unwrap();
    assert_eq!(start.content, "Second version");
    assert_eq!(start.choices, vec![Choice::new("Next", "Next")]);
}

#[test]
fn default_state_compile_is_cached() {
    let mut engine = StoryEngine::builder()
        .passages(vec![RawPassage::new("Start", "(print: (random: 1, 1000000))")])
        .seed(3)
        .build()
        .unwrap();
    let first = engine.passage("Start", None, None).unwrap();
    let second = engine.passage("Start", None, None).unwrap();
    assert_eq!(first, second);
}

#[test]
fn same_seed_same_story() {
    let build = || {
        StoryEngine::builder()
            .passages(vec![RawPassage::new("Roll", "(set: $d to (random: 1, 100))You rolled $d.")])
            .seed(99)
            .build()
            .unwrap()
    };
    let empty = Snapshot::new();
    let a = build().passage("Roll", Some(&empty), None).unwrap();
    let b = build().passage("Roll", Some(&empty), None).unwrap();
    assert_eq!(a.content, b.content);
    assert_eq!(a.state_changes, b.state_changes);
}

#[test]
fn start_falls_back_to_first_passage() {
    let engine = StoryEngine::builder()
        .passages(vec![
            RawPassage::new("Banner", "Welcome").with_tags("header"),
            RawPassage::new("Prologue", "Once."),
            RawPassage::new("Epilogue", "Done."),
        ])
        .build()
        .unwrap();
    assert_eq!(engine.start_name(), Some("Prologue"));
}

#[test]
fn configured_start_passage_wins() {
    let config = StoryConfig {
        start_passage: Some("Hall".to_string()),
        ..StoryConfig::default()
    };
    let mut engine = StoryEngine::builder()
        .passages_path("tests/fixtures/story.ron")
        .config(config)
        .seed(1)
        .build()
        .unwrap();
    assert_eq!(engine.start_passage(None, None).unwrap().name, "Hall");
}

#[test]
fn story_without_navigable_passages_fails() {
    let err = StoryEngine::builder()
        .passages(vec![RawPassage::new("Top", "Title").with_tags("header")])
        .build()
        .unwrap_err();
    assert!(matches!(err, StoryError::NoPassages));
}

#[test]
fn missing_config_file_fails() {
    let err = StoryEngine::builder()
        .passages(vec![RawPassage::new("Start", "Hi")])
        .config_path("tests/fixtures/missing.ron")
        .build()
        .unwrap_err();
    assert!(matches!(err, StoryError::Config(ConfigError::Io(_))));
}

#[test]
fn bundled_story_links_resolve() {
    let mut engine = StoryEngine::builder()
        .passages_path("stories/lantern.ron")
        .seed(5)
        .build()
        .unwrap();
    let names: Vec<String> = engine.passage_names().to_vec();
    assert!(names.iter().any(|n| n == "Start"));
    for name in &names {
        let raw = engine.raw_passage(name).unwrap().raw_body.clone();
        for choice in harlowe_engine::core::links::extract_choices(&raw) {
            assert!(engine.has_passage(&choice.target), "{} -> {}", name, choice.target);
        }
        engine.passage(name, None, None).unwrap();
    }
    assert!(engine.header_content(None).is_some());
}
