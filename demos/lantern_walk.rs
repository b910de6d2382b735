/// Lantern Walk demo: plays the bundled mine story along a fixed route.
///
/// Each step compiles a passage against the running snapshot and visit
/// log, folds its state changes back in, then follows the first choice.
///
/// Run with: cargo run --example lantern_walk

use harlowe_engine::core::pipeline::StoryEngine;
use harlowe_engine::schema::value::Snapshot;

fn main() {
    let mut engine = StoryEngine::builder()
        .passages_path("stories/lantern.ron")
        .seed(2026)
        .build()
        .expect("Failed to load the lantern story");

    let mut snapshot = Snapshot::new();
    let mut visits: Vec<String> = Vec::new();
    let mut current = engine
        .start_name()
        .expect("Story has no start passage")
        .to_string();

    // --- Walk eight steps, always taking the first choice ---
    for step in 1..=8 {
        let passage = engine
            .passage(&current, Some(&snapshot), Some(visits.as_slice()))
            .expect("Passage failed to compile");
        for (name, value) in &passage.state_changes {
            snapshot.insert(name.clone(), value.clone());
        }
        visits.push(passage.name.clone());

        if let Some(header) = engine.header_content(Some(&snapshot)) {
            println!("[{}]", header);
        }
        println!("--- Step {}: {} ---", step, passage.name);
        println!("{}\n", passage.content);

        match passage.choices.first() {
            Some(choice) => {
                println!("> {}\n", choice.text);
                current = choice.target.clone();
            }
            None => break,
        }
    }

    println!("Visited: {}", visits.join(" -> "));
}
