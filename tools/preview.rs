/// Preview: interactive player for testing passages.
///
/// Usage: preview <passages.ron> [--config <path>] [--seed <n>] [--start <name>]
///
/// Commands:
///   <n>             follow choice n
///   go <passage>    jump to a passage by name
///   vars            show current variables
///   set <var> <v>   set a variable (number, true/false, or text)
///   history         show visited passages
///   restart         clear state and return to the start passage
///   help            list commands
///   quit            exit

use clap::Parser;
use harlowe_engine::core::pipeline::{StoryEngine, StoryError};
use harlowe_engine::schema::passage::Passage;
use harlowe_engine::schema::value::{parse_number, Snapshot, Value};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "preview")]
#[command(about = "Play through a story passage by passage")]
struct Cli {
    /// RON file (or directory of files) holding the passage list
    passages: PathBuf,

    /// Story config in RON
    #[arg(long)]
    config: Option<PathBuf>,

    /// RNG seed for (random:)
    #[arg(long)]
    seed: Option<u64>,

    /// Passage to open with
    #[arg(long)]
    start: Option<String>,
}

/// Player state carried between passages.
struct Session {
    snapshot: Snapshot,
    visits: Vec<String>,
    current: Option<Passage>,
}

impl Session {
    fn new() -> Self {
        Self {
            snapshot: Snapshot::new(),
            visits: Vec::new(),
            current: None,
        }
    }

    fn enter(&mut self, engine: &mut StoryEngine, name: &str) -> Result<(), StoryError> {
        let passage = engine.passage(name, Some(&self.snapshot), Some(self.visits.as_slice()))?;
        for (var, value) in &passage.state_changes {
            self.snapshot.insert(var.clone(), value.clone());
        }
        self.visits.push(passage.name.clone());
        show(engine, &passage, &self.snapshot);
        self.current = Some(passage);
        Ok(())
    }
}

fn main() {
    env_logger::Builder::from_default_env().init();
    let cli = Cli::parse();

    let mut builder = StoryEngine::builder().passages_path(&cli.passages);
    if let Some(ref path) = cli.config {
        builder = builder.config_path(path);
    }
    if let Some(seed) = cli.seed {
        builder = builder.seed(seed);
    }
    let mut engine = match builder.build() {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("ERROR: Failed to load story: {}", e);
            std::process::exit(1);
        }
    };

    println!("Loaded {} passages", engine.passage_names().len());
    println!("Type 'help' for commands.\n");

    let start = match cli.start.or_else(|| engine.start_name().map(str::to_string)) {
        Some(name) => name,
        None => {
            eprintln!("ERROR: story has no start passage");
            std::process::exit(1);
        }
    };

    let mut session = Session::new();
    if let Err(e) = session.enter(&mut engine, &start) {
        println!("ERROR: {}", e);
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("preview> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (cmd, rest) = match line.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd.to_lowercase(), rest.trim()),
            None => (line.to_lowercase(), ""),
        };

        match cmd.as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => {
                print_help();
            }
            "go" => {
                if rest.is_empty() {
                    println!("Usage: go <passage>");
                    continue;
                }
                if let Err(e) = session.enter(&mut engine, rest) {
                    println!("ERROR: {}", e);
                }
            }
            "vars" => {
                let mut names: Vec<&String> = session.snapshot.keys().collect();
                names.sort();
                if names.is_empty() {
                    println!("No variables set.");
                }
                for name in names {
                    println!("  ${} = {}", name, session.snapshot[name]);
                }
            }
            "set" => {
                let Some((name, raw)) = rest.split_once(char::is_whitespace) else {
                    println!("Usage: set <var> <value>");
                    continue;
                };
                let name = name.trim_start_matches('$').to_string();
                let value = parse_value(raw.trim());
                println!("${} = {}", name, value);
                session.snapshot.insert(name, value);
            }
            "history" => {
                for (i, name) in session.visits.iter().enumerate() {
                    println!("  {:>3}. {}", i + 1, name);
                }
            }
            "restart" => {
                session = Session::new();
                if let Err(e) = session.enter(&mut engine, &start) {
                    println!("ERROR: {}", e);
                }
            }
            _ => match line.parse::<usize>() {
                Ok(n) => {
                    let target = session
                        .current
                        .as_ref()
                        .and_then(|p| n.checked_sub(1).and_then(|i| p.choices.get(i)))
                        .map(|choice| choice.target.clone());
                    match target {
                        Some(target) => {
                            if let Err(e) = session.enter(&mut engine, &target) {
                                println!("ERROR: {}", e);
                            }
                        }
                        None => println!("No choice {}", n),
                    }
                }
                Err(_) => println!("Unknown command: {}. Type 'help' for commands.", cmd),
            },
        }
    }
}

fn parse_value(raw: &str) -> Value {
    match raw {
        "true" => Value::Boolean(true),
        "false" => Value::Boolean(false),
        other => match parse_number(other) {
            Some(n) => Value::Number(n),
            None => Value::text(other.trim_matches('"')),
        },
    }
}

fn show(engine: &mut StoryEngine, passage: &Passage, snapshot: &Snapshot) {
    if let Some(header) = engine.header_content(Some(snapshot)) {
        if !header.is_empty() {
            println!("[{}]", header);
        }
    }
    println!("\n=== {} ===", passage.name);
    println!("{}", passage.content);
    if let Some(footer) = engine.footer_content(Some(snapshot)) {
        if !footer.is_empty() {
            println!("\n[{}]", footer);
        }
    }
    if !passage.state_changes.is_empty() {
        println!("\n--- Changed ---");
        for (name, value) in &passage.state_changes {
            println!("  ${} = {}", name, value);
        }
    }
    println!("\n--- Choices ---");
    if passage.choices.is_empty() {
        println!("  (none)");
    }
    for (i, choice) in passage.choices.iter().enumerate() {
        let missing = if engine.has_passage(&choice.target) {
            ""
        } else {
            "  [missing]"
        };
        println!("  {}. {} -> {}{}", i + 1, choice.text, choice.target, missing);
    }
    println!();
}

fn print_help() {
    println!("Commands:");
    println!("  <n>             follow choice n");
    println!("  go <passage>    jump to a passage by name");
    println!("  vars            show current variables");
    println!("  set <var> <v>   set a variable (number, true/false, or text)");
    println!("  history         show visited passages");
    println!("  restart         clear state and return to the start passage");
    println!("  help            list commands");
    println!("  quit            exit");
}
