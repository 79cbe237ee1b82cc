use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vmflow::analysis::find_dangling_links;
use vmflow::model::StepType;
use vmflow::prelude::*;

/// Inspect and maintain VM Services stored in a repository directory
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Root directory of the repository
    #[arg(short, long, default_value = ".")]
    repository: PathBuf,

    /// Optional editor configuration JSON file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Known execution targets, used to check invoke targets
    #[arg(short, long = "target")]
    targets: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a service and print every message
    Validate {
        /// Service id, e.g. `orders.submit`
        id: String,
        /// Print messages as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the external ids a service depends on
    Refs { id: String },

    /// List pipeline elements no step uses
    Unused {
        id: String,
        /// Remove them and save the service
        #[arg(long)]
        remove: bool,
    },

    /// Rewrite the stored step document in its compact form
    Prettify { id: String },

    /// Replace a referenced id inside a service
    Rename {
        id: String,
        old_id: String,
        new_id: String,
        /// Patch the stored files without loading the service
        #[arg(long)]
        raw: bool,
    },

    /// Show the invocation order of every map
    Order {
        id: String,
        /// Recompute the orders from the link dependencies and save
        #[arg(long)]
        recompute: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EditorConfig::from_file(path)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to load configuration: {}", e))),
        None => EditorConfig::default(),
    };
    let repository = DirectoryRepository::new(&cli.repository)
        .with_config(&config)
        .with_targets(cli.targets.clone());
    let manager = ArtifactManager::new(repository, config);

    match cli.command {
        Command::Validate { id, json } => run_validate(&manager, &id, json),
        Command::Refs { id } => {
            let service = load(&manager, &id);
            for reference in manager.get_references(&service) {
                println!("{}", reference);
            }
        }
        Command::Unused { id, remove } => run_unused(&manager, &id, remove),
        Command::Prettify { id } => {
            let mut service = load(&manager, &id);
            save(&manager, &id, &mut service);
            println!("Rewrote {}", id);
        }
        Command::Rename {
            id,
            old_id,
            new_id,
            raw,
        } => run_rename(&manager, &id, &old_id, &new_id, raw),
        Command::Order { id, recompute } => run_order(&manager, &id, recompute),
    }
}

fn run_validate(manager: &ArtifactManager<DirectoryRepository>, id: &str, json: bool) {
    let mut service = load(manager, id);
    let messages = Validator::new(manager.config())
        .with_repository(manager.repository())
        .validate(&mut service);

    if json {
        let output = serde_json::to_string_pretty(&messages)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to encode messages: {}", e)));
        println!("{}", output);
    } else if messages.is_empty() {
        println!("{}: no findings", id);
    } else {
        for message in &messages {
            println!("{}", message);
        }
        let dangling = find_dangling_links(&service, manager.repository()).len();
        if dangling > 0 {
            println!("{} dangling link(s) found", dangling);
        }
    }

    if messages.iter().any(ValidationMessage::is_error) {
        std::process::exit(1);
    }
}

fn run_unused(manager: &ArtifactManager<DirectoryRepository>, id: &str, remove: bool) {
    let mut service = load(manager, id);
    let unused = if remove {
        remove_unused_elements(&mut service)
    } else {
        find_unused_pipeline_elements(&service)
    };

    if unused.is_empty() {
        println!("{}: every pipeline element is used", id);
        return;
    }
    for element in &unused {
        println!("{}", element);
    }
    if remove {
        save(manager, id, &mut service);
        println!("Removed {} element(s)", unused.len());
    }
}

fn run_rename(
    manager: &ArtifactManager<DirectoryRepository>,
    id: &str,
    old_id: &str,
    new_id: &str,
    raw: bool,
) {
    if raw {
        let entry = manager.repository().entry_path(id);
        let count = manager
            .update_broken_reference(&entry, old_id, new_id)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to patch '{}': {}", id, e)));
        println!("Patched {} reference(s)", count);
        return;
    }

    let mut service = load(manager, id);
    let count = rename_reference(&mut service, old_id, new_id);
    save(manager, id, &mut service);
    println!("Renamed {} reference(s)", count);
}

fn run_order(manager: &ArtifactManager<DirectoryRepository>, id: &str, recompute_orders: bool) {
    let mut service = load(manager, id);
    let maps: Vec<NodeId> = service
        .steps
        .depth_first()
        .into_iter()
        .filter(|n| service.steps.step_type(*n) == Some(StepType::Map))
        .collect();

    for map in &maps {
        if recompute_orders {
            for message in recompute(&mut service.steps, *map) {
                println!("{}", message);
            }
        }
        let label = service.steps.effective_comment(*map).unwrap_or("map");
        println!("{}", label);
        for (stage, group) in execution_plan(&service.steps, *map).iter().enumerate() {
            let names: Vec<String> = group
                .iter()
                .filter_map(|n| service.steps.step(*n).and_then(Step::as_invoke))
                .map(|i| format!("{} (order {})", i.service_id, i.invocation_order))
                .collect();
            println!("  {}: {}", stage + 1, names.join(", "));
        }
    }

    if recompute_orders {
        save(manager, id, &mut service);
    }
}

fn load(manager: &ArtifactManager<DirectoryRepository>, id: &str) -> VmService {
    let entry = manager.repository().entry_path(id);
    let mut service = manager
        .load(&entry)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to load '{}': {}", id, e)));
    service.id = id.to_string();
    service
}

fn save(manager: &ArtifactManager<DirectoryRepository>, id: &str, service: &mut VmService) {
    let entry = manager.repository().entry_path(id);
    let messages = manager
        .save(&entry, service)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to save '{}': {}", id, e)));
    for message in messages.iter().filter(|m| m.is_error()) {
        eprintln!("{}", message);
    }
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
