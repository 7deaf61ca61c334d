//! Evolib CLI - Inspect reaction spaces and search results.

use std::path::PathBuf;
use std::process;

use evolib::{
    compute::{ReactionEnumerator, ReactionLibrary, SpeciesAlphabet, evolution::read_progress},
    schema::EnumeratorConfig,
};

fn usage(program: &str) -> ! {
    eprintln!("Usage: {program} <command> [args]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  enumerate <data.csv> [max_left] [max_right]");
    eprintln!("      Print the reaction space over the species of a reference dataset");
    eprintln!("      (arity bounds default to 2).");
    eprintln!("  show <progress.csv>");
    eprintln!("      Print the best library recorded in a progress log.");
    process::exit(1);
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("evolib");

    match args.get(1).map(String::as_str) {
        Some("enumerate") if args.len() >= 3 => {
            let max_left = parse_bound(args.get(3), program);
            let max_right = parse_bound(args.get(4), program);
            enumerate(PathBuf::from(&args[2]), max_left, max_right);
        }
        Some("show") if args.len() >= 3 => show(PathBuf::from(&args[2])),
        _ => usage(program),
    }
}

fn parse_bound(arg: Option<&String>, program: &str) -> usize {
    match arg {
        None => 2,
        Some(s) => s.parse().unwrap_or_else(|_| {
            eprintln!("Invalid arity bound: {s}");
            usage(program)
        }),
    }
}

fn enumerate(data_path: PathBuf, max_left: usize, max_right: usize) {
    let alphabet = SpeciesAlphabet::from_csv(&data_path).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {e}", data_path.display());
        process::exit(1);
    });

    let config = EnumeratorConfig {
        max_num_left: max_left,
        max_num_right: max_right,
        shuffle: false,
        species_names: alphabet.names().to_vec(),
        ..EnumeratorConfig::new(alphabet.len())
    };
    let enumerator = ReactionEnumerator::new(config).unwrap_or_else(|e| {
        eprintln!("Invalid reaction space: {e}");
        process::exit(1);
    });

    println!("Species: {}", alphabet.names().join(", "));
    println!(
        "Sides: {} left x {} right",
        enumerator.lhs_count(),
        enumerator.rhs_count()
    );
    println!("Library size: {}", enumerator.get_number(false));
    println!("Admissible: {}", enumerator.admissible_count());
    println!();

    for reaction in enumerator.iter() {
        println!("{}", reaction.display_with(alphabet.names()));
    }
}

fn show(progress_path: PathBuf) {
    let records = read_progress(&progress_path).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {e}", progress_path.display());
        process::exit(1);
    });
    let Some(last) = records.last() else {
        eprintln!("Progress log {} has no rows", progress_path.display());
        process::exit(1);
    };

    let library = last
        .snapshot()
        .map_err(|e| e.to_string())
        .and_then(|s| ReactionLibrary::from_snapshot(s).map_err(|e| e.to_string()))
        .unwrap_or_else(|e| {
            eprintln!("Invalid model in step {}: {e}", last.step);
            process::exit(1);
        });

    println!("Step: {}", last.step);
    println!("Current fittest: {}", last.curr_fittest);
    println!("Overall fittest: {}", last.overall_fittest);
    println!("Overall fittest norm: {}", last.overall_fittest_norm);
    println!();
    print!("{}", library.print_model());
}
