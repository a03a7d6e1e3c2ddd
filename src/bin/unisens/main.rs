//! Unisens CLI - Tool for inspecting Unisens containers.

use std::env;
use std::path::Path;

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use unisens::entry::{
    CsvData, CustomData, CustomEntry, EventEntry, ReadMode, SignalEntry, ValuesEntry,
};
use unisens::{Entry, EntryKind, Unisens, UnisensOptions};

/// Install the log subscriber. `RUST_LOG` wins over the flags.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut level = "info";
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "warn",
            _ => filtered_args.push(arg),
        }
    }
    init_logging(level);

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    match filtered_args[0] {
        // Info command - show container summary
        "info" | "i" => {
            if filtered_args.len() < 2 {
                eprintln!("Error: missing folder argument");
                eprintln!("Usage: unisens-cli info <folder>");
                std::process::exit(1);
            }
            cmd_info(filtered_args[1]);
        }

        // Tree command - show entry hierarchy
        "tree" | "t" => {
            if filtered_args.len() < 2 {
                eprintln!("Error: missing folder argument");
                eprintln!("Usage: unisens-cli tree <folder>");
                std::process::exit(1);
            }
            cmd_tree(filtered_args[1]);
        }

        // Attrs command - show attributes of one entry
        "attrs" | "a" => {
            if filtered_args.len() < 3 {
                eprintln!("Error: missing arguments");
                eprintln!("Usage: unisens-cli attrs <folder> <entry>");
                std::process::exit(1);
            }
            cmd_attrs(filtered_args[1], filtered_args[2]);
        }

        // Data command - print the first records of an entry
        "data" | "d" => {
            if filtered_args.len() < 3 {
                eprintln!("Error: missing arguments");
                eprintln!("Usage: unisens-cli data <folder> <entry> [n]");
                std::process::exit(1);
            }
            let limit = match filtered_args.get(3).map(|s| s.parse::<usize>()) {
                Some(Ok(n)) => n,
                Some(Err(_)) => {
                    eprintln!("Error: [n] must be a number");
                    std::process::exit(1);
                }
                None => 10,
            };
            cmd_data(filtered_args[1], filtered_args[2], limit);
        }

        // Help
        "help" | "h" | "-h" | "--help" => print_help(),

        // Default: if folder exists, show info; otherwise error
        _ => {
            if Path::new(filtered_args[0]).is_dir() {
                cmd_info(filtered_args[0]);
            } else {
                eprintln!("Unknown command: {}", filtered_args[0]);
                eprintln!();
                print_help();
                std::process::exit(1);
            }
        }
    }
}

fn print_help() {
    println!("unisens-cli - Unisens container toolkit");
    println!();
    println!("USAGE:");
    println!("    unisens-cli [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    i, info   <folder>              Show container summary");
    println!("    t, tree   <folder>              Show full entry hierarchy");
    println!("    a, attrs  <folder> <entry>      Show attributes of an entry");
    println!("    d, data   <folder> <entry> [n]  Print the first n records (default 10)");
    println!("    h, help                         Show this help");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose    Show debug output");
    println!("    -vv, --trace     Show trace output (very verbose)");
    println!("    -q, --quiet      Only show warnings");
    println!();
    println!("EXAMPLES:");
    println!("    unisens-cli info recording/           # Quick overview");
    println!("    unisens-cli tree recording/           # See hierarchy");
    println!("    unisens-cli data recording/ ecg 5     # First 5 samples of ecg.bin");
    println!();
}

/// Open a container without ever writing to it.
fn open(folder: &str) -> Unisens {
    info!("Opening container: {}", folder);
    let opts = UnisensOptions::new().readonly(true);
    match Unisens::open_with(folder, opts) {
        Ok(u) if u.document_path().is_file() => u,
        Ok(_) => {
            eprintln!("No {} in {}", unisens::container::DEFAULT_FILENAME, folder);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Failed to open {}: {}", folder, e);
            std::process::exit(1);
        }
    }
}

fn lookup(u: &Unisens, key: &str) -> Entry {
    match u.get(key) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}

#[derive(Default)]
struct EntryCounts {
    signal: usize,
    values: usize,
    event: usize,
    custom: usize,
    other: usize,
}

fn count_entries(entry: &Entry, counts: &mut EntryCounts) {
    for child in entry.children() {
        match child.kind() {
            EntryKind::Signal => counts.signal += 1,
            EntryKind::Values => counts.values += 1,
            EntryKind::Event => counts.event += 1,
            EntryKind::Custom => counts.custom += 1,
            _ => counts.other += 1,
        }
        count_entries(&child, counts);
    }
}

fn cmd_info(folder: &str) {
    let u = open(folder);
    debug!("Container opened successfully");

    println!("{}", u);
    println!("Comment:        {}", u.comment());
    println!("Start:          {}", u.timestamp_start().unwrap_or_default());
    println!("Version:        {}", u.version().unwrap_or_default());
    println!();

    let mut counts = EntryCounts::default();
    count_entries(&u, &mut counts);
    println!("Entries:");
    println!("  Signals:  {}", counts.signal);
    println!("  Values:   {}", counts.values);
    println!("  Events:   {}", counts.event);
    println!("  Custom:   {}", counts.custom);
    println!("  Metadata: {}", counts.other);

    let missing: Vec<String> = u
        .entries()
        .iter()
        .filter(|e| e.kind().is_file() && !e.file_exists())
        .filter_map(Entry::id)
        .collect();
    if !missing.is_empty() {
        println!();
        println!("Missing files: {}", missing.join(", "));
    }
}

fn cmd_tree(folder: &str) {
    let u = open(folder);
    println!("{}", u.document_path().display());
    println!();
    print_tree(&u, 0);
}

fn print_tree(entry: &Entry, depth: usize) {
    let indent = "  ".repeat(depth);
    if depth > 0 {
        match entry.id() {
            Some(id) => println!("{}{} [{}]", indent, id, entry.name()),
            None => println!("{}<{}>", indent, entry.name()),
        }
    } else {
        println!("{}/", entry.name());
    }
    for child in entry.children() {
        print_tree(&child, depth + 1);
    }
}

fn cmd_attrs(folder: &str, key: &str) {
    let u = open(folder);
    let entry = lookup(&u, key);
    println!("{} [{}]", entry.key(), entry.name());
    for (k, v) in entry.attrs().iter() {
        println!("  {} = {}", k, v);
    }
    let channels = entry.channel_names();
    if !channels.is_empty() {
        println!("  channels: {}", channels.join(", "));
    }
}

fn cmd_data(folder: &str, key: &str, limit: usize) {
    let u = open(folder);
    let entry = lookup(&u, key);
    if let Err(e) = print_data(entry, limit) {
        eprintln!("Failed to read {}: {}", key, e);
        std::process::exit(1);
    }
}

fn print_data(entry: Entry, limit: usize) -> unisens::Result<()> {
    match entry.kind() {
        EntryKind::Signal => {
            let signal = SignalEntry::try_from(entry)?;
            let data = signal.get_data(true)?;
            println!("{}", signal.channel_names().join("\t"));
            for sample in data.transpose().iter_rows().take(limit) {
                let fields: Vec<String> = sample.iter().map(|v| v.to_string()).collect();
                println!("{}", fields.join("\t"));
            }
        }
        EntryKind::Values | EntryKind::Event => {
            let data = if entry.kind() == EntryKind::Values {
                ValuesEntry::try_from(entry)?.get_data_as(ReadMode::Strings)?
            } else {
                EventEntry::try_from(entry)?.get_data_as(ReadMode::Strings)?
            };
            if let CsvData::Strings(rows) = data {
                for row in rows.iter().take(limit) {
                    println!("{}", row.join("\t"));
                }
            }
        }
        EntryKind::Custom => {
            let custom = CustomEntry::try_from(entry)?;
            match custom.get_data(None)? {
                CustomData::Text(text) => {
                    for line in text.lines().take(limit) {
                        println!("{}", line);
                    }
                }
                CustomData::Json(value) => println!("{:#}", value),
                CustomData::Records(rows) => {
                    for row in rows.iter().take(limit) {
                        let fields: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                        println!("{}", fields.join("\t"));
                    }
                }
                CustomData::Bytes(bytes) => println!("{} bytes", bytes.len()),
                other => println!("{:?}", other),
            }
        }
        _ => println!("<{}> has no data file", entry.name()),
    }
    Ok(())
}
