//! Binary to generate/update the expected output of the fixtures
//!
//! Usage:
//!   cargo run --bin accept_expected            # Update all
//!   cargo run --bin accept_expected -- kotlin  # Update only fixtures matching "kotlin"
//!
//! Debug maps (`tests/fixtures/smap/*.smap`) get a `.expected` listing;
//! those under `errors/` must fail to decode and get a `.expected.err` with
//! the rendered error. Pages (`tests/fixtures/pages/*.jsp`) get a
//! `.expected` line classification.

use source_locator::markup::{count_lines, parse_str};
use source_locator::DebugMap;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

fn main() {
    let filter: Option<String> = std::env::args().nth(1);
    let fixture_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");

    let mut updated = 0;
    let mut skipped = 0;

    for entry in WalkDir::new(&fixture_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map(|s| s == "smap" || s == "jsp")
                .unwrap_or(false)
        })
    {
        let path = entry.path();
        let path_str = path.to_string_lossy();

        if let Some(ref f) = filter {
            if !path_str.contains(f) {
                skipped += 1;
                continue;
            }
        }

        let source = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Failed to read {:?}: {}", path, e);
                continue;
            }
        };

        if path.extension().map(|s| s == "jsp").unwrap_or(false) {
            let metrics = count_lines(&parse_str(&source));
            write(&path.with_extension("expected"), &metrics.to_listing());
        } else {
            process_debug_map(path, &source);
        }
        updated += 1;
    }

    println!("Updated {} files, skipped {}", updated, skipped);
}

fn write(path: &Path, contents: &str) {
    if let Err(e) = fs::write(path, contents) {
        eprintln!("Failed to write {:?}: {}", path, e);
    } else {
        println!("  wrote {}", path.display());
    }
}

fn process_debug_map(path: &Path, source: &str) {
    let is_error_test = path.to_string_lossy().contains("/errors/");

    match DebugMap::decode(source) {
        Ok(map) => {
            if is_error_test {
                eprintln!("ERROR: {:?} is in errors/ but decodes cleanly", path);
                return;
            }
            write(&path.with_extension("expected"), &map.to_listing());
        }
        Err(e) => {
            if is_error_test {
                let filename = path.file_name().and_then(|s| s.to_str()).unwrap_or("unknown");
                write(&path.with_extension("expected.err"), &e.render(source, filename));
            } else {
                eprintln!("ERROR: {:?} failed to decode but is not in errors/: {}", path, e);
            }
        }
    }
}
