// tests/sql_confined.rs
// Fails if rusqlite is used outside the SQLite backing store.
// Allowed: src/sheets/database/ and the error type that wraps rusqlite errors.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

fn is_whitelisted(path: &Path) -> bool {
    let p = path.to_string_lossy().replace('\\', "/");
    p.contains("/sheets/database/") || p.ends_with("/sheets/error.rs")
}

#[test]
fn rusqlite_stays_inside_the_database_module() {
    let src_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");

    let files: Vec<PathBuf> = WalkDir::new(&src_dir)
        .into_iter()
        .filter_map(Result::ok)
        .map(|e| e.into_path())
        .filter(|p| p.extension().map(|s| s == "rs").unwrap_or(false))
        .collect();
    assert!(!files.is_empty(), "no sources found under {:?}", src_dir);

    let bad_patterns = ["rusqlite::", "use rusqlite", "Connection::open"];
    let mut offenders: Vec<(String, String)> = Vec::new();

    for file in files {
        if is_whitelisted(&file) {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };
        for pat in &bad_patterns {
            if content.contains(pat) {
                offenders.push((file.to_string_lossy().to_string(), pat.to_string()));
            }
        }
    }

    if !offenders.is_empty() {
        let mut msg = String::from("SQLite access found outside src/sheets/database:\n");
        for (file, pat) in offenders {
            msg.push_str(&format!(
                "  {} contains pattern '{}': go through the BackingStore trait instead\n",
                file, pat
            ));
        }
        panic!("{}", msg);
    }
}
