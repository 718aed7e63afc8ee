use std::env;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

fn main() {
    // Askama compiles templates into the binary.
    watch_templates(Path::new("templates"));
    println!("cargo:rerun-if-env-changed=PORTAL_BUILD_ID");

    let build_id = env::var("PORTAL_BUILD_ID")
        .ok()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(timestamp_id);
    println!("cargo:rustc-env=PORTAL_BUILD_ID={build_id}");
}

fn timestamp_id() -> String {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => format!("dev-{}", elapsed.as_secs()),
        Err(_) => "dev".to_string(),
    }
}

fn watch_templates(dir: &Path) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    println!("cargo:rerun-if-changed={}", dir.display());
    for path in entries.flatten().map(|entry| entry.path()) {
        if path.is_dir() {
            watch_templates(&path);
        } else if path.extension().is_some_and(|ext| ext == "html") {
            println!("cargo:rerun-if-changed={}", path.display());
        }
    }
}
