// README-to-rustdoc helper shared by every crate's build.rs.
// Pull it in with: include!("../build_common.rs");
//
// The including build.rs must import std::env, std::fs and std::path::Path.

/// Write `OUT_DIR/README_GENERATED.md` from the crate's README.md.
///
/// Links are rewritten so they resolve inside rustdoc: `src/` prefixes and
/// `.rs` suffixes are dropped, and links to the workspace README point at the
/// repository URL from the workspace manifest. A crate without a README gets
/// its package description instead, so `include_str!` always has a file.
fn process_readme_for_rustdoc(crate_dir: &str) {
    println!("cargo:rerun-if-changed=README.md");
    println!("cargo:rerun-if-changed=../../Cargo.toml");

    let readme = fs::read_to_string(Path::new(crate_dir).join("README.md")).unwrap_or_else(|_| {
        let name = env::var("CARGO_PKG_NAME").unwrap_or_default();
        let description = env::var("CARGO_PKG_DESCRIPTION").unwrap_or_default();
        format!("# {name}\n\n{description}\n")
    });

    let mut doc = readme.replace("](src/", "](").replace(".rs)", ")");
    if let Some(url) = workspace_repository(crate_dir) {
        doc = doc.replace("](../../README.md", &format!("]({url}"));
    }

    let out_dir = env::var("OUT_DIR").expect("cargo sets OUT_DIR for build scripts");
    fs::write(Path::new(&out_dir).join("README_GENERATED.md"), doc)
        .expect("OUT_DIR is writable");
}

/// `repository = "..."` from the workspace Cargo.toml, two levels up.
fn workspace_repository(crate_dir: &str) -> Option<String> {
    let manifest = Path::new(crate_dir).parent()?.parent()?.join("Cargo.toml");
    let content = fs::read_to_string(manifest).ok()?;

    content.lines().map(str::trim).find_map(|line| {
        let value = line.strip_prefix("repository")?.trim_start().strip_prefix('=')?;
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_owned())
    })
}
