//! Clean command - delete stale `bin`/`obj` build output.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use serde::Serialize;
use tracing::{debug, warn};

/// Directory names treated as build output.
const OUTPUT_DIR_NAMES: &[&str] = &["bin", "obj"];

/// A target that could not be deleted.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedDir {
    pub path: PathBuf,
    pub reason: String,
}

/// What a clean run removed and what it had to leave behind.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanReport {
    pub root: PathBuf,
    pub removed: Vec<PathBuf>,
    pub skipped: Vec<SkippedDir>,
}

pub async fn run(dir: PathBuf, json: bool) -> Result<()> {
    if !dir.is_dir() {
        bail!("Not a directory: {}", dir.display());
    }

    let report = tokio::task::spawn_blocking(move || clean(&dir)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

pub fn print_report(report: &CleanReport) {
    if report.removed.is_empty() && report.skipped.is_empty() {
        println!("No bin/obj directories under {}.", report.root.display());
        return;
    }

    for path in &report.removed {
        println!("  removed  {}", path.display());
    }
    for skipped in &report.skipped {
        println!("  skipped  {} ({})", skipped.path.display(), skipped.reason);
    }
    println!(
        "\nRemoved {} director{}, skipped {}.",
        report.removed.len(),
        if report.removed.len() == 1 { "y" } else { "ies" },
        report.skipped.len()
    );
}

/// Whether `dir` directly contains a Visual Studio solution file.
pub fn is_solution_dir(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    entries.flatten().any(|entry| {
        entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("sln"))
    })
}

/// Delete every `bin`/`obj` directory below `root`.
///
/// Read-only attributes are cleared first. A directory that still cannot be
/// removed is reported as skipped and the run continues.
pub fn clean(root: &Path) -> CleanReport {
    let mut report = CleanReport {
        root: root.to_path_buf(),
        ..CleanReport::default()
    };

    for target in find_targets(root) {
        match force_remove(&target) {
            Ok(()) => {
                debug!(path = %target.display(), "Removed build output");
                report.removed.push(target);
            }
            Err(e) => {
                warn!(path = %target.display(), error = %e, "Failed to remove build output");
                report.skipped.push(SkippedDir {
                    path: target,
                    reason: e.to_string(),
                });
            }
        }
    }

    report
}

/// Build output directories below `root`, outermost only, sorted.
///
/// Symbolic links are never followed, and the root itself is not a target.
pub fn find_targets(root: &Path) -> Vec<PathBuf> {
    let mut targets = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(path = %dir.display(), error = %e, "Skipping unreadable directory");
                continue;
            }
        };

        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if !file_type.is_dir() {
                continue;
            }

            let path = entry.path();
            if is_output_dir(&path) {
                targets.push(path);
            } else {
                pending.push(path);
            }
        }
    }

    targets.sort();
    targets
}

fn is_output_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| OUTPUT_DIR_NAMES.iter().any(|o| name.eq_ignore_ascii_case(o)))
}

fn force_remove(path: &Path) -> io::Result<()> {
    make_writable(path)?;
    fs::remove_dir_all(path)
}

fn make_writable(path: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(path)?;
    if meta.file_type().is_symlink() {
        return Ok(());
    }

    let mut perms = meta.permissions();
    if perms.readonly() {
        set_writable(&mut perms);
        fs::set_permissions(path, perms)?;
    }

    if meta.is_dir() {
        for entry in fs::read_dir(path)? {
            make_writable(&entry?.path())?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn set_writable(perms: &mut fs::Permissions) {
    use std::os::unix::fs::PermissionsExt;
    perms.set_mode(perms.mode() | 0o200);
}

#[cfg(not(unix))]
#[allow(clippy::permissions_set_readonly_false)]
fn set_writable(perms: &mut fs::Permissions) {
    perms.set_readonly(false);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn set_readonly(path: &Path) {
        let mut perms = fs::metadata(path).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(path, perms).unwrap();
    }

    #[test]
    fn test_find_targets_outermost_and_case_insensitive() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("App/bin/Debug/bin")).unwrap();
        fs::create_dir_all(root.join("App/OBJ")).unwrap();
        fs::create_dir_all(root.join("Lib/Bin")).unwrap();
        fs::create_dir_all(root.join("Lib/binary")).unwrap();
        fs::create_dir_all(root.join("src/object")).unwrap();
        touch(&root.join("src/bin"));

        let mut expected = vec![root.join("App/bin"), root.join("App/OBJ"), root.join("Lib/Bin")];
        expected.sort();
        assert_eq!(find_targets(root), expected);
    }

    #[test]
    fn test_root_itself_is_not_a_target() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("bin");
        fs::create_dir_all(root.join("Debug")).unwrap();
        assert!(find_targets(&root).is_empty());
    }

    #[test]
    fn test_clean_removes_read_only_content() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let locked_file = root.join("App/obj/Debug/app.dll");
        touch(&locked_file);
        set_readonly(&locked_file);
        set_readonly(&root.join("App/obj/Debug"));
        touch(&root.join("App/Program.cs"));

        let report = clean(root);

        assert_eq!(report.removed, vec![root.join("App/obj")]);
        assert!(report.skipped.is_empty());
        assert!(!root.join("App/obj").exists());
        assert!(root.join("App/Program.cs").exists());
    }

    #[test]
    fn test_clean_with_nothing_to_do() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("README.md"));
        let report = clean(dir.path());
        assert!(report.removed.is_empty());
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn test_is_solution_dir() {
        let dir = tempdir().unwrap();
        assert!(!is_solution_dir(dir.path()));
        touch(&dir.path().join("App.SLN"));
        assert!(is_solution_dir(dir.path()));
    }
}
