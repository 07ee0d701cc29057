// src/registry/glob.rs

//! Glob expansion for the `glob` task and command-task `inputs`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::fs::FileSystem;

/// Compile a set of glob patterns, relative to a project root.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Collect every file under `root` whose root-relative path (with forward
/// slashes) matches `set`. The result is sorted so listings are stable.
pub fn collect_matching_files(fs: &dyn FileSystem, root: &Path, set: &GlobSet) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) {
                if let Ok(rel) = path.strip_prefix(root) {
                    let rel_str = rel.to_string_lossy().replace('\\', "/");
                    if set.is_match(&rel_str) {
                        files.push(path);
                    }
                }
            }
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn matches_relative_paths_recursively() {
        let fs = MockFileSystem::new();
        fs.add_file("./examples/Bars.elm", "module Bars");
        fs.add_file("./examples/nested/Pie.elm", "module Pie");
        fs.add_file("./examples/README.md", "# Examples");
        fs.add_file("./build/Bars.js", "compiled");

        let set = build_globset(&["examples/**/*.elm".to_string()]).unwrap();
        let files = collect_matching_files(&fs, Path::new("."), &set).unwrap();

        let names: Vec<String> = files
            .iter()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["./examples/Bars.elm", "./examples/nested/Pie.elm"]);
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        assert!(build_globset(&["src/[".to_string()]).is_err());
    }
}
