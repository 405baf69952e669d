//! Rewrites diagnostic paths relative to a base directory.
//!
//! Build-directory nesting makes clang-tidy print paths such as
//! `../../main/app.c`. Leading `../` climbs are dropped, the remainder is
//! anchored and made relative to the base directory. Files that still sit
//! outside the base afterwards (system headers, toolchain sources) are
//! printed as `/<segments>` so they stand apart from in-tree paths.

use std::fs;
use std::path::{Path, PathBuf};

use crate::diagnostic::{read_text_lossy, DiagnosticRecord};
use crate::error::{Result, TidyError};
use crate::paths::normalize_lexically;

fn remove_prefix<'a>(mut s: &'a str, prefix: &str) -> &'a str {
    while let Some(rest) = s.strip_prefix(prefix) {
        s = rest;
    }
    s
}

/// Rewrites diagnostic paths relative to `base_dir`.
#[derive(Debug, Clone)]
pub struct PathNormalizer {
    base_dir: PathBuf,
    anchor: PathBuf,
}

impl PathNormalizer {
    /// Relative paths are anchored on `base_dir` itself.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = normalize_lexically(&base_dir.into());
        Self {
            anchor: base_dir.clone(),
            base_dir,
        }
    }

    /// Anchor relative paths somewhere other than the base directory.
    pub fn with_anchor(mut self, anchor: impl Into<PathBuf>) -> Self {
        self.anchor = normalize_lexically(&anchor.into());
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Normalize a single path as printed by the tool.
    pub fn normalize_path(&self, raw: &str) -> String {
        let lexical = normalize_lexically(Path::new(raw));
        let lexical = lexical.to_string_lossy();
        let stripped = remove_prefix(&lexical, "../");

        let absolute = if Path::new(stripped).is_absolute() {
            PathBuf::from(stripped)
        } else {
            normalize_lexically(&self.anchor.join(stripped))
        };

        let relative = pathdiff::diff_paths(&absolute, &self.base_dir).unwrap_or(absolute);
        let relative = relative.to_string_lossy();

        if relative.starts_with("../") {
            format!("/{}", remove_prefix(&relative, "../"))
        } else {
            relative.into_owned()
        }
    }

    /// Rewrite the path span of one line; non-diagnostic lines come back unchanged.
    pub fn normalize_line<'a>(&self, line: &'a str) -> std::borrow::Cow<'a, str> {
        match DiagnosticRecord::parse_with_span(line) {
            Some((record, span)) => {
                let normalized = self.normalize_path(&record.path);
                let mut out = String::with_capacity(line.len());
                out.push_str(&line[..span.start]);
                out.push_str(&normalized);
                out.push_str(&line[span.end..]);
                std::borrow::Cow::Owned(out)
            }
            None => std::borrow::Cow::Borrowed(line),
        }
    }

    /// Rewrite a whole document, preserving line endings. Returns the text and the number of rewritten lines.
    pub fn normalize_text(&self, text: &str) -> (String, usize) {
        let mut out = String::with_capacity(text.len());
        let mut rewritten = 0usize;
        for line in text.split_inclusive('\n') {
            let normalized = self.normalize_line(line);
            if let std::borrow::Cow::Owned(_) = normalized {
                rewritten += 1;
            }
            out.push_str(&normalized);
        }
        (out, rewritten)
    }

    /// Rewrite a diagnostics file in place.
    pub fn normalize_file(&self, path: &Path) -> Result<usize> {
        let text = read_text_lossy(path)?;
        let (out, rewritten) = self.normalize_text(&text);
        fs::write(path, out).map_err(|e| TidyError::file_io(path, e))?;
        Ok(rewritten)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_climbs_are_stripped_before_relativizing() {
        let n = PathNormalizer::new("/proj");
        assert_eq!(n.normalize_path("../../main/src/foo.c"), "main/src/foo.c");
        assert_eq!(n.normalize_path("../../build/src/foo.c"), "build/src/foo.c");
    }

    #[test]
    fn test_absolute_in_tree() {
        let n = PathNormalizer::new("/proj");
        assert_eq!(n.normalize_path("/proj/components/log/log.c"), "components/log/log.c");
        assert_eq!(n.normalize_path("/proj/a/../b/c.c"), "b/c.c");
    }

    #[test]
    fn test_outside_base_gets_single_leading_slash() {
        let n = PathNormalizer::new("/proj/sub");
        assert_eq!(n.normalize_path("/usr/include/stdio.h"), "/usr/include/stdio.h");
        assert_eq!(n.normalize_path("/proj/other/x.h"), "/other/x.h");
    }

    #[test]
    fn test_custom_anchor() {
        let n = PathNormalizer::new("/proj").with_anchor("/proj/build");
        assert_eq!(n.normalize_path("esp-idf/app.c"), "build/esp-idf/app.c");
    }

    #[test]
    fn test_normalize_line_only_touches_path_span() {
        let n = PathNormalizer::new("/proj");
        let line = "/proj/main/app.c:3:4: warning: /proj/main/app.c shadows [bugprone-x]\n";
        assert_eq!(
            n.normalize_line(line),
            "main/app.c:3:4: warning: /proj/main/app.c shadows [bugprone-x]\n"
        );
        assert_eq!(n.normalize_line("Enabled checks:\n"), "Enabled checks:\n");
    }

    #[test]
    fn test_normalize_file_in_place() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let file = tmp.path().join("warnings.txt");
        fs::write(
            &file,
            "Enabled checks:\n../../main/a.c:1:1: warning: w [bugprone-x]\n  int a;\n",
        )
        .expect("write");

        let n = PathNormalizer::new("/proj");
        assert_eq!(n.normalize_file(&file).expect("normalize"), 1);
        let out = fs::read_to_string(&file).expect("read");
        assert_eq!(
            out,
            "Enabled checks:\nmain/a.c:1:1: warning: w [bugprone-x]\n  int a;\n"
        );
    }
}
