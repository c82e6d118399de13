//! Lightweight unified-diff utilities: file extraction, sanitization,
//! language detection, and token estimation.

use std::collections::BTreeSet;

/// Extract the file paths touched by a unified diff.
///
/// Recognizes `diff --git`, `--- a/`, and `+++ b/` headers; `/dev/null`
/// entries (new or deleted files) are skipped. Paths are returned sorted
/// and deduplicated.
///
/// # Examples
///
/// ```
/// use synod_review::diff::extract_files;
///
/// let diff = "diff --git a/src/lib.rs b/src/lib.rs\n\
///             --- a/src/lib.rs\n\
///             +++ b/src/lib.rs\n\
///             @@ -1 +1 @@\n\
///             -old\n\
///             +new\n";
/// assert_eq!(extract_files(diff), vec!["src/lib.rs"]);
/// ```
pub fn extract_files(diff: &str) -> Vec<String> {
    let mut files = BTreeSet::new();

    for line in diff.lines() {
        if let Some(rest) = line.strip_prefix("diff --git a/") {
            if let Some(path) = rest.split(" b/").next() {
                if !path.is_empty() {
                    files.insert(path.to_string());
                }
            }
            continue;
        }
        let header = line
            .strip_prefix("+++ b/")
            .or_else(|| line.strip_prefix("--- a/"));
        if let Some(path) = header {
            if !path.is_empty() && path != "/dev/null" {
                files.insert(path.to_string());
            }
        }
    }

    files.into_iter().collect()
}

/// Sanitize a diff before it reaches a prompt.
///
/// Strips NUL bytes and caps individual line length; a single pathological
/// line must not be able to blow up the prompt.
pub fn sanitize(diff: &str) -> String {
    const MAX_LINE_LENGTH: usize = 1000;

    let cleaned = diff.replace('\0', "");
    let lines: Vec<&str> = cleaned
        .lines()
        .map(|line| {
            if line.len() > MAX_LINE_LENGTH {
                // Truncate on a char boundary
                let mut end = MAX_LINE_LENGTH;
                while !line.is_char_boundary(end) {
                    end -= 1;
                }
                &line[..end]
            } else {
                line
            }
        })
        .collect();
    lines.join("\n")
}

/// Detect the dominant programming language of a diff from file extensions.
///
/// Returns `None` when no known extension appears.
///
/// # Examples
///
/// ```
/// use synod_review::diff::detect_language;
///
/// let diff = "+++ b/app/main.py\n+++ b/app/util.py\n+++ b/web/index.js\n";
/// assert_eq!(detect_language(diff).as_deref(), Some("python"));
/// ```
pub fn detect_language(diff: &str) -> Option<String> {
    let mut counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();

    for file in extract_files(diff) {
        let Some((_, ext)) = file.rsplit_once('.') else {
            continue;
        };
        let language = match ext.to_lowercase().as_str() {
            "py" => "python",
            "js" | "jsx" => "javascript",
            "ts" | "tsx" => "typescript",
            "java" => "java",
            "go" => "go",
            "rs" => "rust",
            "cpp" | "cc" | "hpp" => "c++",
            "c" | "h" => "c",
            "rb" => "ruby",
            "php" => "php",
            "swift" => "swift",
            "kt" => "kotlin",
            "scala" => "scala",
            "cs" => "csharp",
            _ => continue,
        };
        *counts.entry(language).or_default() += 1;
    }

    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(language, _)| language.to_string())
}

/// Rough token estimate for budgeting and metadata: ~4 characters per token.
///
/// Exact tokenizer counts are model-specific; this estimate only needs to be
/// deterministic and in the right ballpark.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.len() as u64).div_ceil(4)
}
