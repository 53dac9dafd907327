//! Extension-table language classifier. No content sniffing.

/// Classify a canonical path into a language label, or `"unknown"`.
#[must_use]
pub fn classify_language(canonical_path: &str) -> &'static str {
    let file_name = canonical_path
        .rsplit('/')
        .next()
        .unwrap_or(canonical_path);
    let extension = file_name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");

    match extension {
        "py" | "pyi" => "python",
        "rs" => "rust",
        "js" | "mjs" | "cjs" => "javascript",
        "ts" | "tsx" => "typescript",
        "jsx" => "javascript",
        "go" => "go",
        "java" => "java",
        "rb" => "ruby",
        "c" | "h" => "c",
        "cc" | "cpp" | "cxx" | "hpp" => "cpp",
        "cs" => "csharp",
        "sh" | "bash" => "shell",
        "md" | "markdown" => "markdown",
        "rst" => "restructuredtext",
        "toml" => "toml",
        "yaml" | "yml" => "yaml",
        "json" => "json",
        "xml" => "xml",
        "html" | "htm" => "html",
        "css" => "css",
        "sql" => "sql",
        "txt" => "text",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions_classify() {
        assert_eq!(classify_language("src/app.py"), "python");
        assert_eq!(classify_language("src/lib.rs"), "rust");
        assert_eq!(classify_language("docs/README.md"), "markdown");
        assert_eq!(classify_language("requirements.txt"), "text");
    }

    #[test]
    fn unknown_and_extensionless_fall_through() {
        assert_eq!(classify_language("Makefile"), "unknown");
        assert_eq!(classify_language("data/blob.bin"), "unknown");
    }
}
