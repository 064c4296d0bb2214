//! Rewrites the version requirements a plugin declares
//!
//! PHP entry files carry `Requires at least:` / `Requires PHP:` in their
//! header comment; `readme.txt` carries them as plain `Key: value` lines.
//! Patching is line-anchored, PHP patches stay inside the first block comment
//! and only changed files are written, so a second run with the same versions
//! leaves every file byte-identical.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{debug, info};

use crate::error::RewriteError;
use crate::version::Version;

static PHP_HEADER_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());
static PHP_REQUIRES_WP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^([ \t]*\*?[ \t]*Requires at least:)[ \t]*[^\s*]*").unwrap()
});
static PHP_REQUIRES_PHP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^([ \t]*\*?[ \t]*Requires PHP:)[ \t]*[^\s*]*").unwrap()
});
static README_REQUIRES_WP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^Requires at least:[^\r\n]*").unwrap());
static README_REQUIRES_PHP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^Requires PHP:[^\r\n]*").unwrap());

const README: &str = "readme.txt";

/// A requirement field a plugin declares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    WordPress,
    Php,
}

impl Requirement {
    fn readme_key(&self) -> &'static str {
        match self {
            Requirement::WordPress => "Requires at least",
            Requirement::Php => "Requires PHP",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Requirement::WordPress => "WordPress",
            Requirement::Php => "PHP",
        }
    }
}

/// Set `field` in the header comment of a PHP file, keeping the key as
/// written. Code outside the first `/* ... */` block is never touched.
pub fn patch_php_header<'c>(content: &'c str, field: Requirement, version: &Version) -> Cow<'c, str> {
    let Some(header) = PHP_HEADER_BLOCK.find(content) else {
        return Cow::Borrowed(content);
    };
    let pattern = match field {
        Requirement::WordPress => &*PHP_REQUIRES_WP,
        Requirement::Php => &*PHP_REQUIRES_PHP,
    };

    match pattern.replace_all(header.as_str(), |caps: &Captures| format!("{} {}", &caps[1], version)) {
        Cow::Borrowed(_) => Cow::Borrowed(content),
        Cow::Owned(patched) => Cow::Owned(format!(
            "{}{}{}",
            &content[..header.start()],
            patched,
            &content[header.end()..]
        )),
    }
}

/// Set `field` on every readme line starting with its key
pub fn patch_readme<'c>(content: &'c str, field: Requirement, version: &Version) -> Cow<'c, str> {
    let pattern = match field {
        Requirement::WordPress => &*README_REQUIRES_WP,
        Requirement::Php => &*README_REQUIRES_PHP,
    };
    let line = format!("{}: {}", field.readme_key(), version);
    pattern.replace_all(content, regex::NoExpand(&line))
}

/// Versions to write; `None` leaves that field untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirements {
    pub wordpress: Option<Version>,
    pub php: Option<Version>,
}

impl Requirements {
    pub fn is_empty(&self) -> bool {
        self.wordpress.is_none() && self.php.is_none()
    }

    fn fields(&self) -> impl Iterator<Item = (Requirement, &Version)> {
        [
            (Requirement::WordPress, self.wordpress.as_ref()),
            (Requirement::Php, self.php.as_ref()),
        ]
        .into_iter()
        .filter_map(|(field, version)| version.map(|v| (field, v)))
    }
}

pub struct FileRewriter {
    base: String,
}

impl FileRewriter {
    /// `base` names the main plugin file, usually the working directory's name
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    /// Files that may declare requirements, whether or not they exist
    pub fn candidates(&self, dir: &Path) -> Vec<PathBuf> {
        let mut files = vec![
            dir.join(README),
            dir.join("index.php"),
            dir.join(format!("{}.php", self.base)),
        ];

        if let Some(dir_name) = dir.file_name().and_then(|n| n.to_str())
            && dir_name != self.base
        {
            files.push(dir.join(format!("{}-{}.php", self.base, dir_name)));
        }

        files
    }

    /// Patch every existing candidate in `dir`. Returns the files that changed.
    pub fn apply(&self, dir: &Path, requirements: &Requirements) -> Result<Vec<PathBuf>, RewriteError> {
        let mut changed = Vec::new();

        for file in self.candidates(dir) {
            if !file.is_file() {
                continue;
            }

            let original = fs::read_to_string(&file).map_err(|source| RewriteError::Io {
                path: file.clone(),
                source,
            })?;

            let is_readme = file.file_name().is_some_and(|n| n == README);
            let mut content = original.clone();
            let mut updated = Vec::new();
            for (field, version) in requirements.fields() {
                let patched = if is_readme {
                    patch_readme(&content, field, version)
                } else {
                    patch_php_header(&content, field, version)
                };
                if patched != content {
                    updated.push(field.label());
                    content = patched.into_owned();
                }
            }

            if content == original {
                debug!("{:?} already declares the requested versions", file);
                continue;
            }

            fs::write(&file, &content).map_err(|source| RewriteError::Io {
                path: file.clone(),
                source,
            })?;
            info!(
                "Updated minimum required {} version in {:?}",
                updated.join(" and "),
                file
            );
            changed.push(file);
        }

        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn version(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[rstest]
    #[case("/*\n * Requires at least: 5.0\n */\n", "/*\n * Requires at least: 6.5\n */\n")]
    #[case("/*\n * Requires at least:\n */\n", "/*\n * Requires at least: 6.5\n */\n")]
    #[case("/**\r\n * requires at least:   4.9\r\n */", "/**\r\n * requires at least: 6.5\r\n */")]
    #[case("/*\nRequires at least: 5.0\n*/\n", "/*\nRequires at least: 6.5\n*/\n")]
    #[case("/*\n * Requires at least: 5.0 */\n", "/*\n * Requires at least: 6.5 */\n")]
    #[case("/*\n * Requires at least: 6.5\n */\n", "/*\n * Requires at least: 6.5\n */\n")]
    #[case("/*\n * Version: 1.0\n */\n", "/*\n * Version: 1.0\n */\n")]
    #[case(
        "<?php\n/*\n * Requires at least: 5.0\n */\nprintf( __( 'Requires at least: %s, sorry.' ), $v );\n",
        "<?php\n/*\n * Requires at least: 6.5\n */\nprintf( __( 'Requires at least: %s, sorry.' ), $v );\n"
    )]
    #[case(
        "<?php\n$msg = 'Requires at least: %s';\n",
        "<?php\n$msg = 'Requires at least: %s';\n"
    )]
    fn patch_php_header_sets_field(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(
            patch_php_header(input, Requirement::WordPress, &version("6.5")),
            expected
        );
    }

    #[rstest]
    #[case("Requires at least: 6.2\nTested up to: 6.7\n", "Requires at least: 6.5\nTested up to: 6.7\n")]
    #[case("requires at least: 6.2\r\n", "Requires at least: 6.5\r\n")]
    #[case("Contributors: me\n  Requires at least: 6.2\n", "Contributors: me\n  Requires at least: 6.2\n")]
    fn patch_readme_sets_field(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(
            patch_readme(input, Requirement::WordPress, &version("6.5")),
            expected
        );
    }

    #[test]
    fn patch_readme_leaves_other_fields() {
        let input = "Requires at least: 6.2\nRequires PHP: 7.4\n";
        let patched = patch_readme(input, Requirement::WordPress, &version("6.5"));
        assert_eq!(patched, "Requires at least: 6.5\nRequires PHP: 7.4\n");
    }

    #[test]
    fn candidates_include_variant_when_names_differ() {
        let rewriter = FileRewriter::new("my-plugin");

        let same = rewriter.candidates(Path::new("/src/my-plugin"));
        assert_eq!(
            same,
            vec![
                PathBuf::from("/src/my-plugin/readme.txt"),
                PathBuf::from("/src/my-plugin/index.php"),
                PathBuf::from("/src/my-plugin/my-plugin.php"),
            ]
        );

        let other = rewriter.candidates(Path::new("/src/trunk"));
        assert_eq!(other.len(), 4);
        assert_eq!(other[3], PathBuf::from("/src/trunk/my-plugin-trunk.php"));
    }

    #[test]
    fn apply_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("my-plugin");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("my-plugin.php"),
            "<?php\n/**\n * Plugin Name: My Plugin\n * Requires at least: 5.0\n * Requires PHP: 7.0\n */\n",
        )
        .unwrap();
        fs::write(dir.join(README), "=== My Plugin ===\nRequires at least: 5.0\nRequires PHP: 7.0\n").unwrap();

        let requirements = Requirements {
            wordpress: Some(version("6.1")),
            php: Some(version("7.4")),
        };
        let rewriter = FileRewriter::new("my-plugin");

        let first = rewriter.apply(&dir, &requirements).unwrap();
        let after_first = fs::read(dir.join("my-plugin.php")).unwrap();
        let second = rewriter.apply(&dir, &requirements).unwrap();

        assert_eq!(first.len(), 2);
        assert!(second.is_empty());
        assert_eq!(fs::read(dir.join("my-plugin.php")).unwrap(), after_first);
        assert_eq!(
            fs::read_to_string(dir.join(README)).unwrap(),
            "=== My Plugin ===\nRequires at least: 6.1\nRequires PHP: 7.4\n"
        );
    }

    #[test]
    fn apply_leaves_plugin_code_intact() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("p");
        fs::create_dir_all(&dir).unwrap();
        let source = "<?php\n/**\n * Plugin Name: P\n * Requires at least: 5.0\n */\n\nfunction p_notice( $v ) {\n    printf( __( 'Requires at least: %s, sorry.' ), $v );\n}\n";
        fs::write(dir.join("p.php"), source).unwrap();

        let requirements = Requirements {
            wordpress: Some(version("6.5")),
            php: None,
        };
        let changed = FileRewriter::new("p").apply(&dir, &requirements).unwrap();

        assert_eq!(changed, vec![dir.join("p.php")]);
        assert_eq!(
            fs::read_to_string(dir.join("p.php")).unwrap(),
            source.replace(" * Requires at least: 5.0", " * Requires at least: 6.5")
        );
    }

    #[test]
    fn apply_without_php_version_keeps_php_field() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(README),
            "Requires at least: 6.2\nRequires PHP: 7.4\n",
        )
        .unwrap();

        let requirements = Requirements {
            wordpress: Some(version("6.5")),
            php: None,
        };
        FileRewriter::new("plugin")
            .apply(temp_dir.path(), &requirements)
            .unwrap();

        assert_eq!(
            fs::read_to_string(temp_dir.path().join(README)).unwrap(),
            "Requires at least: 6.5\nRequires PHP: 7.4\n"
        );
    }
}
