//! Typed model of the deployment manifest.
//!
//! The manifest is plain text owned by version control. The pipeline
//! only ever rewrites the value of `image:` lines; every other byte is
//! preserved verbatim. Parsing into typed lines makes that invariant
//! explicit instead of relying on stream-editor substitution semantics.

use std::path::Path;

use crate::error::MutationError;

/// One line of a manifest document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestLine {
    /// A line whose content, after leading whitespace and an optional
    /// `- ` list marker, starts with `image:`. `prefix` holds the
    /// original bytes through the key and separator.
    Image { prefix: String, value: String },

    /// Any other line, preserved byte-for-byte.
    Opaque(String),
}

/// A parsed deployment manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestDocument {
    lines: Vec<ManifestLine>,
    trailing_newline: bool,
}

impl ManifestDocument {
    /// Parse manifest text into typed lines.
    pub fn parse(content: &str) -> Self {
        let trailing_newline = content.ends_with('\n');
        let body = if trailing_newline {
            &content[..content.len() - 1]
        } else {
            content
        };

        let lines = if body.is_empty() && !trailing_newline {
            Vec::new()
        } else {
            body.split('\n')
                .map(|line| match split_image_line(line) {
                    Some((prefix, value)) => ManifestLine::Image { prefix, value },
                    None => ManifestLine::Opaque(line.to_string()),
                })
                .collect()
        };

        Self {
            lines,
            trailing_newline,
        }
    }

    /// Serialize back to text. Round-trips unmodified input
    /// byte-identically, including trailing-newline presence.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            match line {
                ManifestLine::Image { prefix, value } => {
                    out.push_str(prefix);
                    out.push_str(value);
                }
                ManifestLine::Opaque(text) => out.push_str(text),
            }
        }
        if self.trailing_newline {
            out.push('\n');
        }
        out
    }

    /// Current image reference values, in document order.
    pub fn image_references(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|line| match line {
                ManifestLine::Image { value, .. } => Some(value.as_str()),
                ManifestLine::Opaque(_) => None,
            })
            .collect()
    }

    /// Replace the value of every image line with `new_reference` and
    /// return the number of lines rewritten. Global substitution is
    /// intentional: a manifest may declare the same image in multiple
    /// resource specs that must stay consistent.
    pub fn set_image(&mut self, new_reference: &str) -> usize {
        let mut count = 0;
        for line in &mut self.lines {
            if let ManifestLine::Image { value, .. } = line {
                *value = new_reference.to_string();
                count += 1;
            }
        }
        count
    }
}

/// Read the manifest at `path`, point every image line at
/// `new_reference`, and write it back.
///
/// Returns the number of rewritten lines. A manifest with zero image
/// lines is malformed and fails with [`MutationError::NoImageLine`];
/// it is never silently accepted.
pub fn rewrite_image_reference(path: &Path, new_reference: &str) -> Result<usize, MutationError> {
    let content = std::fs::read_to_string(path)?;
    let mut document = ManifestDocument::parse(&content);

    let count = document.set_image(new_reference);
    if count == 0 {
        return Err(MutationError::NoImageLine {
            path: path.display().to_string(),
        });
    }

    std::fs::write(path, document.render())?;
    Ok(count)
}

/// Split a line into (prefix, value) if it is an image line.
fn split_image_line(line: &str) -> Option<(String, String)> {
    let mut rest = line.trim_start();
    if let Some(after_dash) = rest.strip_prefix('-') {
        rest = after_dash.trim_start();
    }
    if !rest.starts_with("image:") {
        return None;
    }

    // `rest` starts with the key, so the first occurrence in the raw
    // line is the key itself (everything before it is whitespace or a
    // list marker).
    let key_end = line.find("image:")? + "image:".len();
    let after_key = &line[key_end..];
    let value = after_key.trim_start();
    let prefix_end = key_end + (after_key.len() - value.len());

    Some((line[..prefix_end].to_string(), value.to_string()))
}
