//! Domain tokens and the line-delimited domain list
//!
//! A [`Domain`] is the unit of work: an opaque, non-empty token read from the
//! target list. This module also owns the deterministic artifact naming and the
//! small name × extension generator that produces target lists.

use crate::ScreenshotError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;

/// An opaque, non-empty domain token such as `example.com` or `https://example.com`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Domain(String);

impl Domain {
    /// Trims the token and rejects it if nothing is left.
    pub fn parse(raw: &str) -> Result<Self, ScreenshotError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ScreenshotError::Input("empty domain token".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The navigable address: `https://` is prepended unless the token is already schemed.
    pub fn address(&self) -> String {
        if self.0.starts_with("http://") || self.0.starts_with("https://") {
            self.0.clone()
        } else {
            format!("https://{}", self.0)
        }
    }

    /// Artifact file name: every `.` becomes `_`, suffixed with `.png`.
    ///
    /// ```rust
    /// use domain_screenshot::Domain;
    ///
    /// let domain = Domain::parse("a.b-c.com").unwrap();
    /// assert_eq!(domain.artifact_file_name(), "a_b-c_com.png");
    /// ```
    pub fn artifact_file_name(&self) -> String {
        format!("{}.png", self.0.replace('.', "_"))
    }

    pub fn artifact_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(self.artifact_file_name())
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Domain {
    type Error = ScreenshotError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Domain::parse(&value)
    }
}

impl From<Domain> for String {
    fn from(domain: Domain) -> Self {
        domain.0
    }
}

/// Parses list content: one token per line, blank lines and `#` comments skipped.
pub fn parse_domain_list(content: &str) -> Vec<Domain> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| Domain::parse(line).ok())
        .collect()
}

pub async fn read_domain_list(path: &Path) -> Result<Vec<Domain>, ScreenshotError> {
    let content = fs::read_to_string(path).await.map_err(|e| {
        ScreenshotError::Input(format!("cannot read domain list {}: {}", path.display(), e))
    })?;
    Ok(parse_domain_list(&content))
}

/// Combines every name with every extension, bare and `www.`-prefixed, sorted.
///
/// Extensions are appended verbatim, so they carry their own leading dot.
pub fn generate_domains(names: &[String], extensions: &[String]) -> Vec<String> {
    let mut domains = Vec::with_capacity(names.len() * extensions.len() * 2);

    for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        for ext in extensions.iter().map(|e| e.trim()).filter(|e| !e.is_empty()) {
            domains.push(format!("{name}{ext}"));
            domains.push(format!("www.{name}{ext}"));
        }
    }

    domains.sort();
    domains
}

/// Reads the name and extension lists, writes the generated target list and
/// returns how many domains were written.
pub async fn generate_domain_file(
    names_path: &Path,
    extensions_path: &Path,
    target_path: &Path,
) -> Result<usize, ScreenshotError> {
    let names = read_lines(names_path).await?;
    let extensions = read_lines(extensions_path).await?;

    let domains = generate_domains(&names, &extensions);
    let mut content = domains.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }

    fs::write(target_path, content).await.map_err(|e| {
        ScreenshotError::Output(format!("cannot write {}: {}", target_path.display(), e))
    })?;

    Ok(domains.len())
}

async fn read_lines(path: &Path) -> Result<Vec<String>, ScreenshotError> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| ScreenshotError::Input(format!("cannot read {}: {}", path.display(), e)))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
