//! Upstream directory index listing.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use radar_common::RadarError;
use regex::Regex;
use reqwest::Client;
use tracing::{debug, instrument};

/// `<a ... href=...>` with a double-quoted, single-quoted or bare target.
static HREF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("href pattern is valid")
});

/// Lists candidate files in an HTTP directory index.
#[derive(Debug, Clone)]
pub struct DirectoryLister {
    client: Client,
    base_url: String,
    suffix: String,
}

impl DirectoryLister {
    pub fn new(client: Client, base_url: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            suffix: suffix.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// URL of a listed file.
    pub fn file_url(&self, name: &str) -> String {
        if self.base_url.ends_with('/') {
            format!("{}{}", self.base_url, name)
        } else {
            format!("{}/{}", self.base_url, name)
        }
    }

    /// Fetch the index and return the matching file names, sorted.
    #[instrument(skip(self), fields(url = %self.base_url))]
    pub async fn list(&self) -> Result<Vec<String>, RadarError> {
        let response = self
            .client
            .get(&self.base_url)
            .send()
            .await
            .map_err(|e| RadarError::fetch(&self.base_url, describe_reqwest_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RadarError::fetch(&self.base_url, format!("HTTP {}", status)));
        }

        let html = response
            .text()
            .await
            .map_err(|e| RadarError::fetch(&self.base_url, describe_reqwest_error(&e)))?;

        let names = parse_listing(&html, &self.suffix);
        if names.is_empty() {
            return Err(RadarError::EmptyListing {
                url: self.base_url.clone(),
                suffix: self.suffix.clone(),
            });
        }

        debug!(count = names.len(), "Listed upstream files");
        Ok(names)
    }
}

/// Extract link targets ending in `suffix` from an HTML index page.
///
/// Query strings, fragments and leading path segments are dropped, so
/// `/2D/x/a.grib2.gz?v=1` yields `a.grib2.gz`. The result is sorted and
/// free of duplicates.
pub fn parse_listing(html: &str, suffix: &str) -> Vec<String> {
    let names: BTreeSet<String> = HREF_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
        .filter_map(|m| file_name(m.as_str()))
        .filter(|name| name.ends_with(suffix))
        .map(str::to_string)
        .collect();

    names.into_iter().collect()
}

/// Final path segment of an href, without query or fragment.
fn file_name(href: &str) -> Option<&str> {
    let end = href.find(['?', '#']).unwrap_or(href.len());
    let path = href[..end].trim();
    let name = path.rsplit('/').next().unwrap_or(path);
    (!name.is_empty()).then_some(name)
}

pub(crate) fn describe_reqwest_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request timed out: {}", err)
    } else if err.is_connect() {
        format!("connection failed: {}", err)
    } else {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoting_styles() {
        let html = r#"
            <a href="a_20240101-000000.grib2.gz">a</a>
            <A HREF='b_20240101-000200.grib2.gz'>b</A>
            <a class="x" href=c_20240101-000400.grib2.gz>c</a>
        "#;
        assert_eq!(
            parse_listing(html, ".grib2.gz"),
            vec![
                "a_20240101-000000.grib2.gz",
                "b_20240101-000200.grib2.gz",
                "c_20240101-000400.grib2.gz"
            ]
        );
    }

    #[test]
    fn test_paths_queries_and_duplicates() {
        let html = r#"
            <a href="/2D/Refl/z.grib2.gz?download=1">z</a>
            <a href="https://host/2D/Refl/y.grib2.gz#top">y</a>
            <a href="y.grib2.gz">y again</a>
        "#;
        assert_eq!(parse_listing(html, ".grib2.gz"), vec!["y.grib2.gz", "z.grib2.gz"]);
    }

    #[test]
    fn test_non_matching_links_are_dropped() {
        let html = r#"
            <a href="?C=N;O=D">Name</a>
            <a href="/2D/">Parent Directory</a>
            <a href="x.grib2.gz.idx">index</a>
            <a href="x.grib2">raw</a>
            <link href="style.grib2.gz">
        "#;
        assert!(parse_listing(html, ".grib2.gz").is_empty());
    }

    #[test]
    fn test_file_url_joins_with_single_slash() {
        let client = Client::new();
        let with = DirectoryLister::new(client.clone(), "http://h/d/", ".gz");
        let without = DirectoryLister::new(client, "http://h/d", ".gz");
        assert_eq!(with.file_url("f.gz"), "http://h/d/f.gz");
        assert_eq!(without.file_url("f.gz"), "http://h/d/f.gz");
    }
}
