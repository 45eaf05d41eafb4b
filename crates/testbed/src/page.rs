//! Fetches pages served by the deployment and checks their link graph.

use crate::http::{client, http_error};
use regex::Regex;
use reqwest::Url;
use std::collections::HashSet;
use std::time::Duration;
use testbed_core::{Error, Result};

pub struct WebDriver {
    client: reqwest::Client,
    current_url: Option<Url>,
    page_source: String,
}

impl WebDriver {
    /// `accept_invalid_certs` allows pages signed by the testbed's own CA.
    pub fn new(timeout: Duration, accept_invalid_certs: bool) -> Result<Self> {
        Ok(Self {
            client: client(timeout, accept_invalid_certs)?,
            current_url: None,
            page_source: String::new(),
        })
    }

    /// Loads `url`, following redirects. Error statuses still load the page.
    pub async fn get(&mut self, url: &str) -> Result<()> {
        let url = Url::parse(url).map_err(|e| Error::Parse(format!("bad URL '{url}': {e}")))?;
        tracing::debug!(%url, "fetching page");
        let response = self.client.get(url).send().await.map_err(http_error)?;
        self.current_url = Some(response.url().clone());
        self.page_source = response.text().await.map_err(http_error)?;
        Ok(())
    }

    /// URL of the loaded page, after redirects.
    pub fn current_url(&self) -> Option<&Url> {
        self.current_url.as_ref()
    }

    pub fn page_source(&self) -> &str {
        &self.page_source
    }

    /// Fails the test if the page is empty or looks like an error page.
    pub fn validate_html(&self) {
        assert!(
            !self.page_source.trim().is_empty(),
            "page {:?} is empty",
            self.current_url.as_ref().map(Url::as_str)
        );
        assert!(
            !self.page_source.contains("404"),
            "page {:?} contains '404'",
            self.current_url.as_ref().map(Url::as_str)
        );
    }

    /// Fails the test unless stylesheets and images are served from this
    /// host and at least one link stays on it.
    ///
    /// Returns the links that point to other hosts.
    pub fn validate_links(&self) -> Result<HashSet<Url>> {
        let current = self
            .current_url
            .as_ref()
            .ok_or_else(|| Error::InvalidConfig("no page loaded".into()))?;
        check_links(current, &self.page_source)
    }
}

/// Values of `attr` on every `<tag>` element that has it.
pub fn extract_attrs(html: &str, tag: &str, attr: &str) -> Result<Vec<String>> {
    let pattern = format!(
        r#"(?is)<{tag}\b[^>]*?\b{attr}\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#
    );
    let re = Regex::new(&pattern).map_err(|e| Error::InvalidPattern {
        pattern: pattern.clone(),
        reason: e.to_string(),
    })?;
    Ok(re
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
        .map(|value| value.as_str().replace("&amp;", "&"))
        .collect())
}

fn resolve_all(current: &Url, html: &str, tag: &str, attr: &str) -> Result<Vec<Url>> {
    let values = extract_attrs(html, tag, attr)?;
    assert!(!values.is_empty(), "page {current} has no <{tag} {attr}> elements");
    values
        .iter()
        .map(|value| {
            current
                .join(value)
                .map_err(|e| Error::Parse(format!("bad {tag} {attr} '{value}': {e}")))
        })
        .collect()
}

pub fn check_links(current: &Url, html: &str) -> Result<HashSet<Url>> {
    let this_host = current.host_str();

    for tag in [("link", "href"), ("img", "src")] {
        for url in resolve_all(current, html, tag.0, tag.1)? {
            assert_eq!(
                url.host_str(),
                this_host,
                "<{} {}> {url} is not served from {current}",
                tag.0,
                tag.1
            );
        }
    }

    let (same, other): (Vec<Url>, Vec<Url>) = resolve_all(current, html, "a", "href")?
        .into_iter()
        .partition(|url| url.host_str() == this_host);
    assert!(!same.is_empty(), "page {current} has no links to its own host");
    Ok(other.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <link rel="stylesheet" href="/main.css">
  <link rel='icon' href=favicon.ico>
</head>
<body>
  <img src="/logo.png" alt="logo">
  <a href="/media/">Media</a>
  <A class="ext" HREF="https://example.com/docs?a=1&amp;b=2">Docs</A>
  <a name="anchor">no href</a>
</body>
</html>"#;

    fn current() -> Url {
        Url::parse("https://pi1.testbed/index.html").unwrap()
    }

    #[test]
    fn extracts_quoted_and_bare_values() {
        assert_eq!(
            extract_attrs(PAGE, "link", "href").unwrap(),
            vec!["/main.css", "favicon.ico"]
        );
        assert_eq!(
            extract_attrs(PAGE, "a", "href").unwrap(),
            vec!["/media/", "https://example.com/docs?a=1&b=2"]
        );
    }

    #[test]
    fn returns_off_host_links() {
        let other = check_links(&current(), PAGE).unwrap();
        let want: HashSet<Url> = [Url::parse("https://example.com/docs?a=1&b=2").unwrap()]
            .into_iter()
            .collect();
        assert_eq!(other, want);
    }

    #[test]
    #[should_panic(expected = "is not served from")]
    fn rejects_foreign_images() {
        let html = r#"<link href="/a.css"><img src="https://cdn.example.com/x.png"><a href="/">x</a>"#;
        let _ = check_links(&current(), html);
    }

    #[test]
    #[should_panic(expected = "has no <img src> elements")]
    fn requires_images() {
        let html = r#"<link href="/a.css"><a href="/">x</a>"#;
        let _ = check_links(&current(), html);
    }

    #[test]
    #[should_panic(expected = "has no links to its own host")]
    fn requires_a_local_link() {
        let html = r#"<link href="/a.css"><img src="/x.png"><a href="https://example.com/">x</a>"#;
        let _ = check_links(&current(), html);
    }

    #[test]
    fn validate_html_accepts_normal_page() {
        let driver = WebDriver {
            client: reqwest::Client::new(),
            current_url: Some(current()),
            page_source: PAGE.to_string(),
        };
        driver.validate_html();
    }

    #[test]
    #[should_panic(expected = "contains '404'")]
    fn validate_html_rejects_not_found() {
        let driver = WebDriver {
            client: reqwest::Client::new(),
            current_url: Some(current()),
            page_source: "<h1>404 Not Found</h1>".to_string(),
        };
        driver.validate_html();
    }

    #[test]
    fn validate_links_needs_a_page() {
        let driver = WebDriver::new(Duration::from_secs(1), false).unwrap();
        assert!(matches!(driver.validate_links(), Err(Error::InvalidConfig(_))));
    }
}
