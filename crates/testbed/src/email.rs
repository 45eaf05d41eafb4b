//! Client for the mail-capture service running on the `internet` VM.
//!
//! Every notification email the deployment sends ends up in the capture
//! service, which exposes it as JSON over `GET /api/emails`.

use crate::http::{client, ensure_success, http_error};
use crate::lines::full_match;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;
use testbed_core::Result;

/// One captured email, as returned by the capture service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapturedEmail(Value);

impl CapturedEmail {
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> &Value {
        &self.0
    }

    pub fn from(&self) -> &str {
        self.str_at("/from/value/0/address")
    }

    pub fn to(&self) -> &str {
        self.str_at("/to/value/0/address")
    }

    pub fn subject(&self) -> &str {
        self.str_at("/subject")
    }

    pub fn text(&self) -> &str {
        self.str_at("/text")
    }

    fn str_at(&self, pointer: &str) -> &str {
        self.0.pointer(pointer).and_then(Value::as_str).unwrap_or("")
    }
}

/// What a test expects an email to look like.
///
/// Addresses compare exactly. Subject and body are regexes that must match
/// the whole field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedEmail {
    pub from: String,
    pub to: String,
    pub subject_re: String,
    pub body_re: String,
}

impl ExpectedEmail {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        subject_re: impl Into<String>,
        body_re: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            subject_re: subject_re.into(),
            body_re: body_re.into(),
        }
    }
}

impl fmt::Display for ExpectedEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{from: {:?}, to: {:?}, subject_re: {:?}, body_re: {:?}}}",
            self.from, self.to, self.subject_re, self.body_re
        )
    }
}

pub struct Email {
    client: reqwest::Client,
    base_url: String,
    settle: Duration,
}

impl Email {
    /// `settle` is how long [`Email::clear`] waits for in-flight mail first.
    pub fn new(host: Ipv4Addr, port: u16, timeout: Duration, settle: Duration) -> Result<Self> {
        Ok(Self {
            client: client(timeout, false)?,
            base_url: format!("http://{host}:{port}"),
            settle,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Deletes every captured email.
    ///
    /// SSH login emails are sent asynchronously, so this first waits for
    /// those from earlier logins to arrive.
    pub async fn clear(&self) -> Result<()> {
        tokio::time::sleep(self.settle).await;
        let response = self
            .client
            .delete(self.url())
            .send()
            .await
            .map_err(http_error)?;
        ensure_success(response)?;
        Ok(())
    }

    /// Captured emails, optionally only those sent by host `only_from`.
    ///
    /// Emails with an empty sender are always kept.
    pub async fn get(&self, only_from: Option<&str>) -> Result<Vec<CapturedEmail>> {
        let response = self.client.get(self.url()).send().await.map_err(http_error)?;
        let emails: Vec<CapturedEmail> = ensure_success(response)?
            .json()
            .await
            .map_err(http_error)?;
        Ok(match only_from {
            Some(host) => filter_from(emails, host),
            None => emails,
        })
    }

    /// Fails the test unless the captured emails are exactly `want`.
    pub async fn assert_emails(&self, want: &[ExpectedEmail], only_from: Option<&str>) -> Result<()> {
        let got = self.get(only_from).await?;
        if let Some(failure) = exact_mismatch(&got, want)? {
            panic!("{failure}");
        }
        Ok(())
    }

    /// Fails the test unless every email in `want` was captured.
    pub async fn assert_has_emails(
        &self,
        want: &[ExpectedEmail],
        only_from: Option<&str>,
    ) -> Result<()> {
        let got = self.get(only_from).await?;
        if let Some(failure) = subset_mismatch(&got, want)? {
            panic!("{failure}");
        }
        Ok(())
    }

    fn url(&self) -> String {
        format!("{}/api/emails", self.base_url)
    }
}

pub fn filter_from(emails: Vec<CapturedEmail>, host: &str) -> Vec<CapturedEmail> {
    let sender = format!("notification@{host}.testbed");
    emails
        .into_iter()
        .filter(|email| email.from() == sender || email.from().is_empty())
        .collect()
}

/// Compares one email against an expectation.
///
/// Returns the failure message for the first field that differs.
pub fn match_email(want: &ExpectedEmail, got: &CapturedEmail) -> Result<Option<String>> {
    let field = if want.to != got.to() {
        Some(("to", want.to.as_str(), got.to()))
    } else if want.from != got.from() {
        Some(("from", want.from.as_str(), got.from()))
    } else if !full_match(&want.subject_re)?.is_match(got.subject()) {
        Some(("subject", want.subject_re.as_str(), got.subject()))
    } else if !full_match(&want.body_re)?.is_match(got.text()) {
        Some(("text", want.body_re.as_str(), got.text()))
    } else {
        None
    };

    let Some((name, want_field, got_field)) = field else {
        return Ok(None);
    };
    Ok(Some(format!(
        "Email field '{name}' doesn't match: want:\n{want_field}\ngot:\n{got_field}\nfull \
         want:\n{want}\nfull got:\n{}",
        serde_json::to_string_pretty(got.raw())?
    )))
}

/// Exact comparison: same number of emails, and after sorting both sides by
/// subject, each email matches its counterpart.
pub fn exact_mismatch(got: &[CapturedEmail], want: &[ExpectedEmail]) -> Result<Option<String>> {
    if got.len() != want.len() {
        return Ok(Some(format!(
            "Length of want and got differ ({} vs {}); all emails:\n{}",
            want.len(),
            got.len(),
            serde_json::to_string_pretty(got)?
        )));
    }

    let mut got: Vec<&CapturedEmail> = got.iter().collect();
    got.sort_by(|a, b| a.subject().cmp(b.subject()));
    let mut want: Vec<&ExpectedEmail> = want.iter().collect();
    want.sort_by(|a, b| a.subject_re.cmp(&b.subject_re));

    for (got, want) in got.into_iter().zip(want) {
        if let Some(failure) = match_email(want, got)? {
            return Ok(Some(failure));
        }
    }
    Ok(None)
}

/// Subset comparison: every expected email matches some captured one.
pub fn subset_mismatch(got: &[CapturedEmail], want: &[ExpectedEmail]) -> Result<Option<String>> {
    let mut got: Vec<&CapturedEmail> = got.iter().collect();
    got.sort_by(|a, b| a.subject().cmp(b.subject()));
    let mut want: Vec<&ExpectedEmail> = want.iter().collect();
    want.sort_by(|a, b| a.subject_re.cmp(&b.subject_re));

    for expected in want {
        let mut found = false;
        for email in &got {
            if match_email(expected, email)?.is_none() {
                found = true;
                break;
            }
        }
        if !found {
            return Ok(Some(format!(
                "Found no email matching:\n{expected}\nfull got:\n{}",
                serde_json::to_string_pretty(&got)?
            )));
        }
    }
    Ok(None)
}
