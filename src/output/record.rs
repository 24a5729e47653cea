// src/output/record.rs
// =============================================================================
// What a worker reports for every page it fetched.
//
// A PageReport is the structured form; an OutputRecord is the finished line
// of bytes that travels through the channel to the output sink. Records are
// either tab-separated text or one JSON object per line (--json).
// =============================================================================

use serde::Serialize;

/// One finished output line, without its trailing newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRecord(Box<[u8]>);

impl OutputRecord {
    pub fn new(bytes: impl Into<Box<[u8]>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

// The outcome of fetching one page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    /// 2xx response
    Ok,
    /// 3xx response
    Redirect,
    /// 4xx or 5xx response
    HttpError,
    /// The response header could not be parsed
    InvalidHeader,
    /// Connecting or reading failed
    FetchError,
}

impl PageStatus {
    fn as_str(self) -> &'static str {
        match self {
            PageStatus::Ok => "ok",
            PageStatus::Redirect => "redirect",
            PageStatus::HttpError => "http_error",
            PageStatus::InvalidHeader => "invalid_header",
            PageStatus::FetchError => "fetch_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageReport {
    pub url: String,
    pub status: PageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// References found in the body
    pub links: usize,
    /// References that were new and got queued
    pub queued: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PageReport {
    pub fn new(url: impl Into<String>, status: PageStatus) -> Self {
        Self {
            url: url.into(),
            status,
            code: None,
            content_type: None,
            links: 0,
            queued: 0,
            redirect: None,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn to_record(&self, format: OutputFormat) -> OutputRecord {
        match format {
            OutputFormat::Json => {
                // A struct of strings and integers always serializes
                let line = serde_json::to_vec(self).unwrap_or_default();
                OutputRecord::new(line)
            }
            OutputFormat::Text => OutputRecord::new(self.text_line().into_bytes()),
        }
    }

    // status, code, url, links, queued, detail
    fn text_line(&self) -> String {
        let code = self
            .code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        let detail = self
            .redirect
            .as_deref()
            .or(self.message.as_deref())
            .unwrap_or("");

        format!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.status.as_str(),
            code,
            self.url,
            self.links,
            self.queued,
            sanitize(detail)
        )
    }
}

// Keeps a detail string on one line and one column
fn sanitize(detail: &str) -> String {
    detail
        .chars()
        .map(|c| if c == '\t' || c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PageReport {
        let mut report = PageReport::new("http://example.com/", PageStatus::Ok);
        report.code = Some(200);
        report.content_type = Some("text/html".to_string());
        report.links = 12;
        report.queued = 5;
        report
    }

    #[test]
    fn test_text_record() {
        let record = sample().to_record(OutputFormat::Text);
        assert_eq!(record.as_bytes(), b"ok\t200\thttp://example.com/\t12\t5\t");
    }

    #[test]
    fn test_text_record_without_code() {
        let report = PageReport::new("http://down.example/", PageStatus::FetchError)
            .with_message("connection refused\r\n");
        let record = report.to_record(OutputFormat::Text);
        assert_eq!(
            record.as_bytes(),
            b"fetch_error\t-\thttp://down.example/\t0\t0\tconnection refused  "
        );
    }

    #[test]
    fn test_json_record() {
        let record = sample().to_record(OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_slice(record.as_bytes()).unwrap();

        assert_eq!(value["url"], "http://example.com/");
        assert_eq!(value["status"], "ok");
        assert_eq!(value["code"], 200);
        assert_eq!(value["links"], 12);
        assert!(value.get("redirect").is_none());
    }

    #[test]
    fn test_redirect_detail() {
        let mut report = PageReport::new("http://a/", PageStatus::Redirect);
        report.code = Some(301);
        report.redirect = Some("http://b/".to_string());
        let record = report.to_record(OutputFormat::Text);
        assert_eq!(record.as_bytes(), b"redirect\t301\thttp://a/\t0\t0\thttp://b/");
    }
}
