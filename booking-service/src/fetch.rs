use std::time::Duration;

use async_trait::async_trait;
use shared::Error;
use tracing::debug;

/// Default request deadline; the feed URL is operator-supplied but the
/// host on the other end is not under our control.
pub const DEFAULT_FEED_TIMEOUT: Duration = Duration::from_secs(30);

/// Cap on accepted payload size. Real feeds are a few KiB; anything in
/// the megabytes is either broken or hostile.
pub const MAX_FEED_BYTES: usize = 2 * 1024 * 1024;

const CALENDAR_MARKER: &str = "BEGIN:VCALENDAR";

/// Server-side feed download indirection. Everything that talks to an
/// external calendar goes through this seam, which also lets the test
/// suite substitute canned payloads.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, Error>;
}

pub struct HttpFeedFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpFeedFetcher {
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Download(e.to_string()))?;
        Ok(Self {
            client,
            max_bytes: MAX_FEED_BYTES,
        })
    }
}

/// Appends a downloaded chunk, rejecting the feed as soon as the
/// running total passes the cap. A host that lies about (or omits)
/// Content-Length never gets more than `max_bytes` buffered.
fn push_limited(buf: &mut Vec<u8>, chunk: &[u8], max_bytes: usize) -> Result<(), Error> {
    if buf.len() + chunk.len() > max_bytes {
        return Err(Error::Download(format!(
            "feed payload exceeds the {max_bytes} byte cap"
        )));
    }
    buf.extend_from_slice(chunk);
    Ok(())
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<String, Error> {
        debug!("downloading calendar feed from {}", url);
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Download(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Download(format!(
                "feed host answered with status {status}"
            )));
        }
        if let Some(length) = response.content_length() {
            if length as usize > self.max_bytes {
                return Err(Error::Download(format!(
                    "feed payload of {length} bytes exceeds the {} byte cap",
                    self.max_bytes
                )));
            }
        }

        let mut buf = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::Download(e.to_string()))?
        {
            push_limited(&mut buf, &chunk, self.max_bytes)?;
        }
        let body = String::from_utf8(buf)
            .map_err(|_| Error::Download("feed payload is not valid UTF-8".to_string()))?;
        if !body.trim_start().starts_with(CALENDAR_MARKER) {
            return Err(Error::Download(
                "payload does not start with an iCalendar header".to_string(),
            ));
        }
        Ok(body)
    }
}
