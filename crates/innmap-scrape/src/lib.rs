//! innmap scraping layer
//!
//! Fetches the wanderinginn.com table of contents and chapter pages and
//! reduces them to the structures the rest of the pipeline consumes. This is
//! untrusted network tooling with respectful defaults: a politeness delay
//! between requests, a robots.txt check (cached per host), and a body size
//! cap. Parsing is separated from fetching so the selectors are testable on
//! fixture HTML.

use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};

use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use scraper::{Html, Selector};
use url::Url;

use innmap_model::{Chapter, Toc};

/// The table-of-contents page.
pub const TOC_URL: &str = "https://wanderinginn.com/table-of-contents/";

/// Errors from fetching or parsing.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("invalid url {url}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to build http client")]
    Client(#[source] reqwest::Error),
    #[error("failed to fetch {url}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("{url} disallowed by robots.txt")]
    RobotsDisallowed { url: String },
    #[error("{url} body of {len} bytes exceeds cap of {max}")]
    TooLarge { url: String, len: usize, max: usize },
    #[error("no chapters found in table of contents")]
    NoChapters,
}

/// Fetch settings.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Delay between requests in milliseconds (politeness).
    pub delay_ms: u64,
    /// Consult robots.txt before each fetch.
    pub respect_robots: bool,
    /// Skip pages larger than this many bytes.
    pub max_html_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "innmap/0.1 (+https://github.com/innmap/innmap)".to_string(),
            timeout_secs: 20,
            delay_ms: 1000,
            respect_robots: true,
            max_html_bytes: 4_000_000,
        }
    }
}

/// A polite HTTP fetcher with per-host robots.txt caching.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
    robots_cache: HashMap<String, String>,
    last_request: Option<Instant>,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self, ScrapeError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("innmap")),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(ScrapeError::Client)?;

        Ok(Self {
            client,
            config,
            robots_cache: HashMap::new(),
            last_request: None,
        })
    }

    /// Fetch a page as HTML, honoring the politeness delay, robots.txt, and
    /// the size cap.
    pub fn fetch_html(&mut self, url: &str) -> Result<String, ScrapeError> {
        let parsed = Url::parse(url).map_err(|source| ScrapeError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        if self.config.respect_robots && !self.robots_allows(&parsed) {
            return Err(ScrapeError::RobotsDisallowed {
                url: url.to_string(),
            });
        }

        if let Some(last) = self.last_request {
            let delay = Duration::from_millis(self.config.delay_ms);
            let elapsed = last.elapsed();
            if elapsed < delay {
                thread::sleep(delay - elapsed);
            }
        }
        self.last_request = Some(Instant::now());

        tracing::debug!(%url, "fetching");
        let resp = self
            .client
            .get(parsed.clone())
            .send()
            .map_err(|source| ScrapeError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = resp.bytes().map_err(|source| ScrapeError::Http {
            url: url.to_string(),
            source,
        })?;
        if bytes.len() > self.config.max_html_bytes {
            return Err(ScrapeError::TooLarge {
                url: url.to_string(),
                len: bytes.len(),
                max: self.config.max_html_bytes,
            });
        }

        Ok(String::from_utf8_lossy(&bytes).to_string())
    }

    /// Fetch and parse the table of contents.
    pub fn fetch_toc(&mut self) -> Result<Toc, ScrapeError> {
        let html = self.fetch_html(TOC_URL)?;
        parse_toc(&html)
    }

    /// Fetch a chapter page and reduce it to plaintext.
    pub fn fetch_chapter(&mut self, url: &str) -> Result<String, ScrapeError> {
        let html = self.fetch_html(url)?;
        Ok(extract_chapter_text(&html))
    }

    fn robots_allows(&mut self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return true;
        };
        let key = match url.port() {
            Some(port) => format!("{}://{host}:{port}", url.scheme()),
            None => format!("{}://{host}", url.scheme()),
        };

        if !self.robots_cache.contains_key(&key) {
            let body = self.fetch_robots_txt(url).unwrap_or_default();
            self.robots_cache.insert(key.clone(), body);
        }
        let body = &self.robots_cache[&key];

        // Missing or empty robots.txt allows everything.
        if body.trim().is_empty() {
            return true;
        }

        let mut matcher = robotstxt::DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(body, &self.config.user_agent, url.as_str())
    }

    fn fetch_robots_txt(&self, url: &Url) -> Option<String> {
        let mut robots_url = url.clone();
        robots_url.set_path("/robots.txt");
        robots_url.set_query(None);
        robots_url.set_fragment(None);

        let resp = self.client.get(robots_url).send().ok()?;
        if !resp.status().is_success() {
            return None;
        }
        resp.text().ok()
    }
}

/// Extract chapter data from the table-of-contents HTML.
///
/// Each `.volume-wrapper` carries its volume id; each `.chapter-entry` in it
/// yields one chapter. Entries with no web title or URL are skipped.
/// Sequential indices are assigned in document order.
pub fn parse_toc(html: &str) -> Result<Toc, ScrapeError> {
    let doc = Html::parse_document(html);
    let volume_sel = Selector::parse(".volume-wrapper").unwrap();
    let entry_sel = Selector::parse(".chapter-entry").unwrap();
    let link_sel = Selector::parse(".body-web a").unwrap();
    let audiobook_sel = Selector::parse(".body-audiobook").unwrap();
    let ebook_sel = Selector::parse(".body-ebook").unwrap();
    let slug_re = Regex::new(r"/([^/]+)/?$").unwrap();

    let mut chapters = Vec::new();
    let mut index = 0usize;

    for volume in doc.select(&volume_sel) {
        let volume_id = volume.value().attr("id").unwrap_or_default().to_string();

        for entry in volume.select(&entry_sel) {
            let link = entry.select(&link_sel).next();
            let web_title = link
                .map(|a| a.text().collect::<String>().trim().to_string())
                .unwrap_or_default();
            let url = link
                .and_then(|a| a.value().attr("href"))
                .unwrap_or_default()
                .to_string();

            if web_title.is_empty() || url.is_empty() {
                continue;
            }

            let slug = slug_re
                .captures(url.trim_end_matches('/'))
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();

            let book_number = entry
                .value()
                .attr("data-book-number")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(0);

            let audiobook_chapter = entry
                .select(&audiobook_sel)
                .next()
                .map(|e| e.text().collect::<String>().trim().to_string())
                .unwrap_or_default();
            let ebook_chapter = entry
                .select(&ebook_sel)
                .next()
                .map(|e| e.text().collect::<String>().trim().to_string())
                .unwrap_or_default();

            chapters.push(Chapter {
                web_title,
                url,
                volume: volume_id.clone(),
                book_number,
                audiobook_chapter,
                ebook_chapter,
                slug,
                index,
            });
            index += 1;
        }
    }

    if chapters.is_empty() {
        return Err(ScrapeError::NoChapters);
    }

    Ok(Toc {
        chapters,
        scraped_at: String::new(),
    })
}

/// Pull plaintext from a chapter page: the trimmed text of every paragraph in
/// the reader article, joined with blank lines.
pub fn extract_chapter_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let paragraph_sel = Selector::parse("#reader-content article.twi-article p").unwrap();

    let mut paragraphs = Vec::new();
    for p in doc.select(&paragraph_sel) {
        let text = p.text().collect::<String>().trim().to_string();
        if !text.is_empty() {
            paragraphs.push(text);
        }
    }

    paragraphs.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOC_HTML: &str = r#"
    <html><body>
      <div class="volume-wrapper" id="vol-1">
        <div class="chapter-entry" data-book-number="1">
          <div class="body-web"><a href="https://wanderinginn.com/2016/07/27/1-00/">1.00</a></div>
          <div class="body-audiobook">Ch 1</div>
          <div class="body-ebook">Ch 1</div>
        </div>
        <div class="chapter-entry" data-book-number="1">
          <div class="body-web"><a href="https://wanderinginn.com/2016/07/31/1-01/">1.01</a></div>
          <div class="body-audiobook">Ch 2</div>
          <div class="body-ebook"></div>
        </div>
        <div class="chapter-entry">
          <div class="body-web"><a href=""></a></div>
        </div>
      </div>
      <div class="volume-wrapper" id="vol-2">
        <div class="chapter-entry">
          <div class="body-web"><a href="https://wanderinginn.com/2017/01/01/2-00/">2.00</a></div>
        </div>
      </div>
    </body></html>
    "#;

    #[test]
    fn toc_parses_volumes_and_chapters() {
        let toc = parse_toc(TOC_HTML).unwrap();
        assert_eq!(toc.chapters.len(), 3);

        let first = &toc.chapters[0];
        assert_eq!(first.web_title, "1.00");
        assert_eq!(first.volume, "vol-1");
        assert_eq!(first.slug, "1-00");
        assert_eq!(first.book_number, 1);
        assert_eq!(first.audiobook_chapter, "Ch 1");
        assert_eq!(first.index, 0);

        let third = &toc.chapters[2];
        assert_eq!(third.web_title, "2.00");
        assert_eq!(third.volume, "vol-2");
        assert_eq!(third.slug, "2-00");
        assert_eq!(third.book_number, 0);
        assert_eq!(third.index, 2);
    }

    #[test]
    fn empty_toc_is_an_error() {
        assert!(matches!(
            parse_toc("<html><body></body></html>"),
            Err(ScrapeError::NoChapters)
        ));
    }

    #[test]
    fn chapter_text_joins_paragraphs() {
        let html = r#"
        <html><body>
          <div id="reader-content">
            <article class="twi-article">
              <p>The inn sat on a hill.</p>
              <p>  </p>
              <p>It was <em>old</em>.</p>
            </article>
          </div>
          <p>Footer junk outside the article.</p>
        </body></html>
        "#;
        let text = extract_chapter_text(html);
        assert_eq!(text, "The inn sat on a hill.\n\nIt was old.");
    }

    #[test]
    fn chapter_text_of_unrelated_page_is_empty() {
        assert_eq!(extract_chapter_text("<html><body><p>hi</p></body></html>"), "");
    }
}
