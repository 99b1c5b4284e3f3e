//! URL content fetching.
//!
//! Downloads a page and reduces it to readable text so the extractor can
//! pull claims out of an article instead of raw markup. Chrome like the
//! script/style/nav removal is regex-based; good enough for news and blog
//! pages, which is what gets submitted for checking.

use anyhow::{Context, Result};
use regex::Regex;
use reqwest::Client;
use std::time::Duration;

const MAX_TEXT_LEN: usize = 20_000;

pub struct PageFetcher {
    client: Client,
    boilerplate_re: Regex,
    tag_re: Regex,
    whitespace_re: Regex,
}

impl PageFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36")
            .timeout(Duration::from_secs(15))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            boilerplate_re: Regex::new(
                r"(?is)<(script|style|header|footer|nav)[^>]*>.*?</(script|style|header|footer|nav)>",
            )
            .context("invalid boilerplate regex")?,
            tag_re: Regex::new(r"(?s)<[^>]+>").context("invalid tag regex")?,
            whitespace_re: Regex::new(r"\s+").context("invalid whitespace regex")?,
        })
    }

    /// Fetch `url` and return its visible text, truncated to a size the
    /// extractor can chew through.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed to fetch {url}"))?
            .error_for_status()
            .with_context(|| format!("non-success status from {url}"))?;
        let html = response.text().await.context("failed to read page body")?;
        let mut text = self.strip_html(&html);
        if text.len() > MAX_TEXT_LEN {
            let mut cut = MAX_TEXT_LEN;
            while cut > 0 && !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }
        Ok(text)
    }

    /// Strip markup down to whitespace-normalized text.
    pub fn strip_html(&self, html: &str) -> String {
        let without_boilerplate = self.boilerplate_re.replace_all(html, " ");
        let without_tags = self.tag_re.replace_all(&without_boilerplate, " ");
        let decoded = html_escape::decode_html_entities(&without_tags);
        self.whitespace_re.replace_all(&decoded, " ").trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_decodes_entities() {
        let fetcher = PageFetcher::new().unwrap();
        let html = "<html><body><p>Water boils at 100C &amp; freezes at &lt;0.</p></body></html>";
        assert_eq!(fetcher.strip_html(html), "Water boils at 100C & freezes at <0.");
    }

    #[test]
    fn drops_script_style_and_nav_blocks() {
        let fetcher = PageFetcher::new().unwrap();
        let html = concat!(
            "<head><style>p { color: red }</style></head>",
            "<nav><a href=\"/\">Home</a></nav>",
            "<script>var tracking = true;</script>",
            "<article>The claim itself.</article>",
            "<footer>Copyright</footer>",
        );
        assert_eq!(fetcher.strip_html(html), "The claim itself.");
    }

    #[test]
    fn collapses_whitespace_runs() {
        let fetcher = PageFetcher::new().unwrap();
        let html = "<div>one</div>\n\n  <div>two\tthree</div>";
        assert_eq!(fetcher.strip_html(html), "one two three");
    }
}
