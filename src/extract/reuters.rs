//! Body extraction for reuters.com article pages.

use super::BodyExtractor;
use scraper::{ElementRef, Html, Selector};

/// Tag-plus-class pair identifying a region to drop before extraction.
#[derive(Debug, Clone)]
struct NoiseBlock {
    tag: &'static str,
    class: &'static str,
}

impl NoiseBlock {
    fn matches(&self, element: &ElementRef<'_>) -> bool {
        element.value().name() == self.tag
            && element
                .value()
                .attr("class")
                .map_or(false, |classes| {
                    classes.split_ascii_whitespace().any(|c| c == self.class)
                })
    }
}

/// Extractor for Reuters article markup.
///
/// The selector set is fixed per implementation: headline and body regions
/// are located structurally, related-coverage blocks are discarded, and the
/// remaining markup is flattened to text with image elements and hyperlink
/// targets stripped (link text survives).
#[derive(Debug)]
pub struct ReutersExtractor {
    headline: Selector,
    body: Selector,
    noise: Vec<NoiseBlock>,
}

impl ReutersExtractor {
    pub fn new() -> Self {
        // Static selectors; parse cannot fail.
        Self {
            headline: Selector::parse("h1.ArticleHeader_headline").unwrap(),
            body: Selector::parse("div.StandardArticleBody_body").unwrap(),
            noise: vec![NoiseBlock {
                tag: "div",
                class: "RelatedCoverage_related-coverage-module",
            }],
        }
    }

    fn region_text(&self, root: ElementRef<'_>) -> String {
        let mut raw = String::new();
        self.collect_text(root, &mut raw);
        normalize(&raw)
    }

    fn collect_text(&self, element: ElementRef<'_>, out: &mut String) {
        for child in element.children() {
            if let Some(text) = child.value().as_text() {
                out.push_str(text);
            } else if let Some(el) = ElementRef::wrap(child) {
                let tag = el.value().name();
                if matches!(tag, "img" | "script" | "style") {
                    continue;
                }
                if self.noise.iter().any(|n| n.matches(&el)) {
                    continue;
                }
                self.collect_text(el, out);
                if matches!(tag, "p" | "div" | "br" | "li" | "h1" | "h2" | "h3") {
                    out.push('\n');
                }
            }
        }
    }
}

impl Default for ReutersExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl BodyExtractor for ReutersExtractor {
    fn extract(&self, raw_html: &str) -> String {
        let document = Html::parse_document(raw_html);
        let headline = document.select(&self.headline).next();
        let body = document.select(&self.body).next();

        if headline.is_none() && body.is_none() {
            return String::new();
        }

        let mut parts = Vec::new();
        if let Some(el) = headline {
            parts.push(self.region_text(el));
        }
        if let Some(el) = body {
            parts.push(self.region_text(el));
        }
        parts.retain(|p| !p.is_empty());
        parts.join("\n\n")
    }
}

/// Collapse runs of whitespace within lines and drop empty lines.
fn normalize(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE: &str = r#"
        <html><body>
            <h1 class="ArticleHeader_headline">Markets rally on rate news</h1>
            <div class="StandardArticleBody_body">
                <p>Stocks <a href="https://example.com/ref">rose sharply</a> on Monday.</p>
                <img src="chart.png" alt="chart"/>
                <div class="RelatedCoverage_related-coverage-module">
                    <p>Related: previous coverage</p>
                </div>
                <p>Analysts expect more.</p>
            </div>
        </body></html>
    "#;

    #[test]
    fn test_headline_and_body_extracted() {
        let text = ReutersExtractor::new().extract(ARTICLE);
        assert!(text.starts_with("Markets rally on rate news"));
        assert!(text.contains("Stocks rose sharply on Monday."));
        assert!(text.contains("Analysts expect more."));
    }

    #[test]
    fn test_link_text_kept_target_dropped() {
        let text = ReutersExtractor::new().extract(ARTICLE);
        assert!(text.contains("rose sharply"));
        assert!(!text.contains("example.com/ref"));
    }

    #[test]
    fn test_noise_block_discarded() {
        let text = ReutersExtractor::new().extract(ARTICLE);
        assert!(!text.contains("previous coverage"));
    }

    #[test]
    fn test_images_stripped() {
        let text = ReutersExtractor::new().extract(ARTICLE);
        assert!(!text.contains("chart.png"));
    }

    #[test]
    fn test_unrecognized_markup_yields_empty_string() {
        let html = "<html><body><p>Nothing recognizable here</p></body></html>";
        assert_eq!(ReutersExtractor::new().extract(html), "");
    }

    #[test]
    fn test_body_without_headline_still_extracts() {
        let html = r#"<div class="StandardArticleBody_body"><p>Body only.</p></div>"#;
        assert_eq!(ReutersExtractor::new().extract(html), "Body only.");
    }
}
