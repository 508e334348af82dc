//! HTML race pages reduced to text for the extraction chain.

use regex::Regex;
use scraper::{Html, Node};
use std::sync::LazyLock;

static START_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([01]?\d|2[0-3])[h:]([0-5]\d)\b").expect("start time pattern")
});

/// Elements whose text never holds runners
const SKIPPED_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Visible text of a page, one trimmed text node per line
pub fn page_text(html: &str) -> String {
    let document = Html::parse_document(html);

    document
        .tree
        .nodes()
        .filter_map(|node| {
            let Node::Text(text) = node.value() else {
                return None;
            };
            let parent = node.parent()?;
            if let Some(element) = parent.value().as_element() {
                if SKIPPED_ELEMENTS.contains(&element.name()) {
                    return None;
                }
            }
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// First start time on the page, as "13h50"
pub fn start_time(text: &str) -> Option<String> {
    START_TIME
        .captures(text)
        .map(|caps| format!("{:0>2}h{}", &caps[1], &caps[2]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::Extractor;

    const PAGE: &str = r#"
        <html>
          <head><style>.runner { color: red; }</style><script>var odds = 9.9;</script></head>
          <body>
            <h1>Prix de Vincennes</h1>
            <p class="depart">Départ 13h50</p>
            <table>
              <tr><td>1</td><td>BOLD EAGLE</td><td>4.5</td></tr>
              <tr><td>2</td><td>FACE TIME</td><td>1.8</td></tr>
            </table>
          </body>
        </html>
    "#;

    #[test]
    fn test_page_text_skips_scripts_and_styles() {
        let text = page_text(PAGE);
        assert!(text.contains("BOLD EAGLE"));
        assert!(!text.contains("9.9"));
        assert!(!text.contains("color"));
    }

    #[test]
    fn test_page_runners_extracted() {
        let extraction = Extractor::default().extract(&page_text(PAGE)).unwrap();
        assert_eq!(extraction.strategy, "block");
        assert_eq!(extraction.runners.len(), 2);
        assert_eq!(extraction.runners[1].name, "FACE TIME");
    }

    #[test]
    fn test_start_time() {
        assert_eq!(start_time("Départ 13h50").as_deref(), Some("13h50"));
        assert_eq!(start_time("Off at 9:05").as_deref(), Some("09h05"));
        assert_eq!(start_time("no time"), None);
    }
}
