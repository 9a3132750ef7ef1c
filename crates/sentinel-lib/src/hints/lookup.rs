//! Finding the elements that display a resource

use crate::placement::RenderedElement;
use url::Url;

/// Tags worth searching and the attributes that carry their URLs
const URL_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("img", &["src", "srcset"]),
    ("script", &["src"]),
    ("link", &["href"]),
    ("iframe", &["src"]),
    ("embed", &["src"]),
    ("object", &["data"]),
    ("source", &["src", "srcset"]),
    ("track", &["src"]),
    ("audio", &["src"]),
    ("video", &["src", "poster"]),
    ("input", &["src"]),
    ("frame", &["src"]),
];

/// Elements that can reference a URL at all
///
/// Anything with inline style may carry a `background-image: url(...)`.
fn is_candidate(element: &RenderedElement) -> bool {
    element.attributes.contains_key("style")
        || URL_ATTRIBUTES.iter().any(|(tag, attributes)| {
            element.is_tag(tag)
                && attributes
                    .iter()
                    .any(|name| element.attributes.contains_key(*name))
        })
}

/// Part of a resource URL that relative and absolute references share
///
/// Path, query and fragment of a parseable URL; the raw string otherwise.
pub fn search_term(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => {
            let mut term = parsed.path().to_string();
            if let Some(query) = parsed.query() {
                term.push('?');
                term.push_str(query);
            }
            if let Some(fragment) = parsed.fragment() {
                term.push('#');
                term.push_str(fragment);
            }
            term
        }
        Err(_) => url.to_string(),
    }
}

/// All candidate elements with an attribute value containing the URL
pub fn find_elements_with_url<'a>(
    elements: &'a [RenderedElement],
    url: &str,
) -> Vec<&'a RenderedElement> {
    let term = search_term(url).to_lowercase();
    // a bare "/" would match every element
    if term.len() <= 1 {
        return Vec::new();
    }

    elements
        .iter()
        .filter(|element| is_candidate(element))
        .filter(|element| {
            element
                .attributes
                .values()
                .any(|value| value.to_lowercase().contains(&term))
        })
        .collect()
}
