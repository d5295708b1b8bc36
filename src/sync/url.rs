//! Feed URL codec: tags travel as a `+`-joined list of percent-encoded
//! values, the free-text search as `q`.

use std::borrow::Cow;

pub const FEED_PATH: &str = "/feed";

fn percent_decode(raw: &str) -> Cow<'_, str> {
    urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw))
}

/// Decode a form-encoded query value (`+` means space).
fn form_decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode(&spaced).into_owned()
}

/// Parse the raw (still encoded) `tags` value of a query string.
pub fn parse_tags_from_query(raw: &str) -> Vec<String> {
    raw.split('+')
        .map(|tag| percent_decode(tag.trim()).trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Parse a `tags` value that has already been form-decoded, where the `+`
/// separators may have turned into spaces.
pub fn parse_tags_param(decoded: &str) -> Vec<String> {
    decoded
        .split(|c: char| c == '+' || c.is_whitespace())
        .map(|tag| percent_decode(tag).trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect()
}

pub fn build_tags_query(tags: &[String]) -> String {
    tags.iter()
        .map(|tag| urlencoding::encode(tag).into_owned())
        .collect::<Vec<_>>()
        .join("+")
}

pub fn build_feed_url_with_tags(tags: &[String]) -> String {
    build_feed_url_with_tags_and_search(tags, "", &[])
}

/// Build `/feed?tags=..&q=..&<extra>`. `tags` and `q` entries in `preserve`
/// are ignored; a blank search is omitted.
pub fn build_feed_url_with_tags_and_search(
    tags: &[String],
    search_query: &str,
    preserve: &[(String, String)],
) -> String {
    let mut parts = Vec::new();

    if !tags.is_empty() {
        parts.push(format!("tags={}", build_tags_query(tags)));
    }

    let query = search_query.trim();
    if !query.is_empty() {
        parts.push(format!("q={}", urlencoding::encode(query)));
    }

    for (key, value) in preserve {
        if key != "tags" && key != "q" {
            parts.push(format!("{}={}", key, urlencoding::encode(value)));
        }
    }

    if parts.is_empty() {
        FEED_PATH.to_string()
    } else {
        format!("{}?{}", FEED_PATH, parts.join("&"))
    }
}

/// Split a full or relative URL into its path and raw query string.
fn split_url(url: &str) -> (&str, &str) {
    let without_fragment = url.split('#').next().unwrap_or_default();
    let after_host = match without_fragment.find("://") {
        Some(idx) => {
            let rest = &without_fragment[idx + 3..];
            rest.find(['/', '?']).map_or("", |start| &rest[start..])
        }
        None => without_fragment,
    };
    match after_host.split_once('?') {
        Some((path, query)) => (path, query),
        None => (after_host, ""),
    }
}

/// Raw `key=value` pairs of a query string, values left encoded.
fn raw_pairs(query: &str) -> impl Iterator<Item = (&str, &str)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
}

/// Filter state carried by a feed URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedQuery {
    pub tags: Vec<String>,
    pub search_query: String,
    /// Other parameters, decoded, in original order.
    pub extra: Vec<(String, String)>,
}

impl FeedQuery {
    /// Extract filters from a feed URL. Returns `None` for non-feed paths.
    pub fn from_url(url: &str) -> Option<Self> {
        let (path, query) = split_url(url);
        if !path.contains(FEED_PATH) {
            return None;
        }

        let mut feed = FeedQuery::default();
        for (key, value) in raw_pairs(query) {
            match key {
                "tags" => feed.tags = parse_tags_from_query(value),
                "q" => feed.search_query = form_decode(value),
                _ => feed.extra.push((form_decode(key), form_decode(value))),
            }
        }
        Some(feed)
    }

    pub fn to_url(&self) -> String {
        build_feed_url_with_tags_and_search(&self.tags, &self.search_query, &self.extra)
    }
}

/// URL to return to the feed with the filters of the last visited feed page.
/// The stored URL wins over the referrer; both fall back to `/feed`.
pub fn back_to_feed_url(stored: Option<&str>, referrer: Option<&str>) -> String {
    stored
        .and_then(FeedQuery::from_url)
        .or_else(|| referrer.and_then(FeedQuery::from_url))
        .map(|feed| build_feed_url_with_tags_and_search(&feed.tags, &feed.search_query, &[]))
        .unwrap_or_else(|| FEED_PATH.to_string())
}
