//! Page number encoding for listing URLs
//!
//! A listing URL carries its page in a single `p=<digits>` query token.
//! Page 1 is the default and is usually absent from the URL.

use regex::Regex;
use std::sync::OnceLock;

/// Page assumed when a URL has no page token
pub const FIRST_PAGE: u32 = 1;

fn page_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[?&]p=(\d+)").unwrap())
}

/// Extract the page number from a URL (1 when absent or malformed)
pub fn decode_page_number(url: &str) -> u32 {
    page_token()
        .captures(url)
        .and_then(|cap| cap[1].parse::<u32>().ok())
        .filter(|page| *page >= FIRST_PAGE)
        .unwrap_or(FIRST_PAGE)
}

/// Set the page number of a URL, appending the token if the URL has none
pub fn encode_page_number(url: &str, page: u32) -> String {
    match page_token().captures(url).and_then(|cap| cap.get(1)) {
        Some(value) => format!("{}{}{}", &url[..value.start()], page, &url[value.end()..]),
        None => append_token(url, page),
    }
}

/// Advance a URL to the following page
pub fn increment_page(url: &str) -> String {
    encode_page_number(url, decode_page_number(url).saturating_add(1))
}

fn append_token(url: &str, page: u32) -> String {
    // Keep a fragment at the end
    let (base, fragment) = match url.find('#') {
        Some(idx) => url.split_at(idx),
        None => (url, ""),
    };

    let separator = if !base.contains('?') {
        "?"
    } else if base.ends_with('?') || base.ends_with('&') {
        ""
    } else {
        "&"
    };

    format!("{}{}p={}{}", base, separator, page, fragment)
}
