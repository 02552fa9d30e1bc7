//! page command: inspect or rewrite the page number of a listing URL

use crate::page_url::{decode_page_number, encode_page_number, increment_page};
use anyhow::Result;
use clap::Args;
use serde::Serialize;

#[derive(Args)]
pub struct PageArgs {
    /// Listing URL
    pub url: String,

    /// Rewrite the URL to this page
    #[arg(long, conflicts_with = "next", value_parser = clap::value_parser!(u32).range(1..))]
    pub set: Option<u32>,

    /// Rewrite the URL to the following page
    #[arg(long)]
    pub next: bool,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PageOutput {
    pub url: String,
    pub page: u32,
}

pub async fn run_page(args: PageArgs) -> Result<()> {
    let output = page_output(&args);
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn page_output(args: &PageArgs) -> PageOutput {
    let url = match (args.set, args.next) {
        (Some(page), _) => encode_page_number(&args.url, page),
        (None, true) => increment_page(&args.url),
        (None, false) => args.url.clone(),
    };
    let page = decode_page_number(&url);
    PageOutput { url, page }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(url: &str, set: Option<u32>, next: bool) -> PageArgs {
        PageArgs {
            url: url.to_string(),
            set,
            next,
        }
    }

    #[test]
    fn test_decode_only() {
        let out = page_output(&args("https://allegro.pl/k?order=p&p=4", None, false));
        assert_eq!(out.page, 4);
        assert_eq!(out.url, "https://allegro.pl/k?order=p&p=4");
    }

    #[test]
    fn test_set_and_next() {
        let out = page_output(&args("https://allegro.pl/k?order=p", Some(9), false));
        assert_eq!(
            out,
            PageOutput {
                url: "https://allegro.pl/k?order=p&p=9".to_string(),
                page: 9
            }
        );

        let out = page_output(&args("https://allegro.pl/k?order=p", None, true));
        assert_eq!(out.page, 2);
    }
}
