//! Canonicalization and timestamp helpers shared by the engine and queue

use crate::error::CrawlerError;
use url::Url;

/// Canonicalize a URL into the form used as a `Request`'s default
/// `unique_key`: lower-cased scheme and host, default ports stripped, the
/// fragment dropped (it never reaches the server), and query parameters
/// sorted so that `?b=2&a=1` and `?a=1&b=2` dedupe to the same key.
///
/// Two different URLs that a server would treat identically should
/// canonicalize to the same string; two URLs that differ in any way the
/// server would observe should not.
pub fn canonicalize_url(raw: &str) -> Result<String, CrawlerError> {
    let mut url = Url::parse(raw)
        .map_err(|e| CrawlerError::Validation(format!("invalid url '{raw}': {e}")))?;

    url.set_fragment(None);

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        let query = pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        url.set_query(Some(&query));
    }

    // `Url` already lower-cases the scheme and host and strips a default
    // port on parse, so the remaining normalization is just the above.
    Ok(url.to_string())
}
