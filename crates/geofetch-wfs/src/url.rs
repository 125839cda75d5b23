//! GetFeature URL construction.
//!
//! Pure functions over the endpoint configuration, keeping parameter
//! naming consistent across the hits probe and the page fetcher.

use url::Url;

use crate::config::{WfsConfig, WfsVersion};

/// Neutralize characters that would corrupt the query string when the
/// filter expression is spliced into a URL parameter.
///
/// Control characters (newlines pasted from filter editors, NULs from bad
/// encodings) become spaces; the result is trimmed. Reserved URL characters
/// are left alone here — they are percent-encoded at assembly time.
#[must_use]
pub fn sanitize_filter(filter: &str) -> String {
    let cleaned: String = filter
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    cleaned.trim().to_string()
}

/// Build a GetFeature request URL.
///
/// `for_hits` requests only the matched count (`resultType=hits`); paged
/// requests carry `startIndex` when the protocol version supports it and
/// the version-appropriate count parameter when `max_features > 0`.
#[must_use]
pub fn build_get_feature_url(
    config: &WfsConfig,
    start_index: u64,
    max_features: u64,
    for_hits: bool,
) -> Url {
    let type_param = match config.version {
        WfsVersion::V1 => "typeName",
        WfsVersion::V2 => "typeNames",
    };

    let mut query = format!(
        "service=WFS&request=GetFeature&version={}&{type_param}={}",
        config.version.as_str(),
        urlencoding::encode(&config.type_name)
    );

    if for_hits {
        query.push_str("&resultType=hits");
    } else {
        if config.version.supports_paging() {
            query.push_str(&format!("&startIndex={start_index}"));
        }
        if max_features > 0 {
            query.push_str(&format!(
                "&{}={max_features}",
                config.version.count_param()
            ));
        }
        if let Some(ref format) = config.output_format {
            query.push_str(&format!(
                "&outputFormat={}",
                urlencoding::encode(format)
            ));
        }
    }

    if let Some(ref filter) = config.filter {
        query.push_str(&format!(
            "&filter={}",
            urlencoding::encode(&sanitize_filter(filter))
        ));
    }

    let mut url = config.base_url.clone();
    url.set_query(Some(&query));
    url
}
