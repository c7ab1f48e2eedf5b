//! `Link` header pagination.

use reqwest::header::{HeaderMap, LINK};

/// Returns the `rel="next"` URL of a GitHub list response, if there is one.
pub fn next_link(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(LINK)?.to_str().ok()?;
    parse_next(value)
}

fn parse_next(link: &str) -> Option<String> {
    link.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let url = parts.next()?.trim();
        let is_next = parts.any(|param| {
            let param = param.trim();
            param == "rel=\"next\"" || param == "rel=next"
        });
        if !is_next {
            return None;
        }
        url.strip_prefix('<')
            .and_then(|u| u.strip_suffix('>'))
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_next_among_relations() {
        let link = "<https://api.github.com/repositories/1/pulls?page=2>; rel=\"next\", \
                    <https://api.github.com/repositories/1/pulls?page=5>; rel=\"last\"";
        assert_eq!(
            parse_next(link).as_deref(),
            Some("https://api.github.com/repositories/1/pulls?page=2")
        );
    }

    #[test]
    fn last_page_has_no_next() {
        let link = concat!(
            "<https://api.github.com/x?page=1>; rel=\"prev\", ",
            "<https://api.github.com/x?page=1>; rel=\"first\""
        );
        assert_eq!(parse_next(link), None);
    }

    #[test]
    fn missing_header_has_no_next() {
        assert_eq!(next_link(&HeaderMap::new()), None);
    }
}
