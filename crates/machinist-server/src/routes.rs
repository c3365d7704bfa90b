//! URL → route mapping.

use percent_encoding::percent_decode_str;
use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route<'a> {
    /// `/machine/add`
    AddMachine,
    /// `/machine/{id}`, id still unparsed so a bad id can become a 400.
    Machine(&'a str),
    /// `/machines`
    Machines,
    /// `/machines/{name}`, percent-decoded.
    MachinesByName(Cow<'a, str>),
    /// `/health`
    Health,
}

/// Map a request URL to a route. Query strings are ignored.
pub fn parse_route(url: &str) -> Option<Route<'_>> {
    let path = url.split_once('?').map_or(url, |(p, _)| p);

    if path == "/health" {
        return Some(Route::Health);
    }
    if path == "/machines" || path == "/machines/" {
        return Some(Route::Machines);
    }
    if let Some(name) = path.strip_prefix("/machines/") {
        if name.contains('/') {
            return None;
        }
        return Some(Route::MachinesByName(
            percent_decode_str(name).decode_utf8_lossy(),
        ));
    }
    if let Some(rest) = path.strip_prefix("/machine/") {
        return match rest {
            "" => None,
            "add" => Some(Route::AddMachine),
            id if id.contains('/') => None,
            id => Some(Route::Machine(id)),
        };
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fixed_routes() {
        assert_eq!(parse_route("/machine/add"), Some(Route::AddMachine));
        assert_eq!(parse_route("/machines"), Some(Route::Machines));
        assert_eq!(parse_route("/machines/"), Some(Route::Machines));
        assert_eq!(parse_route("/health"), Some(Route::Health));
    }

    #[test]
    fn machine_id_segment_is_passed_through() {
        assert_eq!(parse_route("/machine/42"), Some(Route::Machine("42")));
        assert_eq!(parse_route("/machine/abc"), Some(Route::Machine("abc")));
    }

    #[test]
    fn name_segment_is_percent_decoded() {
        assert_eq!(
            parse_route("/machines/big%20press%2F2"),
            Some(Route::MachinesByName(Cow::Owned("big press/2".to_owned())))
        );
        assert_eq!(
            parse_route("/machines/M1"),
            Some(Route::MachinesByName(Cow::Borrowed("M1")))
        );
    }

    #[test]
    fn query_string_is_ignored() {
        assert_eq!(parse_route("/machines?page=2"), Some(Route::Machines));
        assert_eq!(parse_route("/machine/7?x=y"), Some(Route::Machine("7")));
    }

    #[test]
    fn unknown_paths_do_not_route() {
        for url in ["/", "/machine", "/machine/", "/machine/1/extra", "/machines/a/b", "/other"] {
            assert_eq!(parse_route(url), None, "{url}");
        }
    }
}
