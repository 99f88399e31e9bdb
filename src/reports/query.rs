//! CGI query-string handling for the report front end

use anyhow::{Context, Result};
use reqwest::Url;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

use crate::db::FilePortName;

/// Selects every port of a file, e.g. `port=_ALL_`
pub const ALL_PORTS: &str = "_ALL_";

/// Options of one report request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportQuery {
    pub method: bool,
    pub combined: bool,
    pub showname: bool,
    pub showsector: bool,
    pub sort: Option<String>,
    pub sold: bool,
    pub handheld: bool,
    pub viewname: Option<String>,
    pub fileportnames: Vec<String>,
    pub addcols: Vec<String>,
}

/// Decode `a=1&b=x%20y` into ordered key/value pairs
pub fn parse_query_string(query: &str) -> Result<Vec<(String, String)>> {
    let query = query.trim_start_matches('?');
    let url = Url::parse(&format!("http://localhost/?{}", query))
        .context("Failed to parse query string")?;
    Ok(url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect())
}

fn truthy(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no"
    )
}

fn non_empty(value: &str) -> Option<String> {
    let v = value.trim();
    (!v.is_empty()).then(|| v.to_string())
}

/// Turn query pairs into report options.
///
/// A key equal to a known file name selects `file:value`; `_ALL_` selects
/// every port of that file. Unknown keys and unknown ports are ignored.
pub fn handle_cgi_args(pairs: &[(String, String)], known: &BTreeSet<String>) -> ReportQuery {
    let known_ports: Vec<FilePortName> = known.iter().filter_map(|k| k.parse().ok()).collect();
    let known_files: BTreeSet<&str> = known_ports.iter().map(|f| f.file.as_str()).collect();

    let mut query = ReportQuery::default();
    let mut selected = BTreeSet::new();

    for (key, value) in pairs {
        match key.as_str() {
            "method" => query.method = truthy(value),
            "combined" => query.combined = truthy(value),
            "showname" => query.showname = truthy(value),
            "showsector" => query.showsector = truthy(value),
            "sold" => query.sold = truthy(value),
            "handheld" => query.handheld = truthy(value),
            "sort" => query.sort = non_empty(value),
            "viewname" => query.viewname = non_empty(value),
            "addcols" => query.addcols.extend(
                value
                    .split(',')
                    .filter_map(non_empty),
            ),
            file if known_files.contains(file) => {
                if value == ALL_PORTS {
                    selected.extend(
                        known_ports
                            .iter()
                            .filter(|f| f.file == file)
                            .map(|f| f.to_string()),
                    );
                } else {
                    let fpn = format!("{}:{}", file, value);
                    if known.contains(&fpn) {
                        selected.insert(fpn);
                    } else {
                        debug!("ignoring unknown portfolio {}", fpn);
                    }
                }
            }
            other => debug!("ignoring query key {}", other),
        }
    }

    query.fileportnames = selected.into_iter().collect();
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> BTreeSet<String> {
        ["port:fluffgazer", "port:growth", "ira:main"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_query_string_decodes() {
        let pairs = parse_query_string("?viewname=My%20View&addcols=Low&addcols=High").unwrap();
        assert_eq!(pairs[0], ("viewname".to_string(), "My View".to_string()));
        assert_eq!(pairs.len(), 3);
    }

    #[test]
    fn test_selects_ports_and_flags() {
        let pairs = parse_query_string("port=growth&ira=_ALL_&sold=1&handheld=0&sort=Gain").unwrap();
        let query = handle_cgi_args(&pairs, &known());

        assert_eq!(query.fileportnames, vec!["ira:main", "port:growth"]);
        assert!(query.sold);
        assert!(!query.handheld);
        assert_eq!(query.sort.as_deref(), Some("Gain"));
    }

    #[test]
    fn test_all_selects_every_port_of_file() {
        let pairs = parse_query_string("port=_ALL_").unwrap();
        let query = handle_cgi_args(&pairs, &known());
        assert_eq!(query.fileportnames, vec!["port:fluffgazer", "port:growth"]);
    }

    #[test]
    fn test_unknown_keys_and_ports_ignored() {
        let pairs = parse_query_string("port=nope&bogus=1&addcols=Low,ExDiv&showname").unwrap();
        let query = handle_cgi_args(&pairs, &known());

        assert!(query.fileportnames.is_empty());
        assert_eq!(query.addcols, vec!["Low", "ExDiv"]);
        // a bare key carries an empty value
        assert!(!query.showname);
    }
}
