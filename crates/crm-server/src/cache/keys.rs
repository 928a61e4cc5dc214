//! Cache key derivation and invalidation patterns.

use serde_json::Value;

/// Namespace shared by every response-cache key.
pub const CACHE_PREFIX: &str = "cache";

/// Key for a request, from its full path and raw query string.
///
/// Query parameters are serialized as a JSON object in the order they were
/// received; repeated names collapse into an array. The order is not
/// normalized, so `?a=1&b=2` and `?b=2&a=1` get separate entries.
pub fn request_key(path: &str, query: Option<&str>) -> String {
    format!("{}:{}:{}", CACHE_PREFIX, path, serialize_query(query))
}

/// Stable JSON rendering of a raw query string.
pub fn serialize_query(query: Option<&str>) -> String {
    let mut fields: Vec<(String, Vec<String>)> = Vec::new();

    for (name, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        match fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, values)) => values.push(value.into_owned()),
            None => fields.push((name.into_owned(), vec![value.into_owned()])),
        }
    }

    let members: Vec<String> = fields
        .into_iter()
        .map(|(name, mut values)| {
            let value = if values.len() == 1 {
                Value::String(values.remove(0))
            } else {
                Value::from(values)
            };
            format!("{}:{}", Value::String(name), value)
        })
        .collect();

    format!("{{{}}}", members.join(","))
}

/// Invalidation patterns for bulk cache clearing.
pub mod invalidate {
    use super::CACHE_PREFIX;

    /// Every cached response under a resource path, e.g. `/api/v1/orders`.
    pub fn resource(path: &str) -> String {
        format!("{}:{}*", CACHE_PREFIX, path.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_request_key_without_query() {
        assert_eq!(request_key("/api/v1/orders", None), "cache:/api/v1/orders:{}");
        assert_eq!(request_key("/api/v1/orders", Some("")), "cache:/api/v1/orders:{}");
    }

    #[test]
    fn test_request_key_with_query() {
        assert_eq!(
            request_key("/api/v1/orders", Some("status=new&page=2")),
            r#"cache:/api/v1/orders:{"status":"new","page":"2"}"#
        );
    }

    #[test]
    fn test_query_order_is_not_normalized() {
        let a = request_key("/api/v1/orders", Some("a=1&b=2"));
        let b = request_key("/api/v1/orders", Some("b=2&a=1"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_repeated_parameters_become_array() {
        assert_eq!(
            serialize_query(Some("city=Moscow&status=new&city=Kazan")),
            r#"{"city":["Moscow","Kazan"],"status":"new"}"#
        );
    }

    #[test]
    fn test_query_values_are_decoded_and_escaped() {
        assert_eq!(
            serialize_query(Some("q=%22quoted%22+text&flag")),
            r#"{"q":"\"quoted\" text","flag":""}"#
        );
    }

    #[test]
    fn test_invalidation_patterns() {
        assert_eq!(invalidate::resource("/api/v1/orders"), "cache:/api/v1/orders*");
        assert_eq!(invalidate::resource("/api/v1/orders/"), "cache:/api/v1/orders*");
    }

    #[test]
    fn test_resource_pattern_matches_list_and_item_keys() {
        let pattern = glob::Pattern::new(&invalidate::resource("/api/v1/orders")).unwrap();
        assert!(pattern.matches(&request_key("/api/v1/orders", Some("page=1"))));
        assert!(pattern.matches(&request_key("/api/v1/orders/5f1c", None)));
        assert!(!pattern.matches(&request_key("/api/v1/masters", None)));
    }

    proptest! {
        #[test]
        fn prop_request_key_is_deterministic(
            path in "/[a-z]{1,8}(/[a-z0-9]{1,8}){0,2}",
            query in "([a-z]{1,4}=[a-z0-9]{0,4})(&[a-z]{1,4}=[a-z0-9]{0,4}){0,4}",
        ) {
            let first = request_key(&path, Some(&query));
            let second = request_key(&path, Some(&query));
            prop_assert_eq!(&first, &second);
            let expected_prefix = format!("cache:{}:", path);
            prop_assert!(first.starts_with(&expected_prefix));
        }
    }
}
