use std::collections::BTreeMap;

pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Main section attributes of a jar manifest. Continuation lines (leading space) are
/// joined onto the previous value.
pub fn parse_main_attributes(text: &str) -> BTreeMap<String, String> {
    let mut attributes: BTreeMap<String, String> = BTreeMap::new();
    let mut last_key: Option<String> = None;

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            break;
        }
        if let Some(continued) = line.strip_prefix(' ') {
            if let Some(value) = last_key.as_ref().and_then(|k| attributes.get_mut(k)) {
                value.push_str(continued);
            }
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_string();
            attributes.insert(key.clone(), value.trim().to_string());
            last_key = Some(key);
        }
    }

    attributes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_attributes() {
        let text = "Manifest-Version: 1.0\r\nImplementation-Version: 1.2.\r\n 3\r\nMain-Class: a.B\r\n\r\nName: other\r\nImplementation-Version: 9\r\n";
        let attrs = parse_main_attributes(text);
        assert_eq!(attrs.get("Implementation-Version").map(String::as_str), Some("1.2.3"));
        assert_eq!(attrs.get("Main-Class").map(String::as_str), Some("a.B"));
        assert!(!attrs.contains_key("Name"));
    }
}
