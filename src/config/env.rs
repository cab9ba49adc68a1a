//! Environment-style export of a loaded configuration.

use serde_json::Value;

use super::store::ConfigurationStore;

/// Lists every leaf of every collection as an environment variable.
///
/// Variable names are built from the prefix, the collection path segments,
/// and the key path segments, joined by `separator` and upper-cased:
/// `db/main` + `pool.size` with prefix `APP` and separator `__` becomes
/// `APP__DB__MAIN__POOL__SIZE`. Characters other than ASCII letters and
/// digits are replaced by `_`.
///
/// Strings are exported verbatim and `null` as an empty string; arrays and
/// other scalars are rendered as compact JSON.
pub fn export(store: &ConfigurationStore, prefix: &str, separator: &str) -> Vec<(String, String)> {
    let mut vars = Vec::new();

    for (path, collection) in store.iter() {
        for (key, value) in collection.flatten(".") {
            let segments = std::iter::once(prefix)
                .filter(|p| !p.is_empty())
                .chain(path.split('/'))
                .chain(key.split('.'));
            vars.push((env_name(segments, separator), render(&value)));
        }
    }

    vars
}

fn env_name<'a>(segments: impl Iterator<Item = &'a str>, separator: &str) -> String {
    segments
        .map(|segment| {
            segment
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() {
                        c.to_ascii_uppercase()
                    } else {
                        '_'
                    }
                })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join(separator)
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> ConfigurationStore {
        let mut store = ConfigurationStore::new();
        store.insert_or_merge(
            "app",
            json!({"debug": true, "name": "demo"}).as_object().cloned().unwrap(),
        );
        store.insert_or_merge(
            "db/main",
            json!({"pool": {"size": 4}, "hosts": ["a", "b"], "pass-word": null})
                .as_object()
                .cloned()
                .unwrap(),
        );
        store
    }

    #[test]
    fn test_export_names_and_values() {
        let vars = export(&store(), "MYAPP", "__");
        assert_eq!(
            vars,
            vec![
                ("MYAPP__APP__DEBUG".to_string(), "true".to_string()),
                ("MYAPP__APP__NAME".to_string(), "demo".to_string()),
                ("MYAPP__DB__MAIN__POOL__SIZE".to_string(), "4".to_string()),
                ("MYAPP__DB__MAIN__HOSTS".to_string(), r#"["a","b"]"#.to_string()),
                ("MYAPP__DB__MAIN__PASS_WORD".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_export_without_prefix() {
        let vars = export(&store(), "", "_");
        assert_eq!(vars[0].0, "APP_DEBUG");
    }
}
