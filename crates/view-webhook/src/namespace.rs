//! Resolves which namespaces a webhook's namespace selector currently selects.
use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Namespace;
use kube::ResourceExt;

/// A point-in-time snapshot of all namespaces and their labels.
///
/// The snapshot keeps the order in which the API server listed the
/// namespaces.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NamespaceCatalog {
    namespaces: Vec<CatalogEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct CatalogEntry {
    name: String,
    labels: BTreeMap<String, String>,
}

impl NamespaceCatalog {
    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.namespaces.iter().map(|namespace| namespace.name.as_str())
    }
}

/// Returns the names of all namespaces in `catalog` selected by `selector`, in
/// catalog order.
///
/// A namespace is selected if **any** of the required label pairs is present
/// on it. Webhooks without a selector have no active namespaces.
pub fn active_namespaces(
    selector: Option<&BTreeMap<String, String>>,
    catalog: &NamespaceCatalog,
) -> Vec<String> {
    let Some(selector) = selector else {
        return Vec::new();
    };

    catalog
        .namespaces
        .iter()
        .filter(|namespace| {
            selector
                .iter()
                .any(|(key, value)| namespace.labels.get(key) == Some(value))
        })
        .map(|namespace| namespace.name.clone())
        .collect()
}

impl<N, L, K, V> FromIterator<(N, L)> for NamespaceCatalog
where
    N: Into<String>,
    L: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (N, L)>>(iter: T) -> Self {
        let mut namespaces: Vec<CatalogEntry> = Vec::new();

        for (name, labels) in iter {
            let name = name.into();
            // Names are unique within a cluster, but be strict about it for hand-built catalogs
            if namespaces.iter().any(|namespace| namespace.name == name) {
                continue;
            }

            namespaces.push(CatalogEntry {
                name,
                labels: labels
                    .into_iter()
                    .map(|(key, value)| (key.into(), value.into()))
                    .collect(),
            });
        }

        Self { namespaces }
    }
}

impl FromIterator<Namespace> for NamespaceCatalog {
    fn from_iter<T: IntoIterator<Item = Namespace>>(iter: T) -> Self {
        iter.into_iter()
            .map(|namespace| {
                let name = namespace.name_any();
                let labels = namespace.metadata.labels.unwrap_or_default();
                (name, labels)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use proptest::{collection::btree_map, prelude::*};
    use rstest::rstest;

    use super::*;

    fn catalog() -> NamespaceCatalog {
        NamespaceCatalog::from_iter([
            ("ns1", BTreeMap::from([("env", "prod")])),
            ("ns2", BTreeMap::from([("env", "dev")])),
            ("ns3", BTreeMap::from([("env", "dev"), ("team", "payments")])),
            ("ns4", BTreeMap::new()),
        ])
    }

    fn selector<const N: usize>(pairs: [(&str, &str); N]) -> BTreeMap<String, String> {
        pairs
            .into_iter()
            .map(|(key, value)| (key.to_owned(), value.to_owned()))
            .collect()
    }

    #[test]
    fn no_selector_has_no_active_namespaces() {
        assert!(active_namespaces(None, &catalog()).is_empty());
    }

    #[rstest]
    #[case::single_match(selector([("env", "prod")]), vec!["ns1"])]
    #[case::multiple_matches(selector([("env", "dev")]), vec!["ns2", "ns3"])]
    #[case::any_pair_matches(selector([("env", "prod"), ("team", "payments")]), vec!["ns1", "ns3"])]
    #[case::value_mismatch(selector([("env", "staging")]), vec![])]
    #[case::empty_selector(selector([]), vec![])]
    #[case::empty_value_requires_the_key(selector([("team", "")]), vec![])]
    fn selects_namespaces(
        #[case] selector: BTreeMap<String, String>,
        #[case] expected: Vec<&str>,
    ) {
        assert_eq!(active_namespaces(Some(&selector), &catalog()), expected);
    }

    #[test]
    fn duplicate_names_are_ignored() {
        let catalog = NamespaceCatalog::from_iter([
            ("default", BTreeMap::from([("a", "b")])),
            ("default", BTreeMap::from([("c", "d")])),
        ]);

        assert_eq!(catalog.len(), 1);
        assert!(active_namespaces(Some(&selector([("c", "d")])), &catalog).is_empty());
    }

    #[test]
    fn catalog_from_namespaces_keeps_list_order() {
        let namespace = |name: &str| Namespace {
            metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
                name: Some(name.to_owned()),
                ..Default::default()
            },
            ..Default::default()
        };

        let catalog: NamespaceCatalog = [namespace("zeta"), namespace("alpha")]
            .into_iter()
            .collect();
        assert_eq!(catalog.names().collect::<Vec<_>>(), ["zeta", "alpha"]);
    }

    fn labels() -> impl Strategy<Value = BTreeMap<String, String>> {
        btree_map("[a-c]", "[x-z]", 0..3)
    }

    proptest! {
        #[test]
        fn selected_namespaces_share_a_label_pair(
            namespace_labels in prop::collection::vec(labels(), 0..8),
            selector in labels(),
        ) {
            let catalog: NamespaceCatalog = namespace_labels
                .iter()
                .enumerate()
                .map(|(index, labels)| (format!("ns-{index}"), labels.clone()))
                .collect();

            let expected: Vec<String> = namespace_labels
                .iter()
                .enumerate()
                .filter(|(_, labels)| {
                    labels.iter().any(|(key, value)| selector.get(key) == Some(value))
                })
                .map(|(index, _)| format!("ns-{index}"))
                .collect();

            prop_assert_eq!(active_namespaces(Some(&selector), &catalog), expected);
            prop_assert!(active_namespaces(None, &catalog).is_empty());
        }
    }
}
