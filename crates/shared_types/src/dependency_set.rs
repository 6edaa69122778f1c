use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

impl Dependency {
    pub fn new<S: Into<String>>(name: S, version: Option<String>) -> Dependency {
        Dependency {
            name: name.into(),
            version,
        }
    }
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}=={}", self.name, v),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Package name to optional version, in insertion order.
///
/// Names are unique and case-sensitive. A recorded version is never replaced,
/// but an entry without a version takes the first version offered for it later
/// ("insert-or-keep-first").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Dependency>", into = "Vec<Dependency>")]
pub struct DependencySet {
    entries: Vec<Dependency>,
}

impl DependencySet {
    pub fn new() -> DependencySet {
        DependencySet::default()
    }

    /// Returns true when the set changed.
    pub fn insert<S: Into<String>>(&mut self, name: S, version: Option<String>) -> bool {
        self.insert_dependency(Dependency::new(name, version))
    }

    pub fn insert_dependency(&mut self, dependency: Dependency) -> bool {
        match self.entries.iter_mut().find(|e| e.name == dependency.name) {
            Some(existing) => {
                if existing.version.is_none() && dependency.version.is_some() {
                    existing.version = dependency.version;
                    true
                } else {
                    false
                }
            }
            None => {
                self.entries.push(dependency);
                true
            }
        }
    }

    /// Folds `other` into `self` with the same keep-first rule as `insert`.
    pub fn merge(&mut self, other: &DependencySet) {
        for dependency in other.iter() {
            self.insert_dependency(dependency.clone());
        }
    }

    pub fn get(&self, name: &str) -> Option<&Dependency> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn version(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|e| e.version.as_deref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Dependency> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<Dependency>> for DependencySet {
    fn from(dependencies: Vec<Dependency>) -> Self {
        dependencies.into_iter().collect()
    }
}

impl From<DependencySet> for Vec<Dependency> {
    fn from(set: DependencySet) -> Self {
        set.entries
    }
}

impl FromIterator<Dependency> for DependencySet {
    fn from_iter<T: IntoIterator<Item = Dependency>>(iter: T) -> Self {
        let mut set = DependencySet::default();
        set.extend(iter);
        set
    }
}

impl Extend<Dependency> for DependencySet {
    fn extend<T: IntoIterator<Item = Dependency>>(&mut self, iter: T) {
        for dependency in iter {
            self.insert_dependency(dependency);
        }
    }
}

impl<'a> IntoIterator for &'a DependencySet {
    type Item = &'a Dependency;
    type IntoIter = std::slice::Iter<'a, Dependency>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_version_wins() {
        let mut set = DependencySet::new();
        assert!(set.insert("x", Some("1.0".to_string())));
        assert!(!set.insert("x", Some("2.0".to_string())));
        assert!(!set.insert("x", None));
        assert_eq!(set.version("x"), Some("1.0"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn missing_version_is_upgraded() {
        let mut set = DependencySet::new();
        set.insert("x", None);
        assert!(set.contains("x"));
        assert_eq!(set.version("x"), None);

        set.insert("x", Some("1.0".to_string()));
        assert_eq!(set.version("x"), Some("1.0"));
    }

    #[test]
    fn names_are_case_sensitive() {
        let mut set = DependencySet::new();
        set.insert("Django", None);
        set.insert("django", Some("3.2".to_string()));
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["Django", "django"]);
        assert_eq!(set.version("Django"), None);
    }

    #[test]
    fn keeps_insertion_order_on_upgrade() {
        let mut set = DependencySet::new();
        set.insert("b", None);
        set.insert("a", Some("1".to_string()));
        set.insert("b", Some("2".to_string()));
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn merge_prefers_concrete_versions_regardless_of_order() {
        let mut unpinned = DependencySet::new();
        unpinned.insert("numpy", None);
        unpinned.insert("scipy", Some("1.5".to_string()));

        let mut pinned = DependencySet::new();
        pinned.insert("numpy", Some("1.19".to_string()));
        pinned.insert("scipy", Some("1.6".to_string()));

        let mut merged = unpinned.clone();
        merged.merge(&pinned);
        assert_eq!(merged.version("numpy"), Some("1.19"));
        assert_eq!(merged.version("scipy"), Some("1.5"));
    }

    #[test]
    fn json_keeps_order_and_uniqueness() {
        let parsed: DependencySet = serde_json::from_str(
            r#"[
                {"name": "requests", "version": "2.25.1"},
                {"name": "click"},
                {"name": "requests", "version": "3.0"}
            ]"#,
        )
        .unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.version("requests"), Some("2.25.1"));
        assert_eq!(parsed.version("click"), None);

        let rendered = serde_json::to_string(&parsed).unwrap();
        assert_eq!(
            rendered,
            r#"[{"name":"requests","version":"2.25.1"},{"name":"click","version":null}]"#
        );
    }
}
