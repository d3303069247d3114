//! Namespaces assumed always present

/// Platform and framework namespaces never recorded by the scanner
pub const DEFAULT_EXCLUSIONS: [&str; 12] = [
    "java.",
    "javax.",
    "jdk.",
    "sun.",
    "com.sun.",
    "org.w3c.",
    "org.xml.",
    "org.ietf.",
    "org.omg.",
    "org.jcp.",
    "net.bytebuddy.",
    "splice.api.",
];

/// Prefix-based class-name filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusions {
    prefixes: Vec<String>,
}

impl Exclusions {
    /// The default platform prefixes
    #[must_use]
    pub fn new() -> Self {
        Self {
            prefixes: DEFAULT_EXCLUSIONS.iter().map(|p| (*p).to_string()).collect(),
        }
    }

    /// No exclusions at all
    #[must_use]
    pub fn none() -> Self {
        Self { prefixes: Vec::new() }
    }

    /// Add a prefix
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        if !self.prefixes.contains(&prefix) {
            self.prefixes.push(prefix);
        }
        self
    }

    /// True when `class_name` starts with an excluded prefix
    #[must_use]
    pub fn is_excluded(&self, class_name: &str) -> bool {
        self.prefixes.iter().any(|p| class_name.starts_with(p.as_str()))
    }

    /// Configured prefixes
    #[must_use]
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }
}

impl Default for Exclusions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prefixes() {
        let ex = Exclusions::new();
        assert!(ex.is_excluded("java.lang.String"));
        assert!(ex.is_excluded("com.sun.proxy.$Proxy1"));
        assert!(ex.is_excluded("splice.api.Plugin"));
        assert!(!ex.is_excluded("javaz.Thing"));
        assert!(!ex.is_excluded("com.acme.Widget"));
    }

    #[test]
    fn extra_prefixes_are_deduplicated() {
        let ex = Exclusions::none().with_prefix("com.acme.").with_prefix("com.acme.");
        assert_eq!(ex.prefixes().len(), 1);
        assert!(ex.is_excluded("com.acme.Widget"));
    }
}
