use serde::{Deserialize, Serialize};

/// Primary-file convention of one named stratum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StratumRule {
    pub name: String,
    /// File id of the authored source in this stratum
    pub primary_file: u32,
    /// Files under this path prefix are helpers, never primary
    #[serde(default)]
    pub excluded_path_prefix: Option<String>,
}

impl StratumRule {
    pub fn new(name: impl Into<String>, primary_file: u32) -> Self {
        Self {
            name: name.into(),
            primary_file,
            excluded_path_prefix: None,
        }
    }

    pub fn excluding(mut self, prefix: impl Into<String>) -> Self {
        self.excluded_path_prefix = Some(prefix.into());
        self
    }

    fn is_primary(&self, file_id: u32, path: &str) -> bool {
        file_id == self.primary_file
            && !self
                .excluded_path_prefix
                .as_deref()
                .is_some_and(|prefix| path.starts_with(prefix))
    }
}

/// Stratum name -> primary-file rule. Strata without a rule use
/// `default_primary_file`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrataTable {
    pub default_primary_file: u32,
    pub rules: Vec<StratumRule>,
}

impl StrataTable {
    pub fn new(default_primary_file: u32, rules: Vec<StratumRule>) -> Self {
        Self { default_primary_file, rules }
    }

    pub fn rule(&self, stratum: &str) -> Option<&StratumRule> {
        self.rules.iter().find(|r| r.name == stratum)
    }

    /// Whether `file_id` (declared with `path`) is the authored file of a
    /// map in `stratum`
    pub fn is_primary(&self, stratum: &str, file_id: u32, path: &str) -> bool {
        match self.rule(stratum) {
            Some(rule) => rule.is_primary(file_id, path),
            None => file_id == self.default_primary_file,
        }
    }
}

impl Default for StrataTable {
    fn default() -> Self {
        Self {
            default_primary_file: 0,
            rules: vec![
                // Kotlin numbers its own source from 1 and lists inlined
                // stdlib helpers alongside it
                StratumRule::new("Kotlin", 1).excluding("org/jetbrains/kotlin/psi/psiUtil/PsiUtilsKt"),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_general_stratum() {
        let table = StrataTable::default();
        assert!(table.is_primary("JSP", 0, "/hello.jsp"));
        assert!(!table.is_primary("JSP", 1, "/included.jsp"));
    }

    #[test]
    fn test_kotlin_stratum() {
        let table = StrataTable::default();
        assert!(table.is_primary("Kotlin", 1, "com/example/Main.kt"));
        assert!(!table.is_primary("Kotlin", 0, "com/example/Main.kt"));
        assert!(!table.is_primary("Kotlin", 1, "org/jetbrains/kotlin/psi/psiUtil/PsiUtilsKt.kt"));
    }

    #[test]
    fn test_custom_rule() {
        let table = StrataTable::new(0, vec![StratumRule::new("Groovy", 2)]);
        assert!(table.is_primary("Groovy", 2, "a.groovy"));
        assert!(!table.is_primary("Kotlin", 1, "a.kt"));
    }
}
