//! Classification rule registry
//!
//! Maps shape tags to rules. Lookup tries the full tag first, then the
//! unqualified kind (`call:double`, then `call`). Unregistered shapes resolve
//! to `ConservativeDefault`, so unknown shapes are never assumed to be
//! provider-supported.
//!
//! Registration takes `&mut self`; once populated, a registry is shared
//! read-only (`Arc<RuleRegistry>` is `Send + Sync`), so registration cannot
//! overlap with lookups from concurrent passes.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::expr::ShapeTag;

use super::classification::{Classification, Resolution};
use super::rules::{
    AbsorbingProjection, ClassificationRule, ConservativeDefault, FnRule, RuleInput,
    Translatable, Untranslatable,
};

/// Rule found for a tag, and how it was found
#[derive(Clone, Copy)]
pub struct ResolvedRule<'a> {
    pub rule: &'a dyn ClassificationRule,
    pub resolution: Resolution,
}

/// Registry of per-shape classification rules
#[derive(Clone)]
pub struct RuleRegistry {
    rules: HashMap<ShapeTag, Arc<dyn ClassificationRule>>,
    default: Arc<dyn ClassificationRule>,
}

impl RuleRegistry {
    /// Empty registry: every shape resolves to the conservative default
    pub fn new() -> Self {
        Self {
            rules: HashMap::new(),
            default: Arc::new(ConservativeDefault),
        }
    }

    /// Adds or replaces the rule for `tag`, returning the replaced rule
    pub fn register<R>(&mut self, tag: impl Into<ShapeTag>, rule: R) -> Option<Arc<dyn ClassificationRule>>
    where
        R: ClassificationRule + 'static,
    {
        self.register_arc(tag, Arc::new(rule))
    }

    /// Adds or replaces a shared rule
    pub fn register_arc(
        &mut self,
        tag: impl Into<ShapeTag>,
        rule: Arc<dyn ClassificationRule>,
    ) -> Option<Arc<dyn ClassificationRule>> {
        self.rules.insert(tag.into(), rule)
    }

    /// Registers a closure rule
    pub fn register_fn<F>(&mut self, tag: impl Into<ShapeTag>, name: impl Into<String>, decide: F)
    where
        F: Fn(&RuleInput<'_>) -> Classification + Send + Sync + 'static,
    {
        self.register(tag, FnRule::new(name, decide));
    }

    /// Registers `Translatable` for each tag
    pub fn translatable<I, T>(&mut self, tags: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ShapeTag>,
    {
        for tag in tags {
            self.register(tag, Translatable);
        }
        self
    }

    /// Registers `Untranslatable` for each tag
    pub fn untranslatable<I, T>(&mut self, tags: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ShapeTag>,
    {
        for tag in tags {
            self.register(tag, Untranslatable);
        }
        self
    }

    /// Registers `AbsorbingProjection` for each tag
    pub fn absorbing<I, T>(&mut self, tags: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ShapeTag>,
    {
        for tag in tags {
            self.register(tag, AbsorbingProjection);
        }
        self
    }

    /// Retrieves the rule for a tag, falling back to the default
    pub fn lookup(&self, tag: &ShapeTag) -> &dyn ClassificationRule {
        self.resolve(tag).rule
    }

    /// Retrieves the rule for a tag along with how it was resolved
    pub fn resolve(&self, tag: &ShapeTag) -> ResolvedRule<'_> {
        if let Some(rule) = self.rules.get(tag) {
            return ResolvedRule {
                rule: rule.as_ref(),
                resolution: Resolution::Exact,
            };
        }

        if let Some(rule) = tag.generalized().and_then(|general| self.rules.get(&general)) {
            return ResolvedRule {
                rule: rule.as_ref(),
                resolution: Resolution::KindFallback,
            };
        }

        ResolvedRule {
            rule: self.default.as_ref(),
            resolution: Resolution::Unregistered,
        }
    }

    /// Removes the rule registered under exactly `tag`
    pub fn remove(&mut self, tag: &ShapeTag) -> Option<Arc<dyn ClassificationRule>> {
        self.rules.remove(tag)
    }

    /// Whether a rule is registered under exactly `tag`
    pub fn contains(&self, tag: &ShapeTag) -> bool {
        self.rules.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Registered tags, sorted
    pub fn tags(&self) -> Vec<&ShapeTag> {
        let mut tags: Vec<&ShapeTag> = self.rules.keys().collect();
        tags.sort();
        tags
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for tag in self.tags() {
            if let Some(rule) = self.rules.get(tag) {
                map.entry(&tag.to_string(), &rule.name());
            }
        }
        map.finish()
    }
}

/// Process-wide registry
static GLOBAL_REGISTRY: OnceLock<Arc<RuleRegistry>> = OnceLock::new();

/// Error returned when the process-wide registry is installed twice
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("process-wide rule registry is already installed")]
pub struct AlreadyInstalled;

/// Installs the process-wide registry. Succeeds once per process.
pub fn install_global(registry: RuleRegistry) -> Result<Arc<RuleRegistry>, AlreadyInstalled> {
    let shared = Arc::new(registry);
    GLOBAL_REGISTRY
        .set(Arc::clone(&shared))
        .map_err(|_| AlreadyInstalled)?;
    Ok(shared)
}

/// Returns the process-wide registry, if installed
pub fn global() -> Option<Arc<RuleRegistry>> {
    GLOBAL_REGISTRY.get().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ExprKind;
    use Classification::*;

    fn classify(registry: &RuleRegistry, tag: &ShapeTag, children: &[Classification]) -> Classification {
        registry.lookup(tag).classify(&RuleInput {
            tag,
            kind: &ExprKind::Distinct,
            children,
        })
    }

    #[test]
    fn test_unregistered_defaults_to_deferral() {
        let registry = RuleRegistry::new();
        let tag = ShapeTag::new("filter");

        let resolved = registry.resolve(&tag);
        assert_eq!(resolved.resolution, Resolution::Unregistered);
        assert_eq!(classify(&registry, &tag, &[]), RequiresDeferral);
    }

    #[test]
    fn test_exact_match_beats_kind_fallback() {
        let mut registry = RuleRegistry::new();
        registry.translatable(["call"]);
        registry.untranslatable(["call:double"]);

        let double = ShapeTag::qualified("call", "double");
        let lower = ShapeTag::qualified("call", "lower");

        assert_eq!(registry.resolve(&double).resolution, Resolution::Exact);
        assert_eq!(classify(&registry, &double, &[ProviderSupported]), RequiresDeferral);

        assert_eq!(registry.resolve(&lower).resolution, Resolution::KindFallback);
        assert_eq!(classify(&registry, &lower, &[ProviderSupported]), ProviderSupported);
    }

    #[test]
    fn test_qualified_rule_does_not_cover_kind() {
        let mut registry = RuleRegistry::new();
        registry.translatable(["member:name"]);

        let other = ShapeTag::qualified("member", "ssn");
        assert_eq!(registry.resolve(&other).resolution, Resolution::Unregistered);
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = RuleRegistry::new();
        assert!(registry.register("filter", Untranslatable).is_none());
        let previous = registry.register("filter", Translatable);
        assert_eq!(previous.map(|r| r.name().to_string()), Some("untranslatable".to_string()));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup(&ShapeTag::new("filter")).name(), "translatable");
    }

    #[test]
    fn test_register_fn_and_remove() {
        let mut registry = RuleRegistry::new();
        registry.register_fn("constant", "always", |_input: &RuleInput<'_>| ProviderSupported);

        let tag = ShapeTag::new("constant");
        assert!(registry.contains(&tag));
        assert_eq!(registry.lookup(&tag).name(), "always");

        assert!(registry.remove(&tag).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_tags_sorted_and_debug() {
        let mut registry = RuleRegistry::new();
        registry.translatable(["take", "filter", "call:lower"]);

        let tags: Vec<String> = registry.tags().iter().map(|t| t.to_string()).collect();
        assert_eq!(tags, vec!["call:lower", "filter", "take"]);

        let debug = format!("{:?}", registry);
        assert!(debug.contains("\"filter\": \"translatable\""));
    }

    #[test]
    fn test_registry_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RuleRegistry>();
        assert_send_sync::<Arc<RuleRegistry>>();
    }
}
