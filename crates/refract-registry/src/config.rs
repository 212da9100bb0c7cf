//! Registry and merge configuration.
//!
//! [`RegistryConfig`] is fixed when a [`Registry`](crate::Registry) is
//! created. [`MergeOptions`] default from it and can be adjusted per merge.
//!
//! ```
//! use refract_registry::{ConflictPolicy, MergeOptions, RegistryConfig};
//!
//! let config = RegistryConfig::default()
//!     .with_conflict_policy(ConflictPolicy::Replace)
//!     .with_cross_module_replace(true);
//!
//! let options = MergeOptions::from(&config);
//! assert_eq!(options.policy, ConflictPolicy::Replace);
//! assert!(options.allow_any_module);
//! ```

use refract_core::ModuleId;

/// What a merge does with a type that is already registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConflictPolicy {
    /// Fail the whole merge; nothing is applied.
    Reject,
    /// Keep the existing row and count the conflict.
    #[default]
    Skip,
    /// Replace the existing row in place and bump its generation.
    Replace,
}

/// Registry-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Policy used by [`Registry::merge`](crate::Registry::merge).
    pub conflict_policy: ConflictPolicy,
    /// Whether `Replace` may replace rows owned by a different module.
    pub cross_module_replace: bool,
    /// Whether merges record one diagnostic per conflict.
    pub collect_conflicts: bool,
    /// Whether registration adds the zero-argument constructor advertised by
    /// [`Reflect::default_constructor`](crate::Reflect::default_constructor).
    pub default_constructors: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            conflict_policy: ConflictPolicy::Skip,
            cross_module_replace: false,
            collect_conflicts: true,
            default_constructors: true,
        }
    }
}

impl RegistryConfig {
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    pub fn with_cross_module_replace(mut self, allow: bool) -> Self {
        self.cross_module_replace = allow;
        self
    }

    pub fn with_collect_conflicts(mut self, collect: bool) -> Self {
        self.collect_conflicts = collect;
        self
    }

    pub fn with_default_constructors(mut self, enabled: bool) -> Self {
        self.default_constructors = enabled;
        self
    }
}

/// Settings for one merge.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MergeOptions {
    pub policy: ConflictPolicy,
    /// `Replace` may replace rows owned by any module.
    pub allow_any_module: bool,
    pub collect_conflicts: bool,
    /// Owner recorded on merged rows instead of the one in the blob.
    pub module_override: Option<ModuleId>,
}

impl MergeOptions {
    pub fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_allow_any_module(mut self, allow: bool) -> Self {
        self.allow_any_module = allow;
        self
    }

    pub fn with_collect_conflicts(mut self, collect: bool) -> Self {
        self.collect_conflicts = collect;
        self
    }

    pub fn with_module_override(mut self, module: ModuleId) -> Self {
        self.module_override = Some(module);
        self
    }
}

impl From<&RegistryConfig> for MergeOptions {
    fn from(config: &RegistryConfig) -> Self {
        Self {
            policy: config.conflict_policy,
            allow_any_module: config.cross_module_replace,
            collect_conflicts: config.collect_conflicts,
            module_override: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.conflict_policy, ConflictPolicy::Skip);
        assert!(!config.cross_module_replace);
        assert!(config.collect_conflicts);
        assert!(config.default_constructors);
    }

    #[test]
    fn options_follow_config_and_override() {
        let config = RegistryConfig::default().with_collect_conflicts(false);
        let options = MergeOptions::from(&config)
            .with_policy(ConflictPolicy::Reject)
            .with_module_override(ModuleId::from_name("physics"));

        assert_eq!(options.policy, ConflictPolicy::Reject);
        assert!(!options.collect_conflicts);
        assert_eq!(options.module_override, Some(ModuleId::from_name("physics")));
    }
}
