use super::*;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// Dead targets are swept from the binding table every this-many binds.
    #[cfg_attr(feature = "serde", serde(default = "default_prune_every"))]
    pub prune_every: std::num::NonZeroUsize,

    /// The fetch subsystem. Falls back to an empty in-memory fetcher when
    /// unset.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub fetcher: Option<Arc<dyn fetch::Fetcher>>,
}

fn default_prune_every() -> std::num::NonZeroUsize {
    std::num::NonZeroUsize::new(64).unwrap()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prune_every: default_prune_every(),
            fetcher: None,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("prune_every", &self.prune_every)
            .finish()
    }
}
