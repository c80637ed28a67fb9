use super::*;

/// Where a load's content comes from.
///
/// Opaque to the binder; only the fetcher interprets it. A request may also
/// carry no source at all, which is an explicit "unbind"; see
/// [`binder::Error::EmptySource`](crate::binder::Error::EmptySource).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Source {
    /// A resource reachable over whatever transport the fetcher speaks.
    Url(Arc<str>),
    /// A file on the local filesystem.
    File(std::path::PathBuf),
}

impl Source {
    pub fn url(url: impl Into<Arc<str>>) -> Self {
        Source::Url(url.into())
    }

    pub fn file(path: impl Into<std::path::PathBuf>) -> Self {
        Source::File(path.into())
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Url(url) => write!(f, "url:{url}"),
            Source::File(path) => write!(f, "file:{}", path.display()),
        }
    }
}
