use std::sync::Arc;

/// Why a request settled without assets.
///
/// Clonable so every awaiter of the same request observes the same failure.
#[derive(thiserror::Error, Debug, Clone)]
pub enum LoadError {
    #[error("Failed to load {url}: {reason}")]
    Backend {
        url: String,
        reason: Arc<anyhow::Error>,
    },
    #[error("Bundle returned a {found} for {url}, expected a {expected}")]
    KindMismatch {
        url: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("Bundle dropped the request for {url} without completing it")]
    Abandoned { url: String },
    #[error("Request started without {0}")]
    Unconfigured(&'static str),
    #[error("Bundle {0} is not registered")]
    UnknownBundle(String),
}

impl LoadError {
    pub(crate) fn backend(url: impl Into<String>, reason: anyhow::Error) -> Self {
        Self::Backend {
            url: url.into(),
            reason: Arc::new(reason),
        }
    }
}
