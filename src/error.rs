pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A manifest document could not be decoded
    #[error("index build: {0}")]
    IndexBuild(#[source] serde_yaml::Error),

    /// A manifest document declares an apiVersion or kind but no usable GVK
    #[error("index build: document {document} has an empty group/version/kind ({detail})")]
    EmptyGvk { document: usize, detail: String },

    /// The object cache failed to list a kind
    #[error("probe {query}: {source}")]
    Probe {
        query: String,
        #[source]
        source: kube::Error,
    },

    /// Drift sentinel: a declared object is not observed in the cluster
    #[error("absent manifest: {key} {name}")]
    AbsentManifest { key: String, name: String },

    /// The release-status adapter failed
    #[error("status query for release {release}: {source}")]
    StatusQuery {
        release: String,
        #[source]
        source: Box<Error>,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("release {release}: {source}")]
    Release {
        release: String,
        #[source]
        source: Box<Error>,
    },

    #[error(transparent)]
    Kube(#[from] kube::Error),

    #[error(transparent)]
    Infer(#[from] kube::config::InferConfigError),

    /// Custom error message
    #[error("{0}")]
    Custom(String),
}

impl Error {
    /// True when this error, or any error in its `source()` chain, is the
    /// `AbsentManifest` drift sentinel.
    #[must_use]
    pub fn is_absent_manifest(&self) -> bool {
        self.find_in_chain(|e| matches!(e, Self::AbsentManifest { .. }))
    }

    /// True when this error, or any error in its `source()` chain, is a cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.find_in_chain(|e| matches!(e, Self::Cancelled))
    }

    fn find_in_chain(&self, predicate: impl Fn(&Self) -> bool) -> bool {
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(self);
        while let Some(err) = current {
            // boxed sources surface as the Box itself, whose source() skips the inner error
            let matched = err
                .downcast_ref::<Self>()
                .or_else(|| err.downcast_ref::<Box<Self>>().map(AsRef::as_ref));
            if matched.is_some_and(&predicate) {
                return true;
            }
            current = err.source();
        }
        false
    }
}
