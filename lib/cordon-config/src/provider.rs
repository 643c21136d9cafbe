use std::path::Path;

use figment::{
    providers::{Data, Format},
    value::{Dict, Map},
    Error, Metadata, Profile, Provider,
};

/// A file-backed configuration provider with eagerly-resolved contents.
///
/// `figment`'s own file providers read from disk lazily, every time the data is queried, which
/// pushes IO and parse errors all the way out to query time. `ResolvedProvider` reads and parses
/// the file once, up front, so that an unreadable or malformed file surfaces when the
/// configuration is loaded.
pub struct ResolvedProvider {
    data: Map<Profile, Dict>,
    metadata: Metadata,
}

impl ResolvedProvider {
    fn resolve<F>(path: &Path, kind: &str) -> Result<Self, Error>
    where
        F: Format,
    {
        let raw = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        let data = Data::<F>::string(&raw).data()?;

        Ok(Self {
            data,
            metadata: Metadata::from(kind.to_string(), path),
        })
    }

    pub fn from_yaml<P>(path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        Self::resolve::<figment::providers::Yaml>(path.as_ref(), "YAML file")
    }

    pub fn from_json<P>(path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        Self::resolve::<figment::providers::Json>(path.as_ref(), "JSON file")
    }
}

impl Provider for ResolvedProvider {
    fn metadata(&self) -> Metadata {
        self.metadata.clone()
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        Ok(self.data.clone())
    }
}
