//! Output assets and the cross-build asset cache.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

// ============================================================================
// ContentHash
// ============================================================================

/// A 256-bit content hash (blake3 output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn of(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

// ============================================================================
// Source
// ============================================================================

/// Content-producing accessor of an asset.
pub trait Source: Send + Sync + fmt::Debug {
    fn source(&self) -> &[u8];

    fn size(&self) -> usize {
        self.source().len()
    }
}

/// Source backed by an owned buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct RawSource(Vec<u8>);

impl RawSource {
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self(content.into())
    }
}

impl From<String> for RawSource {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

impl From<&str> for RawSource {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl Source for RawSource {
    fn source(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for RawSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawSource({} bytes)", self.0.len())
    }
}

// ============================================================================
// Asset
// ============================================================================

#[derive(Debug, Default)]
struct Emission {
    exists_at: Option<PathBuf>,
    emitted: bool,
}

/// A named unit of output together with its emission bookkeeping.
#[derive(Debug)]
pub struct Asset {
    source: Box<dyn Source>,
    hash: ContentHash,
    emission: Mutex<Emission>,
}

impl Asset {
    pub fn new(source: impl Source + 'static) -> Self {
        let hash = ContentHash::of(source.source());
        Self {
            source: Box::new(source),
            hash,
            emission: Mutex::new(Emission::default()),
        }
    }

    pub fn source(&self) -> &[u8] {
        self.source.source()
    }

    pub fn size(&self) -> usize {
        self.source.size()
    }

    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    /// Last output path this asset was written to.
    pub fn exists_at(&self) -> Option<PathBuf> {
        self.emission.lock().exists_at.clone()
    }

    /// Whether the last emit attempt wrote this asset.
    pub fn emitted(&self) -> bool {
        self.emission.lock().emitted
    }

    pub(crate) fn is_at(&self, target: &Path) -> bool {
        self.emission.lock().exists_at.as_deref() == Some(target)
    }

    pub(crate) fn mark_written(&self, target: PathBuf) {
        let mut emission = self.emission.lock();
        emission.exists_at = Some(target);
        emission.emitted = true;
    }

    pub(crate) fn mark_unchanged(&self) {
        self.emission.lock().emitted = false;
    }
}

// ============================================================================
// AssetCache
// ============================================================================

/// Assets of previous builds, by name.
///
/// An asset whose content hash did not change is handed back as the same
/// object, so its `exists_at` marker survives across builds.
#[derive(Debug, Default)]
pub struct AssetCache {
    assets: DashMap<String, Arc<Asset>>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached asset for `name` if its content is unchanged,
    /// otherwise cache and return a fresh one. The flag is `true` on a hit.
    pub fn intern(&self, name: &str, source: impl Source + 'static) -> (Arc<Asset>, bool) {
        let hash = ContentHash::of(source.source());
        if let Some(cached) = self.assets.get(name)
            && cached.hash() == hash
        {
            return (Arc::clone(&cached), true);
        }

        let asset = Arc::new(Asset::new(source));
        self.assets.insert(name.to_owned(), Arc::clone(&asset));
        (asset, false)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
