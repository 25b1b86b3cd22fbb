use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

/// Failure raised while resolving a named asset.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset not found: {name}")]
    NotFound { name: String },
    #[error("asset name {name:?} must be a relative path inside the asset root")]
    InvalidName { name: String },
    #[error("asset {name} is not valid UTF-8")]
    NotUtf8 { name: String },
    #[error("unable to read asset {name}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Resolves asset names such as `shaders/area_light_brdf.wgsl` to bytes.
#[derive(Debug, Clone)]
pub struct AssetLibrary {
    backing: AssetBacking,
}

#[derive(Debug, Clone)]
enum AssetBacking {
    Directory(PathBuf),
    Memory(Arc<HashMap<String, Arc<[u8]>>>),
}

impl AssetLibrary {
    /// Serves assets from files below `root`.
    pub fn open<P: AsRef<Path>>(root: P) -> Self {
        Self {
            backing: AssetBacking::Directory(root.as_ref().to_path_buf()),
        }
    }

    /// Serves assets from bytes already resident in memory.
    pub fn from_entries<I, N, B>(entries: I) -> Self
    where
        I: IntoIterator<Item = (N, B)>,
        N: Into<String>,
        B: Into<Vec<u8>>,
    {
        let files = entries
            .into_iter()
            .map(|(name, bytes)| {
                let bytes: Vec<u8> = bytes.into();
                (name.into(), Arc::from(bytes.into_boxed_slice()))
            })
            .collect();
        Self {
            backing: AssetBacking::Memory(Arc::new(files)),
        }
    }

    /// Directory assets are read from, if the library is file backed.
    pub fn root(&self) -> Option<&Path> {
        match &self.backing {
            AssetBacking::Directory(root) => Some(root),
            AssetBacking::Memory(_) => None,
        }
    }

    /// Loads the raw bytes of the named asset.
    pub fn load(&self, name: &str) -> Result<Vec<u8>, AssetError> {
        validate_name(name)?;
        match &self.backing {
            AssetBacking::Directory(root) => {
                let path = root.join(name);
                fs::read(&path).map_err(|source| match source.kind() {
                    io::ErrorKind::NotFound => AssetError::NotFound {
                        name: name.to_string(),
                    },
                    _ => AssetError::Io {
                        name: name.to_string(),
                        source,
                    },
                })
            }
            AssetBacking::Memory(files) => files
                .get(name)
                .map(|bytes| bytes.to_vec())
                .ok_or_else(|| AssetError::NotFound {
                    name: name.to_string(),
                }),
        }
    }

    /// Loads the named asset as UTF-8 text.
    pub fn load_text(&self, name: &str) -> Result<String, AssetError> {
        let bytes = self.load(name)?;
        String::from_utf8(bytes).map_err(|_| AssetError::NotUtf8 {
            name: name.to_string(),
        })
    }
}

fn validate_name(name: &str) -> Result<(), AssetError> {
    let path = Path::new(name);
    let escapes = name.is_empty()
        || path
            .components()
            .any(|component| !matches!(component, Component::Normal(_)));
    if escapes {
        return Err(AssetError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}
