//! Url-addressed texture lookup.
//!
//! Textures are addressed the way the host game addresses them: a
//! `/`-separated url relative to the asset root, without a file extension.
//! [`TextureDatabase`] is the read-only view the resolver and the snapshot
//! guards need; [`TextureLibrary`] is the Bevy resource implementing it.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use bevy::prelude::{Handle, Image, Resource};

/// Read-only lookup of textures by url.
pub trait TextureDatabase<T> {
    /// Look up a fully-qualified url.
    fn lookup(&self, url: &str) -> Option<T>;

    /// Look up `file_name` inside directory `dir`.
    fn lookup_in(&self, dir: &str, file_name: &str) -> Option<T> {
        let dir = dir.trim_matches('/');
        let file_name = file_name.trim_matches('/');
        if dir.is_empty() {
            self.lookup(file_name)
        } else {
            self.lookup(&format!("{dir}/{file_name}"))
        }
    }

    /// Whether `url` names a known directory.
    fn has_directory(&self, url: &str) -> bool;
}

/// Canonical form of a texture url: no surrounding separators, no extension
/// on the final segment.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim_matches('/');
    let (dir, file) = match trimmed.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, trimmed),
    };
    let stem = match file.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => file,
    };
    match dir {
        Some(dir) => format!("{dir}/{stem}"),
        None => stem.to_string(),
    }
}

/// In-memory texture library keyed by normalized url.
///
/// Every parent of an inserted url is registered as a directory, so a skin
/// folder exists as soon as any texture inside it has been added.
#[derive(Resource, Default, Debug)]
pub struct TextureLibrary {
    textures: HashMap<String, Handle<Image>>,
    directories: HashSet<String>,
}

impl TextureLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` under `url`, replacing any previous entry.
    pub fn insert(&mut self, url: &str, handle: Handle<Image>) -> Option<Handle<Image>> {
        let url = normalize_url(url);
        let mut dir = url.as_str();
        while let Some((parent, _)) = dir.rsplit_once('/') {
            self.directories.insert(parent.to_string());
            dir = parent;
        }
        self.textures.insert(url, handle)
    }

    /// Register `handle` under the url derived from a path relative to the
    /// asset root.
    pub fn insert_path(&mut self, path: &Path, handle: Handle<Image>) -> Option<Handle<Image>> {
        let url = path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        self.insert(&url, handle)
    }

    /// Register an empty directory.
    pub fn add_directory(&mut self, url: &str) {
        let url = url.trim_matches('/');
        let mut dir = url;
        self.directories.insert(dir.to_string());
        while let Some((parent, _)) = dir.rsplit_once('/') {
            self.directories.insert(parent.to_string());
            dir = parent;
        }
    }

    pub fn remove(&mut self, url: &str) -> Option<Handle<Image>> {
        self.textures.remove(&normalize_url(url))
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

impl TextureDatabase<Handle<Image>> for TextureLibrary {
    fn lookup(&self, url: &str) -> Option<Handle<Image>> {
        self.textures.get(&normalize_url(url)).cloned()
    }

    fn has_directory(&self, url: &str) -> bool {
        self.directories.contains(url.trim_matches('/'))
    }
}

/// The folder where skins live and stock snapshots are exported.
#[derive(Resource, Clone, Debug, PartialEq, Eq)]
pub struct SkinDirectory {
    /// Url of the folder inside the texture library.
    pub url: String,
    /// The same folder on disk.
    pub root: PathBuf,
}

impl SkinDirectory {
    pub fn new(url: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into().trim_matches('/').to_string(),
            root: root.into(),
        }
    }

    /// Library url a file exported under `file_name` will be known by.
    pub fn export_url(&self, file_name: &str) -> String {
        normalize_url(&format!("{}/{}", self.url, file_name))
    }

    /// On-disk path of an exported file.
    pub fn export_path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }
}
