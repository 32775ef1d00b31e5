//! Turns configured texture urls into texture handles.
//!
//! A url is tried first as a fully-qualified library url.  On a miss its
//! final path segment is looked up inside the fallback (skin) directory, so
//! users can write either `Mod/Skins/blue` or just `blue`.

use bevy::log::error;

use crate::{error::SkinError, library::TextureDatabase};

/// Resolve a non-empty `url`, reporting a miss as [`SkinError::AssetNotFound`].
pub fn try_resolve<T, D>(db: &D, url: &str, fallback_dir: &str) -> Result<T, SkinError>
where
    D: TextureDatabase<T> + ?Sized,
{
    if let Some(texture) = db.lookup(url) {
        return Ok(texture);
    }
    let file_name = url.rsplit('/').next().unwrap_or(url);
    if !file_name.is_empty()
        && let Some(texture) = db.lookup_in(fallback_dir, file_name)
    {
        return Ok(texture);
    }
    Err(SkinError::AssetNotFound {
        url: url.to_string(),
    })
}

/// Resolve an optional configured url.
///
/// Empty or absent urls resolve to `None` without touching the database or
/// logging.  Misses are logged and also resolve to `None`.
pub fn resolve<T, D>(db: &D, url: Option<&str>, fallback_dir: &str) -> Option<T>
where
    D: TextureDatabase<T> + ?Sized,
{
    let url = url.filter(|u| !u.is_empty())?;
    try_resolve(db, url, fallback_dir)
        .inspect_err(|e| error!("[NavballSkin] {e}"))
        .ok()
}
