//! The navball skin controller.
//!
//! [`NavballSkin`] owns the resolved override textures and two lazily filled
//! cache cells: the flight navball material and the stock (original) flight
//! texture.  The stock texture is read from the flight material the first
//! time it is needed and never re-read, because once an override has been
//! written into that material its main slot no longer holds the original.
//!
//! Every operation is synchronous and host-agnostic: the host hands in a
//! [`TextureDatabase`], a [`NavballScene`] and a [`TextureReadback`] and the
//! controller reads and writes through them.  Failures are logged and turned
//! into no-ops, except for a missing skin directory at construction.

use std::path::PathBuf;

use bevy::log::{debug, error, info, warn};

use crate::{
    config::NavballConfig,
    error::SkinError,
    library::{SkinDirectory, TextureDatabase},
    readable::{GpuSnapshot, SnapshotKind, TextureReadback, save_png},
    resolver::resolve,
    scene::{IVA_NAVBALL_RENDERER, NavballScene, TextureSlot, UvTransform},
};

/// File the stock flight texture is exported to, inside the skin directory.
pub const STOCK_TEXTURE_FILE: &str = "stock.png";

/// File the stock cabin emissive texture is exported to.
pub const STOCK_EMISSIVE_FILE: &str = "stock_emissive.png";

/// Camera modes reported by the host.  Only [`CameraMode::Iva`] triggers
/// cabin texture work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum CameraMode {
    #[default]
    Flight,
    Map,
    External,
    /// Inside the cabin, looking at the instruments.
    Iva,
    Internal,
}

/// Result of a stock snapshot attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Already exported, in this run or a previous one.
    Skipped,
    /// Nothing to export: no live source texture.
    Missing,
    Saved(PathBuf),
    /// The source only lives on the GPU; a copy was queued and will be
    /// written to this path when it arrives.
    Queued(PathBuf),
    /// Export failed; a later attempt may retry.
    Failed,
}

/// Export-once guards for the stock snapshots.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SnapshotGuard {
    pub stock_texture_saved: bool,
    pub stock_emissive_saved: bool,
}

/// Resolves configured navball textures and applies them to live materials.
///
/// `T` is the texture handle type, `M` the material handle type.
pub struct NavballSkin<T, M> {
    config: NavballConfig,
    skin_directory: SkinDirectory,
    main_texture: Option<T>,
    emissive_texture: Option<T>,
    stock_texture: Option<T>,
    flight_material: Option<M>,
    guard: SnapshotGuard,
}

impl<T, M> NavballSkin<T, M>
where
    T: Clone + PartialEq,
    M: Clone,
{
    /// Create a controller for `skin_directory`.
    ///
    /// Fails with [`SkinError::MissingSkinDirectory`] when the library has no
    /// such directory: nothing can be resolved or exported without it.
    pub fn new<D>(skin_directory: SkinDirectory, db: &D) -> Result<Self, SkinError>
    where
        D: TextureDatabase<T> + ?Sized,
    {
        if !db.has_directory(&skin_directory.url) {
            return Err(SkinError::MissingSkinDirectory {
                url: skin_directory.url,
            });
        }
        Ok(Self {
            config: NavballConfig::default(),
            skin_directory,
            main_texture: None,
            emissive_texture: None,
            stock_texture: None,
            flight_material: None,
            guard: SnapshotGuard::default(),
        })
    }

    /// Install `config` and resolve its texture urls.
    ///
    /// The stock texture is captured here, before anything can be written
    /// into the flight material.  An empty or unresolvable `texture_url`
    /// falls back to it; an unresolvable `emissive_url` stays absent.
    pub fn load_config<D, S>(&mut self, config: NavballConfig, db: &D, scene: &S)
    where
        D: TextureDatabase<T> + ?Sized,
        S: NavballScene<T, Material = M> + ?Sized,
    {
        let stock = self.stock_texture(scene);
        let dir = self.skin_directory.url.as_str();
        self.main_texture = resolve(db, Some(config.texture_url.as_str()), dir).or(stock);
        self.emissive_texture = resolve(db, Some(config.emissive_url.as_str()), dir);
        self.config = config;
    }

    /// Load `config`, export the stock flight texture if needed and apply the
    /// flight override, in that order.
    pub fn activate<D, S>(&mut self, config: NavballConfig, db: &D, scene: &mut S)
    where
        D: TextureDatabase<T> + ?Sized,
        S: NavballScene<T, Material = M> + TextureReadback<T> + ?Sized,
    {
        self.load_config(config, db, &*scene);
        self.snapshot_stock_flight_texture(db, &mut *scene);
        self.apply_flight_texture(scene);
    }

    /// The flight navball material, resolved from the scene on first use.
    pub fn flight_material<S>(&mut self, scene: &S) -> Option<M>
    where
        S: NavballScene<T, Material = M> + ?Sized,
    {
        if self.flight_material.is_none() {
            self.flight_material = scene.flight_material();
        }
        self.flight_material.clone()
    }

    /// Forget the cached flight material.  Call whenever the active vehicle
    /// changes; the old material belongs to the previous vehicle.
    pub fn invalidate_flight_material(&mut self) {
        self.flight_material = None;
    }

    /// The original flight texture, cached once observed.
    pub fn stock_texture<S>(&mut self, scene: &S) -> Option<T>
    where
        S: NavballScene<T, Material = M> + ?Sized,
    {
        if self.stock_texture.is_none() {
            self.stock_texture = self
                .flight_material(scene)
                .and_then(|material| scene.texture(&material, TextureSlot::Main));
        }
        self.stock_texture.clone()
    }

    /// Export a copy of the stock flight texture to the skin directory.
    ///
    /// Skipped when a file by that name is already in the library or this
    /// controller has already exported (or queued) it.
    pub fn snapshot_stock_flight_texture<D, S>(&mut self, db: &D, scene: &mut S) -> SnapshotOutcome
    where
        D: TextureDatabase<T> + ?Sized,
        S: NavballScene<T, Material = M> + TextureReadback<T> + ?Sized,
    {
        let url = self.skin_directory.export_url(STOCK_TEXTURE_FILE);
        if self.guard.stock_texture_saved || db.lookup(&url).is_some() {
            return SnapshotOutcome::Skipped;
        }
        let Some(stock) = self.stock_texture(&*scene) else {
            info!("[NavballSkin] Could not create copy of stock texture: no flight navball");
            return SnapshotOutcome::Missing;
        };
        let outcome = self.export(scene, &stock, SnapshotKind::FlightTexture);
        if matches!(outcome, SnapshotOutcome::Saved(_) | SnapshotOutcome::Queued(_)) {
            self.guard.stock_texture_saved = true;
        }
        outcome
    }

    /// Export a copy of the stock cabin emissive texture.
    ///
    /// The source is the first live cabin material with an emissive texture.
    pub fn snapshot_stock_iva_emissive<D, S>(&mut self, db: &D, scene: &mut S) -> SnapshotOutcome
    where
        D: TextureDatabase<T> + ?Sized,
        S: NavballScene<T, Material = M> + TextureReadback<T> + ?Sized,
    {
        let url = self.skin_directory.export_url(STOCK_EMISSIVE_FILE);
        if self.guard.stock_emissive_saved || db.lookup(&url).is_some() {
            return SnapshotOutcome::Skipped;
        }

        let mut emissives: Vec<T> = Vec::new();
        for material in scene.iva_materials().materials {
            if let Some(texture) = scene.texture(&material, TextureSlot::Emissive)
                && !emissives.contains(&texture)
            {
                emissives.push(texture);
            }
        }
        let Some(stock) = emissives.first() else {
            info!("[NavballSkin] No live cabin navball has an emissive texture to copy");
            return SnapshotOutcome::Missing;
        };
        if emissives.len() > 1 {
            debug!(
                "[NavballSkin] {} distinct cabin emissive textures are live; copying the first",
                emissives.len()
            );
        }

        let outcome = self.export(scene, stock, SnapshotKind::IvaEmissive);
        if matches!(outcome, SnapshotOutcome::Saved(_) | SnapshotOutcome::Queued(_)) {
            self.guard.stock_emissive_saved = true;
        }
        outcome
    }

    /// Forget that a snapshot was exported so the next attempt retries it.
    /// Hosts call this when a queued GPU copy fails to reach the disk.
    pub fn release_snapshot(&mut self, kind: SnapshotKind) {
        match kind {
            SnapshotKind::FlightTexture => self.guard.stock_texture_saved = false,
            SnapshotKind::IvaEmissive => self.guard.stock_emissive_saved = false,
        }
    }

    fn export<R>(&self, readback: &mut R, texture: &T, kind: SnapshotKind) -> SnapshotOutcome
    where
        R: TextureReadback<T> + ?Sized,
    {
        let path = self.skin_directory.export_path(match kind {
            SnapshotKind::FlightTexture => STOCK_TEXTURE_FILE,
            SnapshotKind::IvaEmissive => STOCK_EMISSIVE_FILE,
        });
        let written = match readback.read_rgba(texture) {
            Err(SkinError::NotReadable) => {
                let snapshot = GpuSnapshot {
                    kind,
                    path: path.clone(),
                };
                match readback.queue_gpu_readback(texture, snapshot) {
                    Ok(()) => {
                        info!(
                            "[NavballSkin] Queued a GPU copy of the {kind} for {}",
                            path.display()
                        );
                        return SnapshotOutcome::Queued(path);
                    }
                    Err(e) => Err(e),
                }
            }
            read => read.and_then(|readable| save_png(&readable, &path)),
        };

        match written {
            Ok(()) => {
                info!("[NavballSkin] Saved a copy of the {kind} to {}", path.display());
                SnapshotOutcome::Saved(path)
            }
            Err(e @ SkinError::PermissionDenied { .. }) => {
                error!(
                    "[NavballSkin] Could not copy {kind} into '{}' due to insufficient permissions: {}",
                    self.skin_directory.root.display(),
                    e.report()
                );
                SnapshotOutcome::Failed
            }
            Err(e) => {
                error!("[NavballSkin] Error while copying {kind}: {}", e.report());
                SnapshotOutcome::Failed
            }
        }
    }

    /// Write the resolved main texture into the flight material.
    ///
    /// The flight material is shared: every renderer using it changes at
    /// once.  Returns whether a write happened.
    pub fn apply_flight_texture<S>(&mut self, scene: &mut S) -> bool
    where
        S: NavballScene<T, Material = M> + ?Sized,
    {
        if !self.config.flight_enabled {
            return false;
        }
        let Some(texture) = self.main_texture.clone() else {
            return false;
        };
        let Some(material) = self.flight_material(&*scene) else {
            debug!("[NavballSkin] No flight navball is live");
            return false;
        };
        scene.set_texture(&material, TextureSlot::Main, texture);
        info!("[NavballSkin] Changed flight navball texture");
        true
    }

    /// Write the resolved textures and the emissive tint into every live
    /// cabin navball material.  Returns the number of materials written.
    pub fn apply_iva_textures<S>(&self, scene: &mut S) -> usize
    where
        S: NavballScene<T, Material = M> + ?Sized,
    {
        if !self.config.iva_enabled {
            return 0;
        }
        let live = scene.iva_materials();
        if live.materials.is_empty() {
            if live.navballs > 0 {
                warn!(
                    "[NavballSkin] There seems to be a cabin navball but its '{IVA_NAVBALL_RENDERER}' renderer wasn't found"
                );
            } else {
                info!("[NavballSkin] No cabin navball materials are live");
            }
            return 0;
        }

        let tint = self.config.emissive_tint();
        for material in &live.materials {
            if let Some(texture) = &self.main_texture {
                scene.set_texture(material, TextureSlot::Main, texture.clone());
                scene.set_uv_transform(material, TextureSlot::Main, UvTransform::HORIZONTAL_FLIP);
            }
            if let Some(texture) = &self.emissive_texture {
                scene.set_texture(material, TextureSlot::Emissive, texture.clone());
                scene.set_uv_transform(
                    material,
                    TextureSlot::Emissive,
                    UvTransform::HORIZONTAL_FLIP,
                );
            }
            scene.set_emissive_color(material, tint);
        }
        live.materials.len()
    }

    /// The active vehicle changed: drop the stale flight material and
    /// reapply before returning.
    pub fn on_active_vehicle_changed<S>(&mut self, scene: &mut S) -> bool
    where
        S: NavballScene<T, Material = M> + ?Sized,
    {
        self.invalidate_flight_material();
        self.apply_flight_texture(scene)
    }

    /// The camera mode changed.  Entering the cabin re-applies cabin textures,
    /// since cabins may have been created or rebuilt in the meantime.
    pub fn on_camera_mode_changed<D, S>(
        &mut self,
        mode: CameraMode,
        db: &D,
        scene: &mut S,
    ) -> usize
    where
        D: TextureDatabase<T> + ?Sized,
        S: NavballScene<T, Material = M> + TextureReadback<T> + ?Sized,
    {
        if mode != CameraMode::Iva {
            return 0;
        }
        self.snapshot_stock_iva_emissive(db, &mut *scene);
        self.apply_iva_textures(scene)
    }

    pub fn config(&self) -> &NavballConfig {
        &self.config
    }

    pub fn skin_directory(&self) -> &SkinDirectory {
        &self.skin_directory
    }

    pub fn main_texture(&self) -> Option<&T> {
        self.main_texture.as_ref()
    }

    pub fn emissive_texture(&self) -> Option<&T> {
        self.emissive_texture.as_ref()
    }

    pub fn snapshot_guard(&self) -> SnapshotGuard {
        self.guard
    }
}
