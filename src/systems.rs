//! Bevy systems driving the [`NavballSkin`] controller.
//!
//! The host reports vehicle switches and camera mode changes as messages;
//! each system handles them synchronously within the frame they arrive, so
//! the flight material is reapplied before anything else reads it.
//!
//! # Usage
//! ```rust,ignore
//! app.add_plugins(NavballSkinPlugin::new(SkinDirectory::new(
//!     "NavballSkin/Skins",
//!     "assets/NavballSkin/Skins",
//! )));
//!
//! // Later, from host code:
//! vehicles.write(ActiveVehicleChanged(new_vessel));
//! cameras.write(CameraModeChanged(CameraMode::Iva));
//! ```

use std::path::PathBuf;

use bevy::{
    prelude::*,
    render::gpu_readback::{Readback, ReadbackComplete},
};

use crate::{
    config::NavballConfig,
    controller::{CameraMode, NavballSkin},
    error::SkinError,
    library::{SkinDirectory, TextureLibrary},
    readable::{GpuSnapshot, decode_gpu_copy, save_png},
    scene::NavballWorld,
};

/// The controller as used inside a Bevy app.
pub type BevyNavballSkin = NavballSkin<Handle<Image>, Handle<StandardMaterial>>;

/// The active vehicle changed.
#[derive(Message, Clone, Copy, Debug)]
pub struct ActiveVehicleChanged(pub Entity);

/// The camera switched to a new mode.
#[derive(Message, Clone, Copy, Debug)]
pub struct CameraModeChanged(pub CameraMode);

/// Where the configuration lives and which skin directory to use.
#[derive(Resource, Clone, Debug)]
pub struct NavballSkinSettings {
    pub config_path: PathBuf,
    pub skin_directory: SkinDirectory,
}

/// The attached controller.  Present once [`attach_navball_skin`] succeeded.
#[derive(Resource, Deref, DerefMut)]
pub struct NavballSkinState(pub BevyNavballSkin);

/// Load the configuration and attach the controller.
///
/// An unreadable configuration falls back to defaults.  A skin directory
/// missing from the [`TextureLibrary`] is returned as an error.
pub fn attach_navball_skin(
    mut commands: Commands,
    settings: Res<NavballSkinSettings>,
    library: Res<TextureLibrary>,
    mut scene: NavballWorld,
) -> Result {
    let config = NavballConfig::load_or_create(&settings.config_path).unwrap_or_else(|e| {
        error!(
            "[NavballSkin] Could not load config, using defaults: {}",
            e.report()
        );
        NavballConfig::default()
    });

    let mut skin: BevyNavballSkin = NavballSkin::new(settings.skin_directory.clone(), &*library)?;
    skin.activate(config, &*library, &mut scene);
    commands.insert_resource(NavballSkinState(skin));
    Ok(())
}

/// Invalidate and reapply the flight texture on every vehicle switch.
pub fn handle_vehicle_changes(
    mut messages: MessageReader<ActiveVehicleChanged>,
    mut skin: Option<ResMut<NavballSkinState>>,
    mut scene: NavballWorld,
) {
    for changed in messages.read() {
        let Some(skin) = skin.as_mut() else {
            continue;
        };
        debug!("[NavballSkin] Active vehicle changed to {:?}", changed.0);
        skin.on_active_vehicle_changed(&mut scene);
    }
}

/// Snapshot and reapply cabin textures when the camera enters the cabin.
pub fn handle_camera_changes(
    mut messages: MessageReader<CameraModeChanged>,
    mut skin: Option<ResMut<NavballSkinState>>,
    library: Res<TextureLibrary>,
    mut scene: NavballWorld,
) {
    for changed in messages.read() {
        let Some(skin) = skin.as_mut() else {
            continue;
        };
        skin.on_camera_mode_changed(changed.0, &*library, &mut scene);
    }
}

/// Write a finished GPU copy of a stock texture to disk.
///
/// Observes the entity spawned for the [`GpuSnapshot`].  The entity is
/// despawned after the first copy arrives.  When the file cannot be written
/// the snapshot is released so the next trigger retries it.
pub fn finish_gpu_snapshot(
    event: On<ReadbackComplete>,
    snapshots: Query<(&GpuSnapshot, &Readback)>,
    images: Res<Assets<Image>>,
    skin: Option<ResMut<NavballSkinState>>,
    mut commands: Commands,
) {
    let complete = event.event();
    let Ok((snapshot, Readback::Texture(source))) = snapshots.get(complete.entity) else {
        return;
    };
    commands.entity(complete.entity).despawn();

    let written = images
        .get(source)
        .ok_or(SkinError::NotReadable)
        .and_then(|image| {
            decode_gpu_copy(
                &complete.data,
                image.width(),
                image.height(),
                image.texture_descriptor.format,
            )
        })
        .and_then(|readable| save_png(&readable, &snapshot.path));

    match written {
        Ok(()) => info!(
            "[NavballSkin] Saved a copy of the {} to {}",
            snapshot.kind,
            snapshot.path.display()
        ),
        Err(e) => {
            error!(
                "[NavballSkin] Error while copying {} from the GPU: {}",
                snapshot.kind,
                e.report()
            );
            if let Some(mut skin) = skin {
                skin.release_snapshot(snapshot.kind);
            }
        }
    }
}
