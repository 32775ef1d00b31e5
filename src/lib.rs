//! `bevy_navball_skin`: runtime texture skins for a navball instrument.
//!
//! # Architecture
//! [`NavballSkin`] is the controller.  It resolves the configured texture
//! urls through a [`TextureDatabase`] (fully-qualified first, then relative
//! to the [`SkinDirectory`]), exports one readable copy of each stock texture
//! so users can get the default look back, and writes the overrides into the
//! live flight and cabin navball materials exposed by a [`NavballScene`].
//!
//! The controller is host-agnostic.  [`NavballSkinPlugin`] wires it into a
//! Bevy app: [`TextureLibrary`] is the texture database, [`NavballWorld`] the
//! scene, and [`ActiveVehicleChanged`] / [`CameraModeChanged`] messages are
//! the host events it reacts to.

pub mod config;
pub mod controller;
pub mod error;
pub mod library;
pub mod readable;
pub mod resolver;
pub mod scene;
pub mod systems;

pub use config::{CONFIG_FILE_NAME, NavballConfig};
pub use controller::{CameraMode, NavballSkin, SnapshotOutcome};
pub use error::SkinError;
pub use library::{SkinDirectory, TextureDatabase, TextureLibrary};
pub use readable::{GpuSnapshot, SnapshotKind, TextureReadback};
pub use scene::{FlightNavball, InternalNavball, InternalSpace, NavballScene, NavballWorld};
pub use systems::{ActiveVehicleChanged, CameraModeChanged, NavballSkinSettings, NavballSkinState};

use std::path::PathBuf;

use bevy::prelude::*;

/// Bevy plugin. It attaches the skin at startup and reacts to host messages.
///
/// The app must provide `Assets<Image>` and `Assets<StandardMaterial>`, and
/// fill the [`TextureLibrary`] resource before `PostStartup`.
pub struct NavballSkinPlugin {
    /// Path of the JSON configuration; created with defaults when absent.
    pub config_path: PathBuf,
    pub skin_directory: SkinDirectory,
}

impl NavballSkinPlugin {
    /// Keep the configuration as [`CONFIG_FILE_NAME`] beside the skin folder.
    pub fn new(skin_directory: SkinDirectory) -> Self {
        let base = skin_directory.root.parent().unwrap_or(skin_directory.root.as_path());
        let config_path = base.join(CONFIG_FILE_NAME);
        Self {
            config_path,
            skin_directory,
        }
    }
}

impl Plugin for NavballSkinPlugin {
    fn build(&self, app: &mut App) {
        app.add_message::<ActiveVehicleChanged>()
            .add_message::<CameraModeChanged>()
            .init_resource::<TextureLibrary>()
            .insert_resource(NavballSkinSettings {
                config_path: self.config_path.clone(),
                skin_directory: self.skin_directory.clone(),
            })
            .add_systems(PostStartup, systems::attach_navball_skin)
            .add_systems(
                Update,
                (
                    systems::handle_vehicle_changes,
                    systems::handle_camera_changes,
                )
                    .chain(),
            );
    }
}
