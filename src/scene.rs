//! Live navball materials.
//!
//! The flight navball has one shared material; cabin (IVA) navballs have one
//! material per instrument, and cabins come and go with the vessel.  Cabin
//! materials are therefore never cached: every call to
//! [`NavballScene::iva_materials`] walks the hierarchy again.
//!
//! [`NavballWorld`] is the Bevy implementation.  It finds the flight navball
//! through the [`FlightNavball`] marker and cabin navballs as descendants
//! named [`IVA_NAVBALL_RENDERER`] of an [`InternalNavball`] inside an
//! [`InternalSpace`].

use bevy::{
    asset::Assets,
    color::LinearRgba,
    ecs::system::SystemParam,
    math::{Affine2, Mat2, Vec2},
    pbr::{MeshMaterial3d, StandardMaterial},
    prelude::{Children, Commands, Component, Entity, Handle, Image, Name, Query, Res, ResMut, With},
    render::gpu_readback::Readback,
};
use image::RgbaImage;

use crate::{
    error::SkinError,
    readable::{GpuSnapshot, TextureReadback, validate_dimensions},
    systems::finish_gpu_snapshot,
};

/// Name of the renderer child under a cabin navball instrument.
pub const IVA_NAVBALL_RENDERER: &str = "NavSphere";

/// Texture slots the skin can replace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Main,
    Emissive,
}

/// Texture-space scale and offset: `uv' = uv * scale + offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UvTransform {
    pub scale: Vec2,
    pub offset: Vec2,
}

impl UvTransform {
    /// Mirror along U.  Cabin navballs present their texture mirrored, so
    /// overrides written there need this to read the right way round.
    pub const HORIZONTAL_FLIP: Self = Self {
        scale: Vec2::new(-1.0, 1.0),
        offset: Vec2::new(1.0, 0.0),
    };

    pub fn to_affine(self) -> Affine2 {
        Affine2::from_mat2_translation(Mat2::from_diagonal(self.scale), self.offset)
    }
}

/// One fresh enumeration of cabin navball materials.
#[derive(Clone, Debug, PartialEq)]
pub struct IvaMaterials<M> {
    pub materials: Vec<M>,
    /// Cabin navball instruments seen, with or without a renderer.
    pub navballs: usize,
}

impl<M> Default for IvaMaterials<M> {
    fn default() -> Self {
        Self {
            materials: Vec::new(),
            navballs: 0,
        }
    }
}

/// Access to the materials the skin reads and writes.
pub trait NavballScene<T> {
    type Material: Clone;

    /// The material of the flight navball, if one is live.
    fn flight_material(&self) -> Option<Self::Material>;

    /// Every live cabin navball material.
    fn iva_materials(&self) -> IvaMaterials<Self::Material>;

    fn texture(&self, material: &Self::Material, slot: TextureSlot) -> Option<T>;

    fn set_texture(&mut self, material: &Self::Material, slot: TextureSlot, texture: T);

    fn set_uv_transform(&mut self, material: &Self::Material, slot: TextureSlot, uv: UvTransform);

    fn set_emissive_color(&mut self, material: &Self::Material, color: LinearRgba);
}

/// Marks the entity rendering the flight navball.
#[derive(Component, Debug, Default)]
pub struct FlightNavball;

/// Marks the root of a cabin interior.
#[derive(Component, Debug, Default)]
pub struct InternalSpace;

/// Marks a cabin navball instrument.
#[derive(Component, Debug, Default)]
pub struct InternalNavball;

/// Bevy-backed [`NavballScene`] and [`TextureReadback`].
#[derive(SystemParam)]
pub struct NavballWorld<'w, 's> {
    flight: Query<'w, 's, &'static MeshMaterial3d<StandardMaterial>, With<FlightNavball>>,
    spaces: Query<'w, 's, Entity, With<InternalSpace>>,
    navballs: Query<'w, 's, (), With<InternalNavball>>,
    children: Query<'w, 's, &'static Children>,
    renderers: Query<'w, 's, (&'static Name, &'static MeshMaterial3d<StandardMaterial>)>,
    materials: ResMut<'w, Assets<StandardMaterial>>,
    images: Res<'w, Assets<Image>>,
    commands: Commands<'w, 's>,
}

impl NavballWorld<'_, '_> {
    fn renderer_under(&self, navball: Entity) -> Option<Handle<StandardMaterial>> {
        self.children.iter_descendants(navball).find_map(|entity| {
            self.renderers
                .get(entity)
                .ok()
                .filter(|(name, _)| name.as_str() == IVA_NAVBALL_RENDERER)
                .map(|(_, material)| material.0.clone())
        })
    }
}

impl NavballScene<Handle<Image>> for NavballWorld<'_, '_> {
    type Material = Handle<StandardMaterial>;

    fn flight_material(&self) -> Option<Self::Material> {
        self.flight.iter().next().map(|material| material.0.clone())
    }

    fn iva_materials(&self) -> IvaMaterials<Self::Material> {
        let mut found = IvaMaterials::default();
        for space in &self.spaces {
            for navball in self.children.iter_descendants(space) {
                if !self.navballs.contains(navball) {
                    continue;
                }
                found.navballs += 1;
                if let Some(material) = self.renderer_under(navball) {
                    found.materials.push(material);
                }
            }
        }
        found
    }

    fn texture(&self, material: &Self::Material, slot: TextureSlot) -> Option<Handle<Image>> {
        let material = self.materials.get(material)?;
        match slot {
            TextureSlot::Main => material.base_color_texture.clone(),
            TextureSlot::Emissive => material.emissive_texture.clone(),
        }
    }

    fn set_texture(
        &mut self,
        material: &Self::Material,
        slot: TextureSlot,
        texture: Handle<Image>,
    ) {
        if let Some(material) = self.materials.get_mut(material) {
            match slot {
                TextureSlot::Main => material.base_color_texture = Some(texture),
                TextureSlot::Emissive => material.emissive_texture = Some(texture),
            }
        }
    }

    // StandardMaterial has a single uv_transform shared by every slot.
    fn set_uv_transform(&mut self, material: &Self::Material, _slot: TextureSlot, uv: UvTransform) {
        if let Some(material) = self.materials.get_mut(material) {
            material.uv_transform = uv.to_affine();
        }
    }

    fn set_emissive_color(&mut self, material: &Self::Material, color: LinearRgba) {
        if let Some(material) = self.materials.get_mut(material) {
            material.emissive = color;
        }
    }
}

impl TextureReadback<Handle<Image>> for NavballWorld<'_, '_> {
    fn read_rgba(&self, texture: &Handle<Image>) -> Result<RgbaImage, SkinError> {
        self.images.read_rgba(texture)
    }

    /// Spawn a [`Readback`] of the GPU texture.  [`finish_gpu_snapshot`]
    /// writes the file once the copy arrives.
    fn queue_gpu_readback(
        &mut self,
        texture: &Handle<Image>,
        snapshot: GpuSnapshot,
    ) -> Result<(), SkinError> {
        let image = self.images.get(texture).ok_or(SkinError::NotReadable)?;
        validate_dimensions(image.width(), image.height())?;
        let format = image.texture_descriptor.format;
        if format.is_compressed() {
            return Err(SkinError::UnsupportedFormat {
                format: format!("{format:?}"),
            });
        }
        self.commands
            .spawn((Readback::texture(texture.clone()), snapshot))
            .observe(finish_gpu_snapshot);
        Ok(())
    }
}
