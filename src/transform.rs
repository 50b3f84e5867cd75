use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Position/orientation snapshot of an entity, as reported by the simulation each frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "TransformData", into = "TransformData")]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self { translation: Vec3::ZERO, rotation: Quat::IDENTITY, scale: Vec3::ONE };

    pub fn from_translation(translation: Vec3) -> Self {
        Self { translation, ..Self::IDENTITY }
    }

    pub fn from_translation_rotation(translation: Vec3, rotation: Quat) -> Self {
        Self { translation, rotation, scale: Vec3::ONE }
    }

    /// Blends `a` towards `b`. The endpoints are returned untouched so sampling exactly on a
    /// recorded frame reproduces that frame bit for bit.
    pub fn blend(a: &Transform, b: &Transform, alpha: f32) -> Transform {
        if alpha <= 0.0 {
            return *a;
        }
        if alpha >= 1.0 {
            return *b;
        }
        Transform {
            translation: a.translation.lerp(b.translation, alpha),
            rotation: a.rotation.slerp(b.rotation, alpha).normalize(),
            scale: a.scale.lerp(b.scale, alpha),
        }
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    /// Heading around the world up axis, in radians.
    pub fn yaw(&self) -> f32 {
        let forward = self.forward();
        forward.y.atan2(forward.x)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Vec3Data {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuatData {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

fn default_scale() -> Vec3Data {
    Vec3Data { x: 1.0, y: 1.0, z: 1.0 }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformData {
    pub translation: Vec3Data,
    pub rotation: QuatData,
    #[serde(default = "default_scale")]
    pub scale: Vec3Data,
}

impl From<Transform> for TransformData {
    fn from(value: Transform) -> Self {
        Self { translation: value.translation.into(), rotation: value.rotation.into(), scale: value.scale.into() }
    }
}

impl From<TransformData> for Transform {
    fn from(value: TransformData) -> Self {
        Self { translation: value.translation.into(), rotation: value.rotation.into(), scale: value.scale.into() }
    }
}

impl From<Vec3> for Vec3Data {
    fn from(value: Vec3) -> Self {
        Self { x: value.x, y: value.y, z: value.z }
    }
}

impl From<Vec3Data> for Vec3 {
    fn from(value: Vec3Data) -> Self {
        Vec3::new(value.x, value.y, value.z)
    }
}

impl From<Quat> for QuatData {
    fn from(value: Quat) -> Self {
        Self { x: value.x, y: value.y, z: value.z, w: value.w }
    }
}

impl From<QuatData> for Quat {
    fn from(value: QuatData) -> Self {
        let quat = Quat::from_xyzw(value.x, value.y, value.z, value.w);
        if quat.length_squared() <= f32::EPSILON {
            Quat::IDENTITY
        } else {
            quat.normalize()
        }
    }
}
