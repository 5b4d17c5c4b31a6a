use serde::{Deserialize, Serialize};

/// Named edit parameters for one render.
///
/// Every field defaults to 0 when absent from the wire payload, and serde
/// ignores keys outside this set, so older or newer clients can send extra
/// parameters without being rejected.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditParams {
    pub smile: f32,
    pub aaa: f32,
    pub eee: f32,
    pub woo: f32,
    pub wink: f32,
    pub pupil_x: f32,
    pub pupil_y: f32,
    pub eyes: f32,
    pub eyebrow: f32,
    pub rotate_pitch: f32,
    pub rotate_yaw: f32,
    pub rotate_roll: f32,
}

impl EditParams {
    /// True when every parameter is exactly zero.
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}
