mod mat22;
mod mat33;
mod rot;
mod transform;
mod vec2;
mod vec3;

pub use mat22::Mat22;
pub use mat33::Mat33;
pub use rot::Rot;
pub use transform::{Sweep, Transform};
pub use vec2::Vec2;
pub use vec3::Vec3;
