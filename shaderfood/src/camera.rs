use crate::canvas::Canvas;
use crate::params::Params;
use ultraviolet::{Mat4, Vec3};

/// A trivial perspective camera.  `model_to_world` places the camera in
/// the world; the two derived matrices are refreshed by [`Camera::update`].
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub model_to_world: Mat4,
    pub znear: f32,
    pub zfar: f32,
    /// Vertical field of view in radians.
    pub yfov: f32,
    pub aspect: f32,
    pub world_to_camera: Mat4,
    pub camera_to_perspective: Mat4,
}

impl Camera {
    pub fn new(aspect: f32) -> Self {
        let mut camera = Self {
            model_to_world: Mat4::identity(),
            znear: 0.1,
            zfar: 1000.0,
            yfov: 90_f32.to_radians(),
            aspect,
            world_to_camera: Mat4::identity(),
            camera_to_perspective: Mat4::identity(),
        };
        camera.update();
        camera
    }
    pub fn for_canvas(canvas: &Canvas) -> Self {
        Self::new(canvas.aspect())
    }
    pub fn update(&mut self) {
        self.world_to_camera = self.model_to_world.inversed();
        self.camera_to_perspective = ultraviolet::projection::rh_yup::perspective_wgpu_dx(
            self.yfov,
            self.aspect,
            self.znear,
            self.zfar,
        );
    }
    pub fn translate(&mut self, v: Vec3) {
        self.model_to_world = self.model_to_world * Mat4::from_translation(v);
    }
    pub fn position(&self) -> Vec3 {
        self.model_to_world.cols[3].xyz()
    }
    /// Fills in `model_to_perspective` for the model whose `model_to_world`
    /// is already in `params`, and `view_pos` for lighting.
    pub fn set_params(&mut self, params: &mut Params) {
        self.update();
        let model_to_world = params.mat4("model_to_world").unwrap_or_else(Mat4::identity);
        params.set(
            "model_to_perspective",
            self.camera_to_perspective * self.world_to_camera * model_to_world,
        );
        params.set("view_pos", self.position());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Value;
    use ultraviolet::Vec4;

    #[test]
    fn origin_is_in_front_of_camera() {
        let mut camera = Camera::new(1.0);
        camera.translate(Vec3::new(0.0, 0.0, 3.0));
        let mut params = Params::new();
        camera.set_params(&mut params);
        let m = params.mat4("model_to_perspective").unwrap();
        let clip = m * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!(clip.x.abs() < 1e-5);
        assert!(clip.y.abs() < 1e-5);
        assert!((clip.w - 3.0).abs() < 1e-5);
        let depth = clip.z / clip.w;
        assert!(depth > 0.0 && depth < 1.0);
    }

    #[test]
    fn view_pos_follows_translation() {
        let mut camera = Camera::new(4.0 / 3.0);
        camera.translate(Vec3::new(1.0, 2.0, 3.0));
        camera.translate(Vec3::new(0.0, 0.0, 1.0));
        let mut params = Params::with_default_material();
        camera.set_params(&mut params);
        assert_eq!(params.get("view_pos"), Some(&Value::Vec3([1.0, 2.0, 4.0])));
    }

    #[test]
    fn model_transform_is_applied() {
        let mut camera = Camera::new(1.0);
        camera.translate(Vec3::new(0.0, 0.0, 3.0));
        let mut params = Params::new();
        params.set("model_to_world", Mat4::from_translation(Vec3::new(0.0, 0.0, -2.0)));
        camera.set_params(&mut params);
        let clip = params.mat4("model_to_perspective").unwrap() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!((clip.w - 5.0).abs() < 1e-5);
    }
}
