use glam::{Mat4, Vec3};

/// Anything that can supply projection and view matrices for a frame.
pub trait CameraMatrices {
    fn projection(&self) -> Mat4;
    fn view(&self) -> Mat4;
}

/// Fly camera with position, yaw, pitch, and projection parameters.
///
/// The default pose looks straight down -Z onto the XY tile plane.
#[derive(Debug, Clone)]
pub struct FlyCamera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub speed: f32,
    pub sensitivity: f32,
}

impl Default for FlyCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 400.0),
            yaw: -90.0_f32.to_radians(),
            pitch: 0.0,
            fov: 60.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 5000.0,
            speed: 200.0,
            sensitivity: 0.003,
        }
    }
}

impl FlyCamera {
    /// Camera backed off far enough along +Z to see a square of `half_extent`
    /// world units around the origin.
    pub fn framing(half_extent: f32) -> Self {
        let base = Self::default();
        let distance = (half_extent / (base.fov * 0.5).tan()).max(1.0) * 1.1;
        Self {
            position: Vec3::new(0.0, 0.0, distance),
            far: distance * 4.0,
            speed: (distance * 0.5).max(base.speed),
            ..base
        }
    }

    pub fn forward(&self) -> Vec3 {
        Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        )
        .normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize()
    }

    pub fn move_forward(&mut self, dt: f32) {
        let fwd = self.forward();
        self.position += fwd * self.speed * dt;
    }

    pub fn move_backward(&mut self, dt: f32) {
        let fwd = self.forward();
        self.position -= fwd * self.speed * dt;
    }

    pub fn move_left(&mut self, dt: f32) {
        let right = self.right();
        self.position -= right * self.speed * dt;
    }

    pub fn move_right(&mut self, dt: f32) {
        let right = self.right();
        self.position += right * self.speed * dt;
    }

    pub fn move_up(&mut self, dt: f32) {
        self.position.y += self.speed * dt;
    }

    pub fn move_down(&mut self, dt: f32) {
        self.position.y -= self.speed * dt;
    }

    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * self.sensitivity;
        self.pitch -= dy * self.sensitivity;
        self.pitch = self
            .pitch
            .clamp(-89.0_f32.to_radians(), 89.0_f32.to_radians());
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }
}

impl CameraMatrices for FlyCamera {
    fn projection(&self) -> Mat4 {
        self.projection_matrix()
    }

    fn view(&self) -> Mat4 {
        self.view_matrix()
    }
}
