pub trait ProgressBar {
    fn init(total: usize, description: &str) -> Self;
    fn set_position(&self, position: usize);
    fn increment(&self);
    fn destroy(self);
}

/// Draws nothing
pub struct NoProgress;

impl ProgressBar for NoProgress {
    fn init(_total: usize, _description: &str) -> Self {
        Self
    }

    fn set_position(&self, _position: usize) {}

    fn increment(&self) {}

    fn destroy(self) {}
}
