//! Session volume.
//!
//! Stored as a percentage in `0..=100`; the transport receives the linear
//! multiplier `percent / 100`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Volume {
    percent: u8,
}

impl Volume {
    pub const MAX: u8 = 100;

    pub fn new(percent: u8) -> Self {
        Self {
            percent: percent.min(Self::MAX),
        }
    }

    /// Clamps any user input into `[0, 100]`.
    pub fn from_user_input(requested: i64) -> Self {
        Self {
            percent: requested.clamp(0, Self::MAX as i64) as u8,
        }
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    /// Multiplicador lineal para el transporte (0.0 - 1.0)
    pub fn multiplier(&self) -> f32 {
        self.percent as f32 / Self::MAX as f32
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(Self::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_input_is_clamped() {
        assert_eq!(Volume::from_user_input(-5).multiplier(), 0.0);
        assert_eq!(Volume::from_user_input(150).multiplier(), 1.0);
        assert_eq!(Volume::from_user_input(150).percent(), 100);
        assert_eq!(Volume::from_user_input(i64::MIN).percent(), 0);
    }

    #[test]
    fn multiplier_is_linear() {
        assert_eq!(Volume::new(50).multiplier(), 0.5);
        assert_eq!(Volume::new(0).multiplier(), 0.0);
        assert_eq!(Volume::default().percent(), 100);
    }

    #[test]
    fn constructor_caps_at_max() {
        assert_eq!(Volume::new(200).percent(), 100);
    }
}
