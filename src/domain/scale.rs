//! Mapping between logical board units and physics/render units.
//!
//! A run has exactly one [`Scale`]. Every length and coordinate handed to the physics engine or the
//! renderer is a logical value multiplied by its factor, and every value read back is divided by
//! it.

use thiserror::Error;

use super::Position;

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Scale(f64);

impl Scale {
    pub fn new(factor: f64) -> Result<Self, ScaleError> {
        if factor.is_finite() && factor > 0.0 {
            Ok(Self(factor))
        } else {
            Err(ScaleError::InvalidFactor(factor))
        }
    }

    /// Largest factor at which the board fits next to the sidebar without distortion. The axis
    /// with slack is shrunk so that the returned viewport keeps the board's aspect ratio.
    pub fn fit(board_width: f64, board_height: f64, screen: Viewport) -> Result<(Self, Viewport), ScaleError> {
        if !(board_width > 0.0 && board_height > 0.0) {
            return Err(ScaleError::NonPositiveBoard {
                width: board_width,
                height: board_height,
            });
        }
        if screen.height == 0 || screen.width <= screen.side_bar_width {
            return Err(ScaleError::NonPositiveViewport {
                width: screen.width,
                height: screen.height,
                side_bar_width: screen.side_bar_width,
            });
        }

        let x_scale = f64::from(screen.width - screen.side_bar_width) / board_width;
        let y_scale = f64::from(screen.height) / board_height;

        let mut viewport = screen;
        let factor = if x_scale < y_scale {
            viewport.height = (x_scale * board_height) as u32;
            x_scale
        } else if y_scale < x_scale {
            viewport.width = screen.side_bar_width + (y_scale * board_width) as u32;
            y_scale
        } else {
            x_scale
        };

        Ok((Self::new(factor)?, viewport))
    }

    pub fn factor(&self) -> f64 {
        self.0
    }

    pub fn scale(&self, value: f64) -> f64 {
        value * self.0
    }

    pub fn unscale(&self, value: f64) -> f64 {
        value / self.0
    }

    pub fn scale_position(&self, position: Position) -> Position {
        position * self.0
    }

    pub fn unscale_position(&self, position: Position) -> Position {
        position * self.0.recip()
    }
}

/// Window area in pixels. The sidebar occupies the rightmost `side_bar_width` pixels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub side_bar_width: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32, side_bar_width: u32) -> Self {
        Self {
            width,
            height,
            side_bar_width,
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ScaleError {
    #[error("board dimensions must be positive, got {width}x{height}")]
    NonPositiveBoard { width: f64, height: f64 },
    #[error("screen {width}x{height} leaves no room next to a {side_bar_width} pixel sidebar")]
    NonPositiveViewport {
        width: u32,
        height: u32,
        side_bar_width: u32,
    },
    #[error("scale factor must be finite and positive, got {0}")]
    InvalidFactor(f64),
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use rstest::rstest;

    use super::*;

    const RNG_SEED: u64 = 19878367467712;

    #[test]
    fn test_scale_fit_sidebar_binding_height() {
        let (scale, viewport) = Scale::fit(200.0, 200.0, Viewport::new(800, 600, 100)).unwrap();
        assert_abs_diff_eq!(scale.factor(), 3.0);
        assert_eq!(viewport, Viewport::new(700, 600, 100));
    }

    #[test]
    fn test_scale_fit_width_binding_shrinks_height() {
        let (scale, viewport) = Scale::fit(400.0, 100.0, Viewport::new(900, 600, 100)).unwrap();
        assert_abs_diff_eq!(scale.factor(), 2.0);
        assert_eq!(viewport, Viewport::new(900, 200, 100));
    }

    #[test]
    fn test_scale_fit_equal_axes_keeps_screen() {
        let (scale, viewport) = Scale::fit(100.0, 100.0, Viewport::new(600, 500, 100)).unwrap();
        assert_abs_diff_eq!(scale.factor(), 5.0);
        assert_eq!(viewport, Viewport::new(600, 500, 100));
    }

    #[rstest]
    #[case::zero_width(0.0, 100.0)]
    #[case::zero_height(100.0, 0.0)]
    #[case::negative(-1.0, 100.0)]
    #[case::nan(f64::NAN, 100.0)]
    fn test_scale_fit_rejects_board(#[case] width: f64, #[case] height: f64) {
        assert!(matches!(
            Scale::fit(width, height, Viewport::new(800, 600, 100)),
            Err(ScaleError::NonPositiveBoard { .. })
        ));
    }

    #[rstest]
    #[case::sidebar_fills_screen(Viewport::new(100, 600, 100))]
    #[case::zero_height(Viewport::new(800, 0, 100))]
    fn test_scale_fit_rejects_viewport(#[case] screen: Viewport) {
        assert!(matches!(
            Scale::fit(200.0, 200.0, screen),
            Err(ScaleError::NonPositiveViewport { .. })
        ));
    }

    #[rstest]
    #[case(0.0)]
    #[case(-2.0)]
    #[case(f64::INFINITY)]
    fn test_scale_new_rejects(#[case] factor: f64) {
        assert_eq!(Scale::new(factor), Err(ScaleError::InvalidFactor(factor)));
    }

    #[test]
    fn test_unscale_inverts_scale() {
        let mut rng = ChaCha8Rng::seed_from_u64(RNG_SEED);
        for _ in 0..1000 {
            let scale = Scale::new(rng.random_range(0.01..100.0)).unwrap();
            let length = rng.random_range(0.0..10_000.0);
            assert_abs_diff_eq!(
                scale.unscale(scale.scale(length)),
                length,
                epsilon = 1e-9 * length.max(1.0)
            );
        }
    }

    #[test]
    fn test_scale_position() {
        let scale = Scale::new(3.0).unwrap();
        assert_abs_diff_eq!(
            scale.scale_position(Position::new(50.0, 20.0)),
            Position::new(150.0, 60.0)
        );
        assert_abs_diff_eq!(
            scale.unscale_position(Position::new(150.0, 60.0)),
            Position::new(50.0, 20.0),
            epsilon = 1e-12
        );
    }
}
