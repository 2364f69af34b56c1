//! Summed-area table for constant-time box filters.
//!
//! The table has one extra leading row and column of zeros, so entry
//! `(x, y)` holds the sum of all pixels strictly above and left of `(x, y)`.

use crate::image::ImageView;

/// Integral image of an 8-bit grayscale view.
#[derive(Clone, Debug)]
pub struct IntegralImage {
    sums: Vec<i64>,
    width: usize,
    height: usize,
}

impl IntegralImage {
    /// Builds the summed-area table for `src`.
    pub fn new(src: ImageView<'_, u8>) -> Self {
        let width = src.width();
        let height = src.height();
        let cols = width + 1;
        let mut sums = vec![0i64; cols * (height + 1)];
        for y in 0..height {
            // Views are validated at construction so every row exists.
            let row = src.row(y).unwrap_or(&[]);
            let mut row_sum = 0i64;
            for (x, &value) in row.iter().enumerate() {
                row_sum += i64::from(value);
                sums[(y + 1) * cols + x + 1] = sums[y * cols + x + 1] + row_sum;
            }
        }
        Self {
            sums,
            width,
            height,
        }
    }

    /// Width of the source image in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height of the source image in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn at(&self, x: usize, y: usize) -> i64 {
        self.sums[y * (self.width + 1) + x]
    }

    /// Sum of pixels in `[x0, x1) x [y0, y1)`.
    ///
    /// Coordinates are clamped to the image, so a box hanging over the border
    /// only sums its inside part.
    #[inline]
    pub fn box_sum(&self, x0: isize, y0: isize, x1: isize, y1: isize) -> f32 {
        let clamp_x = |v: isize| v.clamp(0, self.width as isize) as usize;
        let clamp_y = |v: isize| v.clamp(0, self.height as isize) as usize;
        let (x0, x1) = (clamp_x(x0), clamp_x(x1));
        let (y0, y1) = (clamp_y(y0), clamp_y(y1));
        if x1 <= x0 || y1 <= y0 {
            return 0.0;
        }
        (self.at(x1, y1) - self.at(x0, y1) - self.at(x1, y0) + self.at(x0, y0)) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::IntegralImage;
    use crate::ImageView;

    #[test]
    fn box_sum_matches_direct_sum() {
        let data: Vec<u8> = (0..30).map(|v| (v * 7 % 251) as u8).collect();
        let view = ImageView::from_slice(&data, 6, 5).unwrap();
        let integral = IntegralImage::new(view);

        let mut direct = 0.0f32;
        for y in 1..4 {
            for x in 2..5 {
                direct += f32::from(data[y * 6 + x]);
            }
        }
        assert_eq!(integral.box_sum(2, 1, 5, 4), direct);
        let total: f32 = data.iter().map(|&v| f32::from(v)).sum();
        assert_eq!(integral.box_sum(0, 0, 6, 5), total);
    }

    #[test]
    fn box_sum_clamps_to_image() {
        let data = [10u8; 16];
        let view = ImageView::from_slice(&data, 4, 4).unwrap();
        let integral = IntegralImage::new(view);
        assert_eq!(integral.box_sum(-3, -3, 2, 2), 40.0);
        assert_eq!(integral.box_sum(5, 5, 9, 9), 0.0);
    }

    #[test]
    fn strided_views_ignore_padding() {
        let data = [1u8, 1, 99, 1, 1, 99];
        let view = ImageView::new(&data, 2, 2, 3).unwrap();
        let integral = IntegralImage::new(view);
        assert_eq!(integral.box_sum(0, 0, 2, 2), 4.0);
    }
}
