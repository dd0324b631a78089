//! Bridges `image` pixel buffers to the overlapping-model core, which
//! works on pre-parsed grids of packed 24-bit colors.

use coord_2d::{Coord, Size};
use grid_2d::Grid;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use rand::Rng;
use wfc_overlap::overlapping::{Options, Overlapping};
use wfc_overlap::ConfigError;

pub mod retry {
    pub use wfc_overlap::retry::{Forever, NumTimes, Retry};
    pub use wfc_overlap::SolveError;

    use image::DynamicImage;

    pub trait ImageRetry: Retry {
        type ImageReturn;
        #[doc(hidden)]
        fn image_return(r: Self::Return) -> Self::ImageReturn;
    }

    impl ImageRetry for Forever {
        type ImageReturn = DynamicImage;
        fn image_return(r: Self::Return) -> Self::ImageReturn {
            super::image_from_grid(&r)
        }
    }

    impl ImageRetry for NumTimes {
        type ImageReturn = Result<DynamicImage, SolveError>;
        fn image_return(r: Self::Return) -> Self::ImageReturn {
            r.map(|grid| super::image_from_grid(&grid))
        }
    }
}

/// Packs each pixel as `(r << 16) | (g << 8) | b`.
pub fn grid_from_image(image: &DynamicImage) -> Grid<u32> {
    let rgb_image = image.to_rgb8();
    let size = Size::new(rgb_image.width(), rgb_image.height());
    Grid::new_fn(size, |Coord { x, y }| {
        let Rgb([r, g, b]) = *rgb_image.get_pixel(x as u32, y as u32);
        (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
    })
}

pub fn image_from_grid(grid: &Grid<[u8; 3]>) -> DynamicImage {
    let size = grid.size();
    let mut rgb_image = RgbImage::new(size.width(), size.height());
    for (Coord { x, y }, &pixel) in grid.enumerate() {
        rgb_image.put_pixel(x as u32, y as u32, Rgb(pixel));
    }
    DynamicImage::ImageRgb8(rgb_image)
}

pub fn generate_image_with_rng<IR, R>(
    image: &DynamicImage,
    options: Options,
    mut retry: IR,
    rng: &mut R,
) -> Result<IR::ImageReturn, ConfigError>
where
    IR: retry::ImageRetry,
    R: Rng,
{
    let grid = grid_from_image(image);
    let session = Overlapping::new(options, &grid)?;
    Ok(IR::image_return(retry.retry(&session, rng)))
}

pub fn generate_image<IR>(
    image: &DynamicImage,
    options: Options,
    retry: IR,
) -> Result<IR::ImageReturn, ConfigError>
where
    IR: retry::ImageRetry,
{
    generate_image_with_rng(image, options, retry, &mut rand::thread_rng())
}

/// Options matching `image`, with the input dimensions filled in from it.
pub fn options_for_image(image: &DynamicImage, options: Options) -> Options {
    Options {
        input_size: Size::new(image.width(), image.height()),
        ..options
    }
}
