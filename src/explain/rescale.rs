use crate::error::{Error, Result};
use crate::image::{Image, Preprocess};
use crate::tensors::Tensor;

/// Keeps the affine map finite when the processed array is constant.
const EPSILON: f64 = 1e-8;

/// Maps a preprocessed image back onto the raw image's value range.
///
/// The preprocessed array loses its batch axis and is moved to channel-last
/// when its leading axis holds 3 channels (a leading single channel is
/// dropped). It is then stretched affinely so its `[min, max]` lands on the
/// raw image's `[min, max]`. Values are truncated to whole pixel levels.
/// Without a preprocessing function the image is returned unchanged.
///
/// Spatial axes of length 1 are kept, so one-pixel-high or -wide images keep
/// their layout.
///
/// # Errors
/// - [`Error::InvalidImage`] if `image` holds more than one instance, or the
///   preprocessed array holds more than one.
/// - Any error raised by `preprocess`.
///
/// # Example
/// ```rust
/// use briny_saliency::explain::rescale;
/// use briny_saliency::image::Image;
///
/// let image = Image::from_u8(vec![1, 2, 2, 1], &[0, 50, 100, 200]).unwrap();
/// assert_eq!(rescale(None, &image).unwrap(), image);
/// ```
pub fn rescale(preprocess: Option<&Preprocess<'_>>, image: &Image) -> Result<Image> {
    if image.len() != 1 {
        return Err(Error::InvalidImage(format!(
            "`image` can contain one instance only, got {}",
            image.len()
        )));
    }
    let Some(preprocess) = preprocess else {
        return Ok(image.clone());
    };

    let raw = image.as_array();
    let processed = channel_last(preprocess(image)?.into_array())?;

    let (min_a, max_a) = (f64::from(raw.min()), f64::from(raw.max()));
    let (min_b, max_b) = (f64::from(processed.min()), f64::from(processed.max()));
    let ratio = (max_a - min_a) / (max_b - min_b + EPSILON);

    #[allow(clippy::cast_possible_truncation)]
    let pixels = processed.map(|&v| (ratio * f64::from(v) + min_a - ratio * min_b).trunc() as f32);
    Image::new(pixels, false, true)
}

/// Drops the batch axis and reorders a `C×H×W` array to `H×W×C`.
///
/// A rank-3 array is read as channel-first when its leading axis is 3, or
/// when it is 1 and the trailing axis does not look like a channel axis.
fn channel_last(mut array: Tensor<f32>) -> Result<Tensor<f32>> {
    if array.rank() == 4 {
        if array.shape[0] != 1 {
            return Err(Error::InvalidImage(format!(
                "preprocessed input must hold one instance, got shape {:?}",
                array.shape
            )));
        }
        array.shape.remove(0);
    }

    if array.rank() == 3 {
        match (array.shape[0], array.shape[2]) {
            (3, _) => return array.permute(&[1, 2, 0]),
            (1, trailing) if trailing != 1 && trailing != 3 => {
                array.shape.remove(0);
            }
            _ => {}
        }
    }
    Ok(array)
}
