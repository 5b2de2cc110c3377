use briny_saliency::explain::rescale;
use briny_saliency::image::{Image, ModelInput};
use briny_saliency::tensors::{Tensor, WithGrad};
use briny_saliency::Error;

fn gradient_image() -> Image {
    let pixels: Vec<u8> = (0..48).map(|v| 10 + 4 * v as u8).collect();
    Image::from_u8([1, 4, 4, 3], &pixels).unwrap()
}

/// Normalizes to `[0, 1]` and moves channels first, like a typical model transform.
fn to_chw(image: &Image) -> briny_saliency::Result<ModelInput> {
    let normalized = image.as_array().map(|&v| f64::from(v) / 255.0 - 0.5);
    Ok(normalized.permute(&[0, 3, 1, 2])?.into())
}

#[test]
fn test_rescale_without_preprocess_is_identity() {
    let image = gradient_image();
    let out = rescale(None, &image).unwrap();
    assert_eq!(out, image);
    assert_eq!(out.shape(), image.shape());
}

#[test]
fn test_rescale_restores_raw_range() {
    let image = gradient_image();
    let out = rescale(Some(&to_chw), &image).unwrap();

    assert_eq!(out.shape(), &[1, 4, 4, 3]);
    let (raw, restored) = (image.as_array(), out.as_array());
    assert!((restored.min() - raw.min()).abs() <= 1.0);
    assert!((restored.max() - raw.max()).abs() <= 1.0);
    assert!(restored.data.iter().all(|v| v.fract() == 0.0));
}

#[test]
fn test_rescale_keeps_pixel_positions() {
    let image = gradient_image();
    let out = rescale(Some(&to_chw), &image).unwrap();

    // the affine map is increasing, so pixel order survives the round trip
    let restored = &out.as_array().data;
    assert!(restored.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_rescale_grayscale_tracked_tensor() {
    let pixels: Vec<u8> = vec![0, 64, 128, 255];
    let image = Image::from_u8([1, 2, 2, 1], &pixels).unwrap();
    let preprocess = |img: &Image| -> briny_saliency::Result<ModelInput> {
        let scaled = img.as_array().map(|&v| v * 2.0 - 100.0);
        Ok(WithGrad::new(scaled).into())
    };

    let out = rescale(Some(&preprocess), &image).unwrap();
    assert_eq!(out.shape(), &[1, 2, 2, 1]);
    assert_eq!(out.as_array().data[0], 0.0);
    assert!((out.as_array().data[3] - 255.0).abs() <= 1.0);
}

#[test]
fn test_rescale_rejects_batches() {
    let image = Image::from_u8([2, 2, 2, 1], &[0; 8]).unwrap();
    assert!(matches!(rescale(None, &image), Err(Error::InvalidImage(_))));
    assert!(matches!(
        rescale(Some(&to_chw), &image),
        Err(Error::InvalidImage(_))
    ));
}

#[test]
fn test_rescale_constant_input_stays_finite() {
    let image = Image::from_u8([1, 2, 2, 1], &[7; 4]).unwrap();
    let preprocess =
        |img: &Image| -> briny_saliency::Result<ModelInput> { Ok(img.to_array().into()) };

    let out = rescale(Some(&preprocess), &image).unwrap();
    assert!(out.as_array().data.iter().all(|&v| v == 7.0));
}

#[test]
fn test_image_layouts() {
    // unbatched grayscale gets a batch and a channel axis
    let gray = Image::new(Tensor::zeros(vec![3, 5]), false, true).unwrap();
    assert_eq!(gray.shape(), &[1, 3, 5, 1]);

    // channel-first batches are stored channel-last
    let chw = Tensor::new(vec![1, 2, 1, 2], vec![1.0, 2.0, 3.0, 4.0]);
    let image = Image::new(chw, true, false).unwrap();
    assert_eq!(image.shape(), &[1, 1, 2, 2]);
    assert_eq!(image.as_array().data, vec![1.0, 3.0, 2.0, 4.0]);

    assert!(matches!(
        Image::new(Tensor::zeros(vec![4]), true, true),
        Err(Error::InvalidImage(_))
    ));
    assert!(Image::new(Tensor::full(vec![1, 1, 1], f32::NAN), true, true).is_err());
}

#[test]
fn test_rescale_single_row_channel_first() {
    let pixels: Vec<u8> = (0..12).map(|v| 20 * v as u8).collect();
    let image = Image::from_u8([1, 1, 4, 3], &pixels).unwrap();

    let out = rescale(Some(&to_chw), &image).unwrap();
    assert_eq!(out.shape(), &[1, 1, 4, 3]);
    let restored = &out.as_array().data;
    assert!(restored.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_rescale_single_column_channel_last() {
    let pixels: Vec<u8> = (0..12).map(|v| 20 * v as u8).collect();
    let image = Image::from_u8([1, 4, 1, 3], &pixels).unwrap();
    let preprocess =
        |img: &Image| -> briny_saliency::Result<ModelInput> { Ok(img.to_array().into()) };

    let out = rescale(Some(&preprocess), &image).unwrap();
    assert_eq!(out.shape(), &[1, 4, 1, 3]);
}

#[test]
fn test_rescale_single_channel_first_grayscale() {
    let image = Image::from_u8([1, 2, 4, 1], &[0, 10, 20, 30, 40, 50, 60, 70]).unwrap();
    let preprocess = |img: &Image| -> briny_saliency::Result<ModelInput> {
        Ok(img.as_array().permute(&[0, 3, 1, 2])?.into())
    };

    let out = rescale(Some(&preprocess), &image).unwrap();
    assert_eq!(out.shape(), &[1, 2, 4, 1]);
}

#[test]
fn test_rescale_rejects_batched_preprocess_output() {
    let image = gradient_image();
    let duplicate = |img: &Image| -> briny_saliency::Result<ModelInput> {
        let mut data = img.as_array().data.clone();
        data.extend_from_slice(&img.as_array().data);
        Ok(Tensor::new(vec![2, 4, 4, 3], data).into())
    };

    assert!(matches!(
        rescale(Some(&duplicate), &image),
        Err(Error::InvalidImage(_))
    ));
}
