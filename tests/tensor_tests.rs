use briny_saliency::approx::{ApproxEquality, approx_eq, approx_within};
use briny_saliency::tensor;
use briny_saliency::tensors::*;
use briny_saliency::Error;

#[test]
fn test_tensor_shape_mismatch_panics() {
    let result = std::panic::catch_unwind(|| {
        Tensor::new(vec![2, 2], vec![1.0, 2.0, 3.0]);
    });
    assert!(result.is_err());
}

#[test]
fn test_try_new_rejects_mismatch() {
    let err = Tensor::try_new(vec![2, 2], vec![1.0f32, 2.0, 3.0]).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let ok = Tensor::try_new(vec![3], vec![1.0f32, 2.0, 3.0]).unwrap();
    assert_eq!(ok.shape, vec![3]);
}

#[test]
fn test_tensor_macro_negative_literals() {
    let t = tensor!([[1.0, -2.0], [-3.0, 4.0]]);
    assert_eq!(t.shape, vec![2, 2]);
    assert_eq!(t.data, vec![1.0, -2.0, -3.0, 4.0]);

    let deep = tensor!([[[1.0], [2.0]]]);
    assert_eq!(deep.shape, vec![1, 2, 1]);
}

#[test]
fn test_permute_channels_first_to_last() {
    // 1×2×1×2 (N×C×H×W): channel 0 = [1, 2], channel 1 = [3, 4]
    let nchw = Tensor::new(vec![1, 2, 1, 2], vec![1.0, 2.0, 3.0, 4.0]);
    let nhwc = nchw.permute(&[0, 2, 3, 1]).unwrap();
    assert_eq!(nhwc.shape, vec![1, 1, 2, 2]);
    assert_eq!(nhwc.data, vec![1.0, 3.0, 2.0, 4.0]);

    let back = nhwc.permute(&[0, 3, 1, 2]).unwrap();
    assert_eq!(back, nchw);
}

#[test]
fn test_permute_rejects_bad_axes() {
    let t = Tensor::new(vec![2, 3], vec![0.0f32; 6]);
    assert!(t.permute(&[0, 0]).is_err());
    assert!(t.permute(&[0, 2]).is_err());
    assert!(t.permute(&[0]).is_err());
}

#[test]
fn test_squeeze_and_reshape() {
    let t = Tensor::new(vec![1, 3, 1, 2], vec![0.0f32; 6]).squeeze();
    assert_eq!(t.shape, vec![3, 2]);

    let t = t.reshape(vec![6]).unwrap();
    assert_eq!(t.shape, vec![6]);
    assert!(matches!(t.reshape(vec![4]), Err(Error::Shape(_))));
}

#[test]
fn test_min_max_argmax() {
    let t = tensor!([[0.5, 2.0, 2.0], [-1.0, -3.0, -0.5]]);
    assert_eq!(t.min(), -3.0);
    assert_eq!(t.max(), 2.0);
    // ties go to the first index
    assert_eq!(t.argmax_last_axis().unwrap(), vec![1, 2]);

    let empty = Tensor::new(vec![2, 0], Vec::<f32>::new());
    assert!(empty.argmax_last_axis().is_err());
}

#[test]
fn test_add_assign_and_scale() {
    let mut total = Tensor::zeros(vec![2]);
    total.add_assign(&tensor!([1.0, 2.0])).unwrap();
    total.add_assign(&tensor!([3.0, 4.0])).unwrap();
    assert_eq!(total.scale(0.5).data, vec![2.0, 3.0]);

    let mut total = Tensor::zeros(vec![2]);
    assert!(total.add_assign(&tensor!([1.0, 2.0, 3.0])).is_err());
}

#[test]
fn test_with_grad_starts_at_zero() {
    let x = WithGrad::new(tensor!([1.0, 2.0]));
    assert_eq!(x.grad.data, vec![0.0, 0.0]);
    assert_eq!(x.detach().data, vec![1.0, 2.0]);
}

#[test]
fn test_to_f32_narrows() {
    let t = Tensor::new(vec![2], vec![0.25f64, -1.5]);
    assert_eq!(t.to_f32().data, vec![0.25f32, -1.5]);
}

#[test]
fn test_approx_grades() {
    assert!(approx_eq(&1.0f32, &1.0f32));
    assert!(!approx_eq(&1.0f32, &1.01f32));
    assert!(approx_within(&1.0f32, &1.0005f32, ApproxEquality::Relative));
    assert!(!approx_within(&1.0f32, &1.1f32, ApproxEquality::Relative));

    let a = tensor!([1.0, 2.0]);
    let b = tensor!([1.0, 2.0000001]);
    assert!(approx_within(&a, &b, ApproxEquality::Partial));
    assert!(!approx_within(&a, &tensor!([[1.0, 2.0]]), ApproxEquality::Relative));
}
