use briny_saliency::backend::Framework;
use briny_saliency::backprop::*;
use briny_saliency::model::Model;
use briny_saliency::nn::{Layer, Sequential};
use briny_saliency::ops::cpu::Layout;
use briny_saliency::tensor;
use briny_saliency::tensors::Tensor;
use briny_saliency::Error;
use rand::SeedableRng;
use rand::rngs::StdRng;

#[test]
fn test_relu_backprop() {
    let input = Tensor::new(vec![3], vec![-1.0, 0.0, 2.0]);
    let (out, back) = relu(&input);
    assert_eq!(out.data, vec![0.0, 0.0, 2.0]);

    let grad_in = back(&Tensor::new(vec![3], vec![1.0, 1.0, 1.0])).unwrap();
    assert_eq!(grad_in.data, vec![0.0, 0.0, 1.0]);
}

#[test]
fn test_relu_backprop_long_input() {
    // longer than one SIMD lane group
    let input = Tensor::new(vec![11], (0..11).map(|i| i as f32 - 5.0).collect());
    let (out, back) = relu(&input);
    assert_eq!(out.data.iter().filter(|&&v| v > 0.0).count(), 5);

    let grad_in = back(&Tensor::full(vec![11], 2.0)).unwrap();
    let expected: Vec<f32> = (0..11).map(|i| if i > 5 { 2.0 } else { 0.0 }).collect();
    assert_eq!(grad_in.data, expected);
}

#[test]
fn test_relu_backprop_rejects_wrong_grad_shape() {
    let (_, back) = relu(&tensor!([1.0, 2.0]));
    assert!(matches!(back(&tensor!([1.0])), Err(Error::Shape(_))));
}

#[test]
fn test_guided_relu_rule() {
    let activation = tensor!([2.0, 0.0, 1.0, 3.0]);
    let grad = tensor!([1.0, 5.0, -2.0, 0.5]);
    let out = guided_relu(&activation, &grad).unwrap();
    assert_eq!(out.data, vec![1.0, 0.0, 0.0, 0.5]);
}

#[test]
fn test_linear_forward_backward() {
    let weight = tensor!([[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
    let bias = tensor!([0.5, -0.5]);
    let input = tensor!([[1.0, 0.0, -1.0], [1.0, 1.0, 1.0]]);

    let (out, back) = linear(&input, &weight, &bias).unwrap();
    assert_eq!(out.shape, vec![2, 2]);
    assert_eq!(out.data, vec![-3.5, -4.5, 9.5, 11.5]);

    let grad_in = back(&tensor!([[1.0, 0.0], [0.0, 1.0]])).unwrap();
    assert_eq!(grad_in.shape, vec![2, 3]);
    assert_eq!(grad_in.data, vec![1.0, 3.0, 5.0, 2.0, 4.0, 6.0]);
}

#[test]
fn test_linear_rejects_feature_mismatch() {
    let weight = tensor!([[1.0], [2.0]]);
    let bias = tensor!([0.0]);
    let result = linear(&tensor!([[1.0, 2.0, 3.0]]), &weight, &bias);
    assert!(matches!(result, Err(Error::Shape(_))));
}

#[test]
fn test_conv2d_counts_window_overlaps() {
    let weight = Tensor::full(vec![1, 1, 2, 2], 1.0);
    let bias = tensor!([0.0]);
    let input = Tensor::new(vec![1, 1, 3, 3], (1..=9).map(|v| v as f32).collect());

    for layout in [Layout::Nchw, Layout::Nhwc] {
        // with one channel both layouts share the same memory order
        let input = input.clone().reshape(match layout {
            Layout::Nchw => vec![1, 1, 3, 3],
            Layout::Nhwc => vec![1, 3, 3, 1],
        })
        .unwrap();

        let (out, back) = conv2d(&input, &weight, &bias, 0, layout).unwrap();
        assert_eq!(out.data, vec![12.0, 16.0, 24.0, 28.0]);

        let grad_in = back(&Tensor::full(out.shape.clone(), 1.0)).unwrap();
        assert_eq!(grad_in.shape, input.shape);
        assert_eq!(
            grad_in.data,
            vec![1.0, 2.0, 1.0, 2.0, 4.0, 2.0, 1.0, 2.0, 1.0]
        );
    }
}

#[test]
fn test_conv2d_layouts_agree() {
    let mut rng = StdRng::seed_from_u64(11);
    let Layer::Conv2d { weight, bias, .. } = Layer::conv2d_init(3, 2, 3, 1, &mut rng) else {
        unreachable!()
    };
    let nchw = Tensor::new(vec![2, 3, 4, 5], (0..120).map(|v| (v % 7) as f32 - 3.0).collect());
    let nhwc = nchw.permute(&[0, 2, 3, 1]).unwrap();

    let (out_first, back_first) = conv2d(&nchw, &weight, &bias, 1, Layout::Nchw).unwrap();
    let (out_last, back_last) = conv2d(&nhwc, &weight, &bias, 1, Layout::Nhwc).unwrap();
    assert_eq!(out_first.shape, vec![2, 2, 4, 5]);
    assert_eq!(out_first.permute(&[0, 2, 3, 1]).unwrap(), out_last);

    let grad_first = back_first(&Tensor::full(out_first.shape.clone(), 1.0)).unwrap();
    let grad_last = back_last(&Tensor::full(out_last.shape.clone(), 1.0)).unwrap();
    assert_eq!(grad_first.permute(&[0, 2, 3, 1]).unwrap(), grad_last);
}

#[test]
fn test_conv2d_kernel_too_large() {
    let weight = Tensor::full(vec![1, 1, 5, 5], 1.0);
    let bias = tensor!([0.0]);
    let result = conv2d(&Tensor::zeros(vec![1, 1, 3, 3]), &weight, &bias, 0, Layout::Nchw);
    assert!(matches!(result, Err(Error::Shape(_))));
}

#[test]
fn test_flatten_roundtrips_gradient_shape() {
    let input = Tensor::zeros(vec![2, 3, 4]);
    let (out, back) = flatten(&input).unwrap();
    assert_eq!(out.shape, vec![2, 12]);
    assert_eq!(back(&Tensor::zeros(vec![2, 12])).unwrap().shape, vec![2, 3, 4]);
}

#[test]
fn test_dropout_without_drop_is_identity() {
    let mut rng = StdRng::seed_from_u64(0);
    let input = tensor!([1.0, -2.0, 3.0]);
    let (out, back) = dropout(&input, 0.0, &mut rng);
    assert_eq!(out, input);
    assert_eq!(back(&tensor!([1.0, 1.0, 1.0])).unwrap().data, vec![1.0, 1.0, 1.0]);
}

#[test]
fn test_dropout_layer_bounds() {
    assert!(Layer::dropout(0.5).is_ok());
    assert!(Layer::dropout(1.0).is_err());
    assert!(Layer::dropout(-0.1).is_err());
}

#[test]
fn test_sequential_trace_backward() {
    let model = Sequential::new(
        Framework::ChannelsLast,
        vec![
            Layer::Flatten,
            Layer::linear(tensor!([[1.0, -1.0], [2.0, 1.0]]), tensor!([0.0, 0.0])).unwrap(),
            Layer::Relu,
        ],
    );
    let input = tensor!([[[[1.0], [1.0]]]]);
    let trace = model.trace(&input).unwrap();
    // hidden = [3, 0] after ReLU
    assert_eq!(trace.output.data, vec![3.0, 0.0]);

    let grad = trace.backward(&tensor!([[1.0, 1.0]])).unwrap();
    assert_eq!(grad.shape, input.shape);
    assert_eq!(grad.data, vec![1.0, 2.0]);
}

#[test]
fn test_trace_rejects_wrong_seed() {
    let model = Sequential::new(Framework::ChannelsLast, vec![Layer::Relu]);
    let trace = model.trace(&tensor!([[1.0, 2.0]])).unwrap();
    assert!(matches!(trace.backward(&tensor!([1.0])), Err(Error::Shape(_))));
}

#[test]
fn test_eval_disables_dropout() {
    let mut model = Sequential::new(
        Framework::ChannelsFirst,
        vec![Layer::dropout(0.9).unwrap()],
    );
    assert!(model.is_training());
    model.eval();
    assert!(!model.is_training());

    let input = Tensor::full(vec![1, 64], 1.0);
    assert_eq!(model.forward(&input).unwrap(), input);

    model.train();
    assert!(model.is_training());
}
