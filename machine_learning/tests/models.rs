use machine_learning::{
    Context, Device, MlErr,
    arch::{Sequential, layers::Layer},
    dataset::Batch,
    models::{Classifier, ConvNet, FullyConnected, FullyConnectedConfig, Network},
    optimization::Optimizer,
    training::fit_batch,
};
use ndarray::{Array2, ArrayD, IxDyn};
use rand::{Rng, SeedableRng, rngs::StdRng};

fn fc_config() -> FullyConnectedConfig {
    FullyConnectedConfig {
        input_size: 3 * 32 * 32,
        hidden: (100, 100),
        num_classes: 10,
        learning_rate: 1e-2,
        weight_decay: 1e-2,
    }
}

fn images(n: usize, seed: u64) -> ArrayD<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let values = (0..n * 3 * 32 * 32)
        .map(|_| rng.random_range(-2f32..2.))
        .collect();
    ArrayD::from_shape_vec(IxDyn(&[n, 3, 32, 32]), values).unwrap()
}

#[test]
fn fc_logits_on_zero_images() {
    let ctx = Context::default();
    let mut rng = StdRng::seed_from_u64(0);
    let mut model = FullyConnected::new(&ctx, fc_config(), &mut rng).unwrap();

    let x = ArrayD::zeros(IxDyn(&[64, 3, 32, 32]));
    let logits = model.forward(&ctx, x.view()).unwrap();

    assert_eq!(logits.dim(), (64, 10));
    assert!(logits.iter().all(|l| l.is_finite()));
}

#[test]
fn fc_biases_start_at_zero() {
    let ctx = Context::default();
    let mut rng = StdRng::seed_from_u64(0);
    let mut model = FullyConnected::new(&ctx, fc_config(), &mut rng).unwrap();

    // With zero biases a zero input maps to zero logits.
    let logits = model
        .forward(&ctx, ArrayD::zeros(IxDyn(&[2, 3072])).view())
        .unwrap();
    assert!(logits.iter().all(|&l| l == 0.));
}

#[test]
fn fc_rejects_invalid_configs() {
    let ctx = Context::default();
    let mut rng = StdRng::seed_from_u64(0);

    let config = FullyConnectedConfig {
        hidden: (0, 100),
        ..fc_config()
    };
    assert!(matches!(
        FullyConnected::new(&ctx, config, &mut rng),
        Err(MlErr::InvalidConfig(_))
    ));

    let config = FullyConnectedConfig {
        learning_rate: -1.,
        ..fc_config()
    };
    assert!(FullyConnected::new(&ctx, config, &mut rng).is_err());

    let config = FullyConnectedConfig {
        weight_decay: f32::NAN,
        ..fc_config()
    };
    assert!(FullyConnected::new(&ctx, config, &mut rng).is_err());
}

#[test]
fn constructors_configure_the_optimizer() {
    let ctx = Context::default();
    let mut rng = StdRng::seed_from_u64(0);
    let model = FullyConnected::new(&ctx, fc_config(), &mut rng).unwrap();
    assert_eq!(model.config(), fc_config());

    let net = model.network();
    let adam = net.optimizer().unwrap();
    assert_eq!((net.learning_rate(), net.weight_decay()), (1e-2, 1e-2));
    assert_eq!(
        (adam.learning_rate(), adam.weight_decay()),
        (net.learning_rate(), net.weight_decay())
    );
    assert_eq!(adam.size(), net.size());
}

#[test]
fn backward_needs_the_latest_forward_to_be_tracked() {
    let ctx = Context::default();
    let mut rng = StdRng::seed_from_u64(9);
    let config = FullyConnectedConfig {
        input_size: 4,
        hidden: (3, 3),
        num_classes: 2,
        ..fc_config()
    };
    let mut model = FullyConnected::new(&ctx, config, &mut rng).unwrap();

    let tracked = Array2::ones((2, 4)).into_dyn();
    let inference = Array2::zeros((2, 4)).into_dyn();
    model.forward(&ctx, tracked.view()).unwrap();
    let logits = model.forward(&ctx.no_grad(), inference.view()).unwrap();

    assert!(matches!(
        model.backward(&ctx, logits.view(), &[0, 1]),
        Err(MlErr::MissingForwardCache { .. })
    ));

    // A new tracked pass makes backward usable again.
    let logits = model.forward(&ctx, tracked.view()).unwrap();
    model.backward(&ctx, logits.view(), &[0, 1]).unwrap();
}

#[test]
fn predict_is_in_range_and_idempotent() {
    let ctx = Context::default();
    let mut rng = StdRng::seed_from_u64(1);
    let mut model = FullyConnected::new(&ctx, fc_config(), &mut rng).unwrap();
    let x = images(16, 2);

    let first = model.predict(&ctx, x.view()).unwrap();
    let second = model.predict(&ctx, x.view()).unwrap();

    assert_eq!(first.len(), 16);
    assert!(first.iter().all(|&c| c < 10));
    assert_eq!(first, second);
}

#[test]
fn loss_checks_labels() {
    let ctx = Context::default();
    let mut rng = StdRng::seed_from_u64(1);
    let mut model = FullyConnected::new(&ctx, fc_config(), &mut rng).unwrap();
    let logits = model.forward(&ctx, images(2, 3).view()).unwrap();

    assert!(model.loss(logits.view(), &[0, 9]).unwrap() >= 0.);
    assert!(matches!(
        model.loss(logits.view(), &[0, 10]),
        Err(MlErr::LabelOutOfRange { label: 10, .. })
    ));
    assert!(matches!(
        model.loss(logits.view(), &[0]),
        Err(MlErr::SizeMismatch { .. })
    ));
}

#[test]
fn contexts_must_target_the_model_device() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut model =
        FullyConnected::new(&Context::new(Device::Cpu), fc_config(), &mut rng).unwrap();

    let err = model.forward(&Context::new(Device::Parallel), images(1, 4).view());
    assert!(matches!(
        err,
        Err(MlErr::DeviceMismatch {
            model: Device::Cpu,
            context: Device::Parallel
        })
    ));
}

struct Bare(Network);

impl Classifier for Bare {
    fn network(&self) -> &Network {
        &self.0
    }

    fn network_mut(&mut self) -> &mut Network {
        &mut self.0
    }
}

#[test]
fn step_requires_a_configured_optimizer() {
    let ctx = Context::default();
    let mut rng = StdRng::seed_from_u64(5);
    let mut seq = Sequential::new([Layer::dense((4, 3), None)]);
    seq.init_default(&mut rng).unwrap();

    let mut model = Bare(Network::new(&ctx, seq, 3, 0.1, 0.).unwrap());
    let batch = Batch::new(Array2::ones((2, 4)).into_dyn(), vec![0, 2]).unwrap();

    assert!(matches!(
        fit_batch(&mut model, &ctx, &batch),
        Err(MlErr::OptimizerNotConfigured)
    ));

    model.configure_optimizer();
    let before = model.network().sequential().params().to_vec();
    fit_batch(&mut model, &ctx, &batch).unwrap();

    assert_ne!(model.network().sequential().params(), before.as_slice());
}

#[test]
fn reconfiguring_resets_the_optimizer() {
    let ctx = Context::default();
    let mut rng = StdRng::seed_from_u64(6);
    let config = FullyConnectedConfig {
        input_size: 4,
        hidden: (3, 3),
        num_classes: 2,
        ..fc_config()
    };

    let mut trained = FullyConnected::new(&ctx, config, &mut rng).unwrap();
    let mut fresh = trained.clone();
    let batch = Batch::new(Array2::ones((2, 4)).into_dyn(), vec![0, 1]).unwrap();
    fit_batch(&mut trained, &ctx, &batch).unwrap();

    assert_ne!(
        trained.network().sequential().params(),
        fresh.network().sequential().params()
    );

    // Reconfiguring resets the moments, so the same step from the same parameters matches.
    fresh.configure_optimizer();
    let mut again = fresh.clone();
    fit_batch(&mut fresh, &ctx, &batch).unwrap();
    fit_batch(&mut again, &ctx, &batch).unwrap();
    assert_eq!(
        fresh.network().sequential().params(),
        again.network().sequential().params()
    );
}

#[test]
fn conv_net_architecture() {
    let ctx = Context::default();
    let model = ConvNet::new(&ctx, 1e-3, 1e-4, &mut StdRng::seed_from_u64(10)).unwrap();
    assert_eq!(model.network().size(), 5_852_234);

    let layers = model.network().sequential().layers();
    let kinds: String = layers
        .iter()
        .map(|layer| match layer {
            Layer::Conv2d(_) => 'c',
            Layer::MaxPool2d(_) => 'p',
            Layer::BatchNorm2d(_) => 'b',
            Layer::Flatten(_) => 'f',
            Layer::Dense(_) => 'd',
        })
        .collect();
    assert_eq!(kinds, "ccpbccpbccpbfddd");

    let convs: Vec<_> = layers
        .iter()
        .filter_map(|layer| match layer {
            Layer::Conv2d(conv) => Some(conv.spec()),
            _ => None,
        })
        .collect();
    let widths: Vec<_> = convs
        .iter()
        .map(|spec| (spec.in_channels, spec.out_channels))
        .collect();
    assert_eq!(
        widths,
        [(3, 32), (32, 64), (64, 128), (128, 128), (128, 256), (256, 256)]
    );
    assert!(
        convs
            .iter()
            .all(|spec| (spec.kernel, spec.stride, spec.padding) == (3, 1, 1))
    );

    let pools: Vec<_> = layers
        .iter()
        .filter_map(|layer| match layer {
            Layer::MaxPool2d(pool) => Some(pool.kernel()),
            _ => None,
        })
        .collect();
    assert_eq!(pools, [2, 2, 2]);

    let norms: Vec<_> = layers
        .iter()
        .filter_map(|layer| match layer {
            Layer::BatchNorm2d(bn) => Some(bn.running_mean().len()),
            _ => None,
        })
        .collect();
    assert_eq!(norms, [64, 128, 256]);

    let head: Vec<_> = layers
        .iter()
        .filter_map(|layer| match layer {
            Layer::Dense(dense) => Some(dense.dim()),
            _ => None,
        })
        .collect();
    assert_eq!(head, [(4096, 1024), (1024, 512), (512, 10)]);
}

#[test]
fn conv_net_forward_and_step() {
    let ctx = Context::new(Device::Parallel);
    let mut rng = StdRng::seed_from_u64(7);
    let mut model = ConvNet::new(&ctx, 1e-3, 1e-4, &mut rng).unwrap();

    let x = images(2, 8);
    let logits = model.forward(&ctx.no_grad(), x.view()).unwrap();
    assert_eq!(logits.dim(), (2, ConvNet::NUM_CLASSES));
    assert!(logits.iter().all(|l| l.is_finite()));

    // Inference leaves the batch normalization statistics alone.
    let running_means = |model: &ConvNet| -> Vec<f32> {
        model
            .network()
            .sequential()
            .layers()
            .iter()
            .filter_map(|layer| match layer {
                Layer::BatchNorm2d(bn) => Some(bn.running_mean().to_vec()),
                _ => None,
            })
            .flatten()
            .collect()
    };
    assert!(running_means(&model).iter().all(|&m| m == 0.));

    let before = model.network().sequential().params().to_vec();
    let batch = Batch::new(x, vec![3, 7]).unwrap();
    let loss = fit_batch(&mut model, &ctx, &batch).unwrap();

    assert!(loss.is_finite() && loss > 0.);
    assert_ne!(model.network().sequential().params(), before.as_slice());
    assert!(running_means(&model).iter().any(|&m| m != 0.));
}
