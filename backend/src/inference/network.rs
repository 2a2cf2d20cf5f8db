use tch::nn::{self, ModuleT};
use tch::{Kind, Tensor};

/// Side length of the square input expected by the network.
pub const INPUT_SIZE: i64 = 224;
pub const NUM_CLASSES: i64 = 4;

// 224 -conv3-> 222 -pool2-> 111 -conv3-> 109 -pool2-> 54
const FLATTENED_FEATURES: i64 = 16 * 54 * 54;

/// Two conv/pool stages followed by four fully connected layers.
///
/// Variable names (`conv1.weight`, `fc4.bias`, ...) match the keys of the
/// exported checkpoint, so `VarStore::load` fills them directly.
#[derive(Debug)]
pub struct WasteNet {
    conv1: nn::Conv2D,
    conv2: nn::Conv2D,
    fc1: nn::Linear,
    fc2: nn::Linear,
    fc3: nn::Linear,
    fc4: nn::Linear,
}

impl WasteNet {
    pub fn new(p: &nn::Path) -> Self {
        // default ConvConfig: stride 1, no padding
        Self {
            conv1: nn::conv2d(p / "conv1", 3, 6, 3, Default::default()),
            conv2: nn::conv2d(p / "conv2", 6, 16, 3, Default::default()),
            fc1: nn::linear(p / "fc1", FLATTENED_FEATURES, 120, Default::default()),
            fc2: nn::linear(p / "fc2", 120, 84, Default::default()),
            fc3: nn::linear(p / "fc3", 84, 20, Default::default()),
            fc4: nn::linear(p / "fc4", 20, NUM_CLASSES, Default::default()),
        }
    }
}

impl ModuleT for WasteNet {
    /// Returns log-probabilities of shape `[batch, NUM_CLASSES]`.
    fn forward_t(&self, xs: &Tensor, _train: bool) -> Tensor {
        xs.apply(&self.conv1)
            .relu()
            .max_pool2d_default(2)
            .apply(&self.conv2)
            .relu()
            .max_pool2d_default(2)
            .view([-1, FLATTENED_FEATURES])
            .apply(&self.fc1)
            .relu()
            .apply(&self.fc2)
            .relu()
            .apply(&self.fc3)
            .relu()
            .apply(&self.fc4)
            .log_softmax(-1, Kind::Float)
    }
}
