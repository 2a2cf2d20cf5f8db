use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use shared::ClassLabel;
use tch::nn::{self, ModuleT};
use tch::{Device, Kind, Tensor};

use super::network::{INPUT_SIZE, NUM_CLASSES, WasteNet};
use super::preprocess::preprocess;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Cannot decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Preprocessing error: {0}")]
    Preprocessing(String),
    #[error("Model error: {0}")]
    Model(#[from] tch::TchError),
    #[error("Weight file not found: {0}")]
    WeightsNotFound(String),
    #[error("Incompatible weights: {0}")]
    IncompatibleWeights(String),
    #[error("Unexpected model output: {0}")]
    UnexpectedOutput(String),
}

/// Classifier with its weights loaded once at startup.
///
/// After `load` returns the parameters are frozen and only read, so a single
/// instance is shared by every worker without locking.
pub struct Model {
    vs: nn::VarStore,
    net: WasteNet,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("device", &self.vs.device())
            .finish_non_exhaustive()
    }
}

impl Model {
    /// Builds the network and fills it from `weights_path`.
    ///
    /// Fails when the file is missing, when a parameter is absent or stored
    /// with another shape or dtype, or when a forward pass on a blank image
    /// does not yield one score per class.
    pub fn load(weights_path: &Path, device: Device) -> Result<Self, InferenceError> {
        if !weights_path.is_file() {
            return Err(InferenceError::WeightsNotFound(
                weights_path.display().to_string(),
            ));
        }

        let mut vs = nn::VarStore::new(device);
        let net = WasteNet::new(&vs.root());
        // load() copies in place, casting dtypes and broadcasting shapes
        let stored = read_checkpoint(weights_path)?;
        check_layout(&layout_of(vs.variables()), &layout_of(stored))?;
        vs.load(weights_path)?;

        let model = Self::from_var_store(vs, net)?;
        log::info!(
            "Loaded classifier weights from {} on {:?}",
            weights_path.display(),
            device
        );
        Ok(model)
    }

    fn from_var_store(mut vs: nn::VarStore, net: WasteNet) -> Result<Self, InferenceError> {
        vs.freeze();
        let model = Self { vs, net };
        model.check_output()?;
        Ok(model)
    }

    fn check_output(&self) -> Result<(), InferenceError> {
        let input = Tensor::zeros(
            [1, 3, INPUT_SIZE, INPUT_SIZE],
            (Kind::Float, self.vs.device()),
        );
        let scores = self.log_probabilities(&input)?;
        if scores.len() != NUM_CLASSES as usize {
            return Err(InferenceError::UnexpectedOutput(format!(
                "expected {} scores, got {}",
                NUM_CLASSES,
                scores.len()
            )));
        }
        Ok(())
    }

    pub fn classify(&self, image: &[u8]) -> Result<ClassLabel, InferenceError> {
        let scores = self.inference(image)?;
        let index = argmax(&scores)
            .ok_or_else(|| InferenceError::UnexpectedOutput("empty score vector".into()))?;
        ClassLabel::from_index(index).ok_or_else(|| {
            InferenceError::UnexpectedOutput(format!("class index {} out of range", index))
        })
    }

    /// Log-probabilities for each class, in `ClassLabel::ALL` order.
    pub fn inference(&self, image: &[u8]) -> Result<Vec<f32>, InferenceError> {
        let array = preprocess(image, INPUT_SIZE as u32)?;
        let data = array
            .as_slice()
            .ok_or_else(|| InferenceError::Preprocessing("tensor is not contiguous".into()))?;
        let tensor = Tensor::from_slice(data)
            .view([1, 3, INPUT_SIZE, INPUT_SIZE])
            .to_device(self.vs.device());
        self.log_probabilities(&tensor)
    }

    fn log_probabilities(&self, input: &Tensor) -> Result<Vec<f32>, InferenceError> {
        let output = tch::no_grad(|| self.net.forward_t(input, false));
        let output_vec: Vec<f32> = output
            .to_kind(Kind::Float)
            .to_device(Device::Cpu)
            .view([-1])
            .try_into()?;
        Ok(output_vec)
    }
}

type ParameterLayout = BTreeMap<String, (Vec<i64>, Kind)>;

fn read_checkpoint(path: &Path) -> Result<Vec<(String, Tensor)>, tch::TchError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("safetensors") => Tensor::read_safetensors(path),
        _ => Tensor::load_multi(path),
    }
}

fn layout_of(tensors: impl IntoIterator<Item = (String, Tensor)>) -> ParameterLayout {
    tensors
        .into_iter()
        .map(|(name, tensor)| {
            let layout = (tensor.size(), tensor.kind());
            (name, layout)
        })
        .collect()
}

fn check_layout(
    expected: &ParameterLayout,
    loaded: &ParameterLayout,
) -> Result<(), InferenceError> {
    for (name, (size, kind)) in expected {
        match loaded.get(name) {
            Some((loaded_size, loaded_kind)) if loaded_size == size && loaded_kind == kind => {}
            Some((loaded_size, loaded_kind)) => {
                return Err(InferenceError::IncompatibleWeights(format!(
                    "{} is {:?} {:?}, expected {:?} {:?}",
                    name, loaded_kind, loaded_size, kind, size
                )));
            }
            None => {
                return Err(InferenceError::IncompatibleWeights(format!(
                    "{} is missing",
                    name
                )));
            }
        }
    }
    Ok(())
}

/// Index of the largest score, with `torch.max` semantics: ties go to the
/// first index, and the first NaN wins over any number.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &score) in scores.iter().enumerate() {
        match best {
            Some((_, top)) if top.is_nan() || !(score > top || score.is_nan()) => {}
            _ => best = Some((index, score)),
        }
    }
    best.map(|(index, _)| index)
}

#[cfg(test)]
pub(crate) fn seeded_model(seed: i64) -> Model {
    tch::manual_seed(seed);
    let vs = nn::VarStore::new(Device::Cpu);
    let net = WasteNet::new(&vs.root());
    Model::from_var_store(vs, net).unwrap()
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32, seed: u8) -> Vec<u8> {
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x as u8).wrapping_mul(seed),
            (y as u8).wrapping_add(seed),
            ((x + y) as u8) ^ seed,
        ])
    });
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}
