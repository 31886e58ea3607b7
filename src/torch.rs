//! Code for loading and running the trained TorchScript models

use crate::config::{INPUT_CHANNELS, INPUT_SIZE};
use crate::preprocess::InputTensor;
use anyhow::{anyhow, Context, Result};
use std::sync::Mutex;
use tch::{no_grad, CModule, Device, Tensor};
use tracing::{error, info};

/// A model that maps one input tensor to one scalar. The regression model
/// predicts days until hatch; the classifier returns the probability that the
/// image contains prawn eggs.
pub trait ScalarModel: Send + Sync {
    fn predict(&self, input: &InputTensor) -> Result<f32>;
}

/// A model that may or may not have loaded at startup
#[derive(Debug)]
pub enum ModelSlot<M> {
    Available(M),
    Unavailable,
}

impl<M> ModelSlot<M> {
    pub fn is_available(&self) -> bool {
        matches!(self, ModelSlot::Available(_))
    }
}

/// Load and run a TorchScript file
#[derive(Debug)]
pub struct TorchModel {
    /// The loaded torch model. Forward calls on one module are serialized.
    model: Mutex<CModule>,
    device: Device,
}

impl TorchModel {
    pub fn new(filename: &str) -> Result<Self> {
        let device = Device::cuda_if_available();
        let mut model = CModule::load_on_device(filename, device)
            .with_context(|| format!("failed to load TorchScript model {filename}"))?;
        model.set_eval();
        Ok(TorchModel {
            model: Mutex::new(model),
            device,
        })
    }
}

impl ScalarModel for TorchModel {
    #[tracing::instrument(skip_all)]
    fn predict(&self, input: &InputTensor) -> Result<f32> {
        let data = input
            .as_slice()
            .ok_or_else(|| anyhow!("input tensor is not contiguous"))?;
        let side = INPUT_SIZE as i64;
        let input = Tensor::f_from_slice(data)?
            .f_reshape([1, side, side, INPUT_CHANNELS as i64])?
            .to_device(self.device);

        let model = self
            .model
            .lock()
            .map_err(|_| anyhow!("model lock poisoned by an earlier panic"))?;
        let output = no_grad(|| model.forward_ts(&[input]))?;

        // Both models emit a single value: [[x]]
        let value = output.f_view([-1])?.f_double_value(&[0])?;
        Ok(value as f32)
    }
}

/// Load the days-until-hatch regression model. Never fails: a missing or
/// broken file leaves the slot empty and predictions fall back to a
/// placeholder.
pub fn load_regression_model(path: &str) -> ModelSlot<Box<dyn ScalarModel>> {
    load(path, "regression")
}

/// Load the egg/no-egg classifier. When absent the subject gate always passes.
pub fn load_classifier_model(path: &str) -> ModelSlot<Box<dyn ScalarModel>> {
    load(path, "classifier")
}

fn load(path: &str, kind: &str) -> ModelSlot<Box<dyn ScalarModel>> {
    match TorchModel::new(path) {
        Ok(model) => {
            info!("{kind} model loaded from {path}");
            ModelSlot::Available(Box::new(model))
        }
        Err(e) => {
            error!("error loading {kind} model: {e:#}");
            ModelSlot::Unavailable
        }
    }
}
