use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tensorflow::{Graph, ImportGraphDefOptions, Session, SessionOptions, SessionRunArgs, Tensor};

use super::{resolve_model_path, Model, ModelSource};
use crate::error::ModelError;
use crate::preprocess::ImageTensor;

/// Frozen TensorFlow graph with one image input and one softmax output.
pub struct FrozenGraphModel {
    session: Session,
    graph: Graph,
    input_op: String,
    output_op: String,
}

impl FrozenGraphModel {
    pub fn new(model_path: &Path, input_op: &str, output_op: &str) -> Result<Self, ModelError> {
        let mut graph = Graph::new();
        let mut model_file = File::open(model_path).map_err(|e| ModelError::Load(e.to_string()))?;
        let mut model_bytes = Vec::new();
        model_file
            .read_to_end(&mut model_bytes)
            .map_err(|e| ModelError::Load(e.to_string()))?;

        graph
            .import_graph_def(&model_bytes, &ImportGraphDefOptions::new())
            .map_err(|e| ModelError::Load(e.to_string()))?;

        let session = Session::new(&SessionOptions::new(), &graph)
            .map_err(|e| ModelError::Load(e.to_string()))?;

        Ok(FrozenGraphModel {
            session,
            graph,
            input_op: input_op.to_string(),
            output_op: output_op.to_string(),
        })
    }

    fn operation(&self, name: &str) -> Result<tensorflow::Operation, ModelError> {
        self.graph
            .operation_by_name(name)
            .map_err(|e| {
                ModelError::Inference(format!("Failed to retrieve operation '{name}': {e}"))
            })?
            .ok_or_else(|| ModelError::Inference(format!("Operation '{name}' not found in graph")))
    }
}

impl Model for FrozenGraphModel {
    fn predict(&self, input: &ImageTensor) -> Result<Vec<f32>, ModelError> {
        let dims: Vec<u64> = input.shape().iter().map(|&d| d as u64).collect();
        let mut input_tensor = Tensor::<f32>::new(&dims);
        input_tensor.copy_from_slice(&input.data);

        let input_operation = self.operation(&self.input_op)?;
        let output_operation = self.operation(&self.output_op)?;

        let mut args = SessionRunArgs::new();
        args.add_feed(&input_operation, 0, &input_tensor);
        let output_token = args.request_fetch(&output_operation, 0);
        self.session
            .run(&mut args)
            .map_err(|e| ModelError::Inference(e.to_string()))?;

        let output_tensor: Tensor<f32> = args
            .fetch(output_token)
            .map_err(|e| ModelError::Inference(e.to_string()))?;

        Ok(output_tensor.to_vec())
    }
}

/// Loads a [`FrozenGraphModel`] from the first candidate path that exists.
pub struct FrozenGraphSource {
    pub candidates: Vec<PathBuf>,
    pub input_op: String,
    pub output_op: String,
}

impl ModelSource for FrozenGraphSource {
    fn load(&self) -> Result<Arc<dyn Model>, ModelError> {
        let model_path = resolve_model_path(&self.candidates)?;
        tracing::debug!("Reading frozen graph from {}", model_path.display());

        let model = FrozenGraphModel::new(&model_path, &self.input_op, &self.output_op)?;
        Ok(Arc::new(model))
    }
}
