pub mod execution_provider;
pub mod model_locator;
pub mod onnx_yolo_detector;
