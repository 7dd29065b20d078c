pub mod onnx_session;
pub mod filtered_face_detector;
pub mod onnx_face_detector;
pub mod onnx_face_embedder;
pub mod perception_worker;
