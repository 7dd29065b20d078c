pub mod detection;
pub mod embedding;
pub mod face_detector;
pub mod face_embedder;
pub mod perception_request;
