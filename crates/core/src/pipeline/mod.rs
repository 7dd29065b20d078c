pub mod frame_processor;
pub mod recognition_loop;
pub mod recognition_stats;
