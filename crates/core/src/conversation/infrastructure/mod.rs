pub mod task_queue;
