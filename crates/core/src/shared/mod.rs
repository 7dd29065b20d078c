pub mod constants;
pub mod frame;
pub mod model_resolver;
pub mod region;
pub mod settings;
pub mod shutdown;
pub mod store_error;
