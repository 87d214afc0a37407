mod env_utils;
mod id_generator;

pub use env_utils::EnvUtils;
pub use id_generator::IdGenerator;
