pub mod drift;
pub mod generated;
pub mod kubeconfig;
pub mod network;
pub mod resolve;
pub mod select;

pub use drift::DriftDetector;
pub use generated::GeneratedFile;
pub use kubeconfig::KubeconfigFile;
pub use resolve::ContextResolver;
pub use select::ContextSelector;
