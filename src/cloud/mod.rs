pub mod callback;
pub mod exchange;
pub mod login;
pub mod provider;
pub mod spaces;
pub mod store;
pub mod token;

pub use exchange::HttpTokenExchanger;
pub use login::{LoginOrchestrator, SystemBrowser};
pub use provider::{FileProviderRepository, ProviderRepository};
pub use spaces::GraphqlSpacesApi;
pub use store::TokenStore;
