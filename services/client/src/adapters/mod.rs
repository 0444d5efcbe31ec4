pub mod auth;
pub mod backend;
pub mod credentials;
pub mod rest;
pub mod wire;

pub use auth::HttpAuthAdapter;
pub use backend::HttpBackend;
pub use credentials::FileCredentialStore;
pub use rest::RestClient;
