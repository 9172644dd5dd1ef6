pub mod google;
pub mod pkce;
pub mod state;

pub use google::{GoogleOAuthClient, GoogleOAuthConfig};
pub use state::OAuthStateStore;
