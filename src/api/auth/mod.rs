pub mod refresh;
pub mod token;

pub use refresh::{RefreshTokenProvider, GOOGLE_TOKEN_URL};
pub use token::{
    ChainTokenProvider, Credential, EnvTokenProvider, StaticTokenProvider, TokenProvider,
};
