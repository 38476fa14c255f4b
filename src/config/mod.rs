pub mod params;
pub mod schema;

pub use params::Params;
pub use schema::{
    AvatarConfig, BrowserConfig, CommentsConfig, Config, Credentials, LoginConfig, OnFailure,
    OutputConfig, TargetUrl, Viewport,
};
