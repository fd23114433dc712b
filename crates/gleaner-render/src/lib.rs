pub mod http;

#[cfg(feature = "browser")]
pub mod browser;

pub use http::HttpRenderer;

#[cfg(feature = "browser")]
pub use browser::BrowserRenderer;
