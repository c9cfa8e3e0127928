//! GitHub repository tools backed by the REST v3 API.

mod client;
pub mod tools;

pub use client::{GITHUB_API_URL, GithubClient};
pub use tools::github_tools;
