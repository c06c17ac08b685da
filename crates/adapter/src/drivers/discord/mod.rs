mod driver;
mod handlers;

pub use driver::{DiscordConfig, DiscordDriver};
