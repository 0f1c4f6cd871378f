mod audio;
mod bark;
mod channel;
mod dispatcher;
mod target;
#[cfg(test)]
mod tests;

pub use audio::AudioChannel;
pub use bark::{build_client, build_push_url, BarkChannel};
pub use channel::NotificationChannel;
pub use dispatcher::{DispatchStats, NotificationDispatcher};
pub use target::{mask_key, DispatchOutcome, DispatchResult, DispatchTarget};
