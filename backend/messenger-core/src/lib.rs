pub mod client;
pub mod config;
pub mod contract;
pub mod envelope;
pub mod error;
pub mod host;
pub mod store;
pub mod transport;

#[cfg(test)]
mod tests;

/// Channel carrying fire-and-forget envelopes from renderer to host.
pub const CLIENT_EVENT_CHANNEL: &str = "Messenger::Message::ClientEvent";
/// Channel carrying broadcast envelopes from host to renderer.
pub const SERVICE_RESPONSE_CHANNEL: &str = "Messenger::Message::ServiceResponse";
/// Prefix of every invoke handler channel.
pub const INVOKE_NAMESPACE: &str = "Messenger::Invoke::Ipc";
pub const CHANNEL_SEPARATOR: &str = "::";
pub const INVOKE_CHANNEL_PREFIX: &str =
    const_format::concatcp!(INVOKE_NAMESPACE, CHANNEL_SEPARATOR);
