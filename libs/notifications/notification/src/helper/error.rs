use super::broker::BrokerError;
use thiserror::Error;

/// Error that can occur while starting or stopping the notification helper.
#[derive(Debug, Error)]
pub enum HelperError {
    /// The broker could not be reached.
    #[error("connection to nats server at '{address}' failed")]
    Connection {
        address: String,
        #[source]
        source: BrokerError,
    },

    /// The notification stream could not be provisioned.
    #[error("nats stream creation failed")]
    Stream(#[source] BrokerError),

    /// The template bucket could not be provisioned.
    #[error("template store creation failed")]
    KeyValue(#[source] BrokerError),

    /// The template bucket could not be read.
    #[error("template store read failed")]
    TemplateLoad(#[source] BrokerError),

    /// The connection could not be drained.
    #[error("nats connection drain failed")]
    Drain(#[source] BrokerError),
}
