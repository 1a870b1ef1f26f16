//! # Messaging Module
//!
//! Everything between the delegation core and the message bus: the push
//! envelope codec, the publish facade with its backends, and the pgmq pull
//! consumer.

pub mod bus;
pub mod envelope;
pub mod pgmq_bus;
pub mod queue_consumer;

pub use bus::{publish_with_confirmation, InMemoryMessageBus, MessageBus, PublishedMessage};
pub use envelope::DecodedMessage;
pub use pgmq_bus::{queue_name_for_topic, PgmqMessageBus};
pub use queue_consumer::{disposition_for, ConsumerSettings, Disposition, QueueConsumer};
