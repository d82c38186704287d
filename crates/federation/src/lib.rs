//! `ActivityPub` federation for vitrine.
//!
//! This crate is the federation core of an image-first publishing server:
//!
//! - **Verification**: HTTP signatures, replay window, domain blocks
//! - **Resolution**: remote actors and statuses, cached by URI
//! - **Processing**: inbound Create, Delete, Follow, Accept, Reject, Undo,
//!   Like and Announce
//! - **Dispatch**: outbound activities queued per destination inbox
//! - **Jobs**: delivery, timeline fan-out, notifications
//!
//! Components take an explicit [`FederationContext`] and talk to storage
//! through the `vitrine-db` store traits and to the queue through
//! [`JobQueue`].

pub mod activities;
pub mod client;
pub mod context;
pub mod delivery;
pub mod dispatcher;
pub mod domain_gate;
pub mod executor;
pub mod fanout;
pub mod handler;
pub mod jobs;
pub mod notifications;
pub mod objects;
pub mod processor;
pub mod resolver;
pub mod signature;
pub mod test_utils;
pub mod verifier;

pub use activities::{Activity, ActivityError, ActivityType, ObjectRef};
pub use client::{ApClient, ApClientError, ApTransport};
pub use context::FederationContext;
pub use delivery::{DeliveryExecutor, DeliveryOutcome};
pub use dispatcher::{Dispatcher, group_by_shared_inbox};
pub use domain_gate::DomainGate;
pub use executor::JobExecutor;
pub use fanout::TimelineFanout;
pub use handler::{InboxState, router};
pub use jobs::{DeliverJob, FanoutJob, InMemoryJobQueue, InboxJob, Job, JobQueue, NotifyJob};
pub use notifications::Notifier;
pub use processor::{InboxProcessor, ProcessOutcome};
pub use resolver::{ActorResolver, ResolveError, StatusResolver};
pub use signature::HttpSigner;
pub use verifier::{InboundRequest, SignatureVerifier};
