//! Collects the admission webhooks registered in a Kubernetes cluster into
//! flat, per-webhook reports.
//!
//! The [`aggregator::WebhookAggregator`] reads all mutating and validating
//! webhook configurations through a [`client::ClusterApi`] and resolves every
//! webhook entry into a [`report::WebhookReport`]:
//!
//! - the namespaces currently selected by the webhook's namespace selector,
//! - the Service the webhook calls, and whether it actually exists,
//! - how long the certificate in the webhook's CA bundle stays valid.
//!
//! Problems with a single webhook never abort the collection, they are
//! recorded on the affected report instead.
pub mod aggregator;
pub mod cli;
pub mod client;
pub mod namespace;
pub mod render;
pub mod report;
pub mod service;
pub mod webhook;
