//! This crate inspects the X.509 certificates which admission webhooks carry
//! in their `caBundle`. The bundle is used by the API server to verify the
//! TLS identity of the webhook server, so once the certificate expires every
//! call to the webhook fails.
//!
//! The main entry point is [`remaining_validity`], which decodes a PEM blob
//! and returns how much time is left until the `notAfter` timestamp of the
//! certificate.
//!
//! ## Feature Flags
//!
//! - `test-util`: Exposes the [`testing`] module, which can generate
//!   self-signed certificates with arbitrary validity periods.
//!
//! ## References
//!
//! - <https://datatracker.ietf.org/doc/html/rfc5280#section-4.1.2.5>
//! - <https://kubernetes.io/docs/reference/access-authn-authz/extensible-admission-controllers/#contacting-the-webhook>
use std::time::SystemTime;

use jiff::SignedDuration;
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::{debug, instrument};
use x509_cert::{Certificate, der::DecodePem};

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

/// Error variants which can be encountered when inspecting a CA bundle.
#[derive(Debug, Snafu)]
pub enum DecodeError {
    #[snafu(display("failed to read PEM-encoded certificate"))]
    ReadCertificate { source: x509_cert::der::Error },

    #[snafu(display("the CA bundle does not contain a PEM-encoded certificate"))]
    MissingCertificate,

    #[snafu(display("failed to compute the time span until {not_after}"))]
    ComputeRemaining {
        source: jiff::Error,
        not_after: x509_cert::time::Time,
    },
}

/// The outcome of inspecting a (possibly absent) CA bundle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemainingValidity {
    /// Time left until the certificate expires. This is negative if the
    /// certificate already expired.
    Remaining(SignedDuration),

    /// The webhook has no CA bundle configured.
    NoCertificate,
}

impl RemainingValidity {
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Remaining(remaining) if remaining.is_negative())
    }
}

/// Computes the time left between `now` and the `notAfter` timestamp of the
/// certificate contained in `pem`.
///
/// An empty bundle is not an error, it results in
/// [`RemainingValidity::NoCertificate`]. If the bundle contains a chain,
/// only the first certificate is inspected. Text before and after that
/// certificate is ignored.
#[instrument(skip(pem), fields(pem.len = pem.len()))]
pub fn remaining_validity(pem: &[u8], now: SystemTime) -> Result<RemainingValidity, DecodeError> {
    if pem.trim_ascii().is_empty() {
        return Ok(RemainingValidity::NoCertificate);
    }

    let certificate = first_certificate(pem)?;
    let not_after = certificate.tbs_certificate.validity.not_after;

    let remaining = SignedDuration::system_until(now, not_after.to_system_time())
        .context(ComputeRemainingSnafu { not_after })?;

    debug!(
        certificate.subject = %certificate.tbs_certificate.subject,
        certificate.not_after = %not_after,
        %remaining,
        "inspected CA bundle certificate"
    );

    Ok(RemainingValidity::Remaining(remaining))
}

const PEM_BEGIN: &[u8] = b"-----BEGIN CERTIFICATE-----";
const PEM_END: &[u8] = b"-----END CERTIFICATE-----";

fn first_certificate(pem: &[u8]) -> Result<Certificate, DecodeError> {
    let block = first_pem_block(pem).context(MissingCertificateSnafu)?;
    Certificate::from_pem(block).context(ReadCertificateSnafu)
}

/// Returns the first `CERTIFICATE` block of `pem`, including both
/// encapsulation boundaries.
fn first_pem_block(pem: &[u8]) -> Option<&[u8]> {
    let start = find(pem, PEM_BEGIN)?;
    let len = find(pem.get(start..)?, PEM_END)? + PEM_END.len();
    pem.get(start..start + len)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
