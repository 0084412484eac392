//! Helpers to generate throwaway certificates for tests.
//!
//! The certificates are self-signed with a fresh NIST P-256 ECDSA key and
//! carry an arbitrary validity period, which also allows creating already
//! expired certificates.
use std::time::SystemTime;

use p256::NistP256;
use rand_core::OsRng;
use snafu::{ResultExt, Snafu};
use x509_cert::{
    builder::{Builder, CertificateBuilder, Profile},
    der::{DecodePem, EncodePem, pem::LineEnding},
    name::Name,
    serial_number::SerialNumber,
    spki::{EncodePublicKey, SubjectPublicKeyInfoOwned},
    time::{Time, Validity},
};

/// The subject used for all generated test certificates.
pub const TEST_CERTIFICATE_SUBJECT: &str = "CN=kubectl-view-webhook test CA";

#[derive(Debug, Snafu)]
pub enum TestCertificateError {
    #[snafu(display("failed to convert {time:?} into a certificate timestamp"))]
    ParseValidity {
        source: x509_cert::der::Error,
        time: SystemTime,
    },

    #[snafu(display("failed to parse \"{TEST_CERTIFICATE_SUBJECT}\" as subject"))]
    ParseSubject { source: x509_cert::der::Error },

    #[snafu(display("failed to serialize public key as PEM"))]
    SerializePublicKey { source: x509_cert::spki::Error },

    #[snafu(display("failed to decode SPKI from PEM"))]
    DecodeSpkiFromPem { source: x509_cert::der::Error },

    #[snafu(display("failed to create certificate builder"))]
    CreateCertificateBuilder { source: x509_cert::builder::Error },

    #[snafu(display("failed to build certificate"))]
    BuildCertificate { source: x509_cert::builder::Error },

    #[snafu(display("failed to serialize certificate as PEM"))]
    SerializeCertificate { source: x509_cert::der::Error },
}

/// Creates a PEM-encoded, self-signed certificate which is valid between
/// `not_before` and `not_after`.
pub fn self_signed_pem(
    not_before: SystemTime,
    not_after: SystemTime,
) -> Result<String, TestCertificateError> {
    let validity = Validity {
        not_before: Time::try_from(not_before).context(ParseValiditySnafu { time: not_before })?,
        not_after: Time::try_from(not_after).context(ParseValiditySnafu { time: not_after })?,
    };
    let subject: Name = TEST_CERTIFICATE_SUBJECT
        .parse()
        .context(ParseSubjectSnafu)?;

    let signing_key = p256::ecdsa::SigningKey::random(&mut OsRng);
    let spki_pem = signing_key
        .verifying_key()
        .to_public_key_pem(LineEnding::LF)
        .context(SerializePublicKeySnafu)?;
    let spki = SubjectPublicKeyInfoOwned::from_pem(spki_pem.as_bytes())
        .context(DecodeSpkiFromPemSnafu)?;

    let serial_number = SerialNumber::from(rand::random::<u64>());

    let builder = CertificateBuilder::new(
        Profile::Root,
        serial_number,
        validity,
        subject,
        spki,
        &signing_key,
    )
    .context(CreateCertificateBuilderSnafu)?;

    builder
        .build::<ecdsa::der::Signature<NistP256>>()
        .context(BuildCertificateSnafu)?
        .to_pem(LineEnding::LF)
        .context(SerializeCertificateSnafu)
}
