//! Validation helpers for certificate requirements and presented
//! certificates.

use crate::certificates::VerifiableCertificate;
use crate::error::AuthError;
use crate::types::RequestedCertificateSet;

/// Validate that a RequestedCertificateSet is properly formed. Used at
/// configuration time so a misconfigured requirement set fails fast.
pub fn validate_requested_certificate_set(
    req: &RequestedCertificateSet,
) -> Result<(), AuthError> {
    if req.certifiers.is_empty() {
        return Err(AuthError::Internal("certifiers list is empty".into()));
    }

    if req.certificate_types.is_empty() {
        return Err(AuthError::Internal("certificate types map is empty".into()));
    }

    for (cert_type, fields) in &req.certificate_types {
        if cert_type.is_empty() {
            return Err(AuthError::Internal("empty certificate type specified".into()));
        }
        if fields.is_empty() {
            return Err(AuthError::Internal(format!(
                "no fields specified for certificate type: {}",
                cert_type
            )));
        }
    }

    Ok(())
}

/// Envelope-level validation of presented certificates: each must name the
/// sender as its subject, and when a requirement set is configured the
/// certifier and type must come from it. Attribute semantics (is the age
/// high enough, is the proof fresh) stay with the application callback.
pub fn validate_certificates(
    sender_identity_key: &str,
    certificates: &[VerifiableCertificate],
    requirements: Option<&RequestedCertificateSet>,
) -> Result<(), AuthError> {
    if certificates.is_empty() {
        return Err(AuthError::Unauthorized("no certificates provided".into()));
    }

    for cert in certificates {
        if cert.certificate.subject != sender_identity_key {
            return Err(AuthError::Unauthorized(
                "certificate subject does not match sender identity key".into(),
            ));
        }

        if let Some(reqs) = requirements {
            if !reqs.certifiers.contains(&cert.certificate.certifier) {
                return Err(AuthError::Unauthorized(
                    "certificate not from a requested certifier".into(),
                ));
            }
            if !reqs.certificate_types.contains_key(&cert.certificate.cert_type) {
                return Err(AuthError::Unauthorized(format!(
                    "certificate type was not requested: {}",
                    cert.certificate.cert_type
                )));
            }
        }
    }

    Ok(())
}
