/*++

Licensed under the Apache-2.0 license.

File Name:

    session.rs

Abstract:

    File contains the uniform init / update / final session front-end
    over the digest, AEAD and RSA drivers.

--*/

use crate::aes::{AesKey, Direction};
use crate::ccm::CcmSession;
use crate::engine::SecurityEngine;
use crate::gcm::{GcmSession, GcmTag};
use crate::hal::SeHal;
use crate::rsa::{RsaExponent, RsaKey, RsaKeyLoad, RsaSession};
use crate::sha::{ShaAlg, ShaDigestOp};
use crate::{SeError, SeResult};

/// Algorithm family of a session
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SessionKind {
    Empty,
    Digest,
    Gcm,
    Ccm,
    Rsa,
}

/// Key for [`Session::set_key`]
#[derive(Debug, Copy, Clone)]
pub enum SessionKey<'a> {
    Aes(AesKey<'a>),
    Rsa(&'a RsaKey<'a>, RsaExponent),
}

/// Session state, one variant per algorithm family
#[derive(Default)]
pub enum Session<H: SeHal> {
    #[default]
    Empty,
    Digest(ShaDigestOp),
    Gcm(GcmSession),
    Ccm(CcmSession<H>),
    Rsa(RsaSession),
}

impl<H: SeHal> Session<H> {
    pub fn kind(&self) -> SessionKind {
        match self {
            Session::Empty => SessionKind::Empty,
            Session::Digest(_) => SessionKind::Digest,
            Session::Gcm(_) => SessionKind::Gcm,
            Session::Ccm(_) => SessionKind::Ccm,
            Session::Rsa(_) => SessionKind::Rsa,
        }
    }

    /// Start a digest. Whatever the session held before is released.
    pub fn init_digest(&mut self, se: &mut SecurityEngine<H>, alg: ShaAlg) {
        self.reset(se);
        *self = Session::Digest(ShaDigestOp::new(alg));
    }

    pub fn init_gcm(
        &mut self,
        se: &mut SecurityEngine<H>,
        direction: Direction,
        nonce: &[u8],
        tag_len: usize,
    ) -> SeResult<()> {
        self.reset(se);
        *self = Session::Gcm(GcmSession::new(direction, nonce, tag_len)?);
        Ok(())
    }

    pub fn init_ccm(
        &mut self,
        se: &mut SecurityEngine<H>,
        direction: Direction,
        nonce: &[u8],
        tag_len: usize,
        aad_len: usize,
        payload_len: usize,
    ) -> SeResult<()> {
        self.reset(se);
        *self = Session::Ccm(CcmSession::new(
            se,
            direction,
            nonce,
            tag_len,
            aad_len,
            payload_len,
        )?);
        Ok(())
    }

    pub fn init_rsa(
        &mut self,
        se: &mut SecurityEngine<H>,
        bits: u32,
        load: RsaKeyLoad,
    ) -> SeResult<()> {
        self.reset(se);
        *self = Session::Rsa(RsaSession::new(bits, load)?);
        Ok(())
    }

    pub fn set_key(&mut self, key: SessionKey) -> SeResult<()> {
        match (self, key) {
            (Session::Gcm(gcm), SessionKey::Aes(key)) => gcm.set_key(key),
            (Session::Ccm(ccm), SessionKey::Aes(key)) => ccm.set_key(key),
            (Session::Rsa(rsa), SessionKey::Rsa(key, exponent)) => rsa.set_key(key, exponent),
            (Session::Empty, _) => Err(SeError::DRIVER_SESSION_EMPTY),
            (Session::Digest(_), _) => Err(SeError::DRIVER_SESSION_OPERATION_NOT_SUPPORTED),
            _ => Err(SeError::DRIVER_SESSION_ALGORITHM_MISMATCH),
        }
    }

    pub fn update_aad(&mut self, se: &mut SecurityEngine<H>, aad: &[u8]) -> SeResult<()> {
        match self {
            Session::Gcm(gcm) => gcm.update_aad(se, aad),
            Session::Ccm(ccm) => ccm.update_aad(aad),
            Session::Empty => Err(SeError::DRIVER_SESSION_EMPTY),
            _ => Err(SeError::DRIVER_SESSION_OPERATION_NOT_SUPPORTED),
        }
    }

    /// # Returns
    ///
    /// Number of bytes written to `output`; always 0 for digests
    pub fn update(
        &mut self,
        se: &mut SecurityEngine<H>,
        input: &[u8],
        output: &mut [u8],
    ) -> SeResult<usize> {
        match self {
            Session::Digest(op) => op.update(se, input).map(|_| 0),
            Session::Gcm(gcm) => gcm.update(se, input, output),
            Session::Ccm(ccm) => ccm.update(),
            Session::Empty => Err(SeError::DRIVER_SESSION_EMPTY),
            Session::Rsa(_) => Err(SeError::DRIVER_SESSION_OPERATION_NOT_SUPPORTED),
        }
    }

    /// Finish the operation. The session is empty afterwards, whether or
    /// not the operation succeeded.
    ///
    /// `tag` is required for GCM and must be `None` otherwise.
    ///
    /// # Returns
    ///
    /// Number of bytes written to `output`
    pub fn finalize(
        &mut self,
        se: &mut SecurityEngine<H>,
        input: &[u8],
        output: &mut [u8],
        tag: Option<GcmTag>,
    ) -> SeResult<usize> {
        match (&*self, &tag) {
            (Session::Empty, _) => return Err(SeError::DRIVER_SESSION_EMPTY),
            (Session::Gcm(_), None) => return Err(SeError::DRIVER_SESSION_TAG_REQUIRED),
            (Session::Gcm(_), Some(_)) | (_, None) => {}
            (_, Some(_)) => return Err(SeError::DRIVER_SESSION_TAG_NOT_APPLICABLE),
        }

        match (core::mem::take(self), tag) {
            (Session::Digest(mut op), _) => op.finalize(se, input, output),
            (Session::Gcm(mut gcm), Some(tag)) => gcm.finalize(se, input, output, tag),
            (Session::Ccm(mut ccm), _) => {
                let result = ccm.finalize(se, input, output);
                if result.is_err() {
                    ccm.reset(se);
                }
                result
            }
            (Session::Rsa(mut rsa), _) => rsa.exponentiate(se, input, output),
            _ => Err(SeError::DRIVER_SESSION_EMPTY),
        }
    }

    /// Zero and release everything the session holds.
    pub fn reset(&mut self, se: &mut SecurityEngine<H>) {
        if let Session::Ccm(ccm) = self {
            ccm.reset(se);
        }
        *self = Session::Empty;
    }
}
