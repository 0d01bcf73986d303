// Path: crates/networking/src/message.rs

//! Wire envelopes for the push-note and endorsement channels.
//!
//! Each gossip channel carries exactly one message kind; the envelope holds
//! the canonical payload bytes untouched so a relaying node never has to
//! re-encode what it did not produce.

use gitmesh_types::codec;
use gitmesh_types::error::PushError;
use gitmesh_types::push::{Endorsement, PushNote};
use parity_scale_codec::{Decode, Encode};

/// A push note as it travels on its gossip channel.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct PushNoteMessage(pub Vec<u8>);

impl PushNoteMessage {
    /// Wraps a note in its canonical encoding.
    pub fn from_note(note: &PushNote) -> Result<Self, PushError> {
        Ok(Self(codec::to_bytes_canonical(note)))
    }

    /// Decodes the carried note.
    pub fn note(&self) -> Result<PushNote, PushError> {
        codec::from_bytes_canonical(&self.0).map_err(PushError::BadEncoding)
    }
}

/// An endorsement as it travels on its gossip channel.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct EndorsementMessage(pub Vec<u8>);

impl EndorsementMessage {
    /// Wraps an endorsement in its canonical encoding.
    pub fn from_endorsement(endorsement: &Endorsement) -> Result<Self, PushError> {
        Ok(Self(codec::to_bytes_canonical(endorsement)))
    }

    /// Decodes the carried endorsement.
    pub fn endorsement(&self) -> Result<Endorsement, PushError> {
        codec::from_bytes_canonical(&self.0).map_err(PushError::BadEncoding)
    }
}
