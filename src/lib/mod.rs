//! Client side of a three-proof transfer protocol.
//!
//! A user action produces three payloads (a WebAuthn signature assertion, an
//! image and a token transfer) that are broadcast in one transaction and then
//! proven against three contracts: a signature circuit and two VM programs.
//! This crate holds the felt codecs for those payloads, the balance
//! commitment, the proof-output decoder, the signature canonicalizer and the
//! orchestrator that proves and submits the three proofs.

pub mod adapters;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod decoder;
pub mod domain;
pub mod indexer;
pub mod orchestrator;
pub mod ports;
pub mod registry;
pub mod session;
