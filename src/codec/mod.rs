//! Semtech UDP wire format (§6): header framing, JSON body shapes, and the
//! encode/decode entry points C3 (Upstream Encoder) and C4 (Downstream Decoder).

pub mod downstream;
pub mod fields;
pub mod header;
pub mod rxpk;
pub mod txpk;
pub mod upstream;
