//! Cryptographic helpers for values exposed in public URLs

pub mod shop_id;

pub use shop_id::{CodecError, ShopIdCodec};
