//! Identifier generation and record encoding

use crate::error::OrderError;
use bech32::Bech32m;
use uuid7::uuid7;

pub const ORDER_HRP: &str = "order_";
pub const SERVICE_HRP: &str = "svc_";

// construct a unique, time ordered id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

pub(crate) fn new_id(hrp: &str) -> Result<String, OrderError> {
    new_uuid_to_bech32(hrp).map_err(|e| OrderError::Identifier(e.to_string()))
}

pub(crate) fn to_cbor<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>, OrderError> {
    minicbor::to_vec(value).map_err(|e| OrderError::Codec(e.to_string()))
}

pub(crate) fn from_cbor<T>(bytes: &[u8]) -> Result<T, OrderError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    minicbor::decode(bytes).map_err(|e| OrderError::Codec(e.to_string()))
}
