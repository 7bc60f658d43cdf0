//! Transaction payloads and their binary encoding.
//!
//! A payload is encoded as one tag byte ([PayloadType]) followed by the RLP encoding of its body.
//! The transaction hash is the Keccak-256 of that encoding.

use num_traits::FromPrimitive;
use rlp_derive::{RlpDecodable, RlpEncodable};

use crate::common::{Addr, Bytes, Gas, Hash, NullableAddr, Wei};
use crate::errors::{ErrorCode, Exception};

#[derive(FromPrimitive, Copy, Clone, PartialEq, Eq, Debug)]
pub enum PayloadType {
    Send = 0x1,
    Call = 0x2,
}

#[derive(RlpDecodable, RlpEncodable, Clone, PartialEq, Eq, Debug)]
pub struct TxInput {
    pub address: Addr,
    pub amount: Wei,
}

#[derive(RlpDecodable, RlpEncodable, Clone, PartialEq, Eq, Debug)]
pub struct TxOutput {
    pub address: Addr,
    pub amount: Wei,
}

/// Plain value transfer between accounts.
#[derive(RlpDecodable, RlpEncodable, Clone, PartialEq, Eq, Debug)]
pub struct SendTx {
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

/// Contract call, or contract creation when there is no callee address.
#[derive(RlpDecodable, RlpEncodable, Clone, PartialEq, Eq, Debug)]
pub struct CallTx {
    pub input: TxInput,
    address: NullableAddr,
    pub gas_limit: Gas,
    pub fee: Wei,
    pub data: Bytes,
}

impl CallTx {
    pub fn new(
        input: TxInput, address: Option<Addr>, data: Bytes, fee: Wei,
        gas_limit: Gas,
    ) -> Self {
        Self {
            input,
            address: NullableAddr(address),
            gas_limit,
            fee,
            data,
        }
    }

    /// The callee, `None` for a contract creation.
    pub fn address(&self) -> Option<&Addr> {
        self.address.0.as_ref()
    }

    #[inline(always)]
    pub fn creates_contract(&self) -> bool {
        self.address.0.is_none()
    }
}

/// The closed set of transaction kinds.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Payload {
    Send(SendTx),
    Call(CallTx),
}

impl Payload {
    pub fn type_(&self) -> PayloadType {
        match self {
            Payload::Send(_) => PayloadType::Send,
            Payload::Call(_) => PayloadType::Call,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let body = match self {
            Payload::Send(tx) => rlp::encode(tx),
            Payload::Call(tx) => rlp::encode(tx),
        };
        let mut buff = Vec::with_capacity(body.len() + 1);
        buff.push(self.type_() as u8);
        buff.extend_from_slice(&body);
        buff
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Exception> {
        let (tag, body) = bytes.split_first().ok_or_else(|| {
            Exception::new(ErrorCode::InvalidPayload, "empty payload")
        })?;
        let rlp = rlp::Rlp::new(body);
        let invalid = |e: rlp::DecoderError| {
            exceptionf!(ErrorCode::InvalidPayload, "malformed payload: {}", e)
        };
        let kind = PayloadType::from_u8(*tag).ok_or_else(|| {
            exceptionf!(
                ErrorCode::InvalidPayload,
                "unknown payload type 0x{:02x}",
                tag
            )
        })?;
        // the item must span the whole body so that one payload has exactly
        // one encoding, and therefore one hash
        let info = rlp.payload_info().map_err(invalid)?;
        if info.total() != body.len() {
            return Err(exceptionf!(
                ErrorCode::InvalidPayload,
                "payload item is {} bytes but the body has {}",
                info.total(),
                body.len()
            ))
        }
        match kind {
            PayloadType::Send => {
                rlp.as_val().map(Payload::Send).map_err(invalid)
            }
            PayloadType::Call => {
                rlp.as_val().map(Payload::Call).map_err(invalid)
            }
        }
    }
}

/// A transaction as submitted to the executor: a payload and its hash.
#[derive(Clone, Debug)]
pub struct Tx {
    payload: Payload,
    tx_hash: Hash,
}

impl std::ops::Deref for Tx {
    type Target = Payload;
    fn deref(&self) -> &Payload {
        &self.payload
    }
}

impl Tx {
    pub fn new(payload: Payload) -> Self {
        let tx_hash = Hash::hash(&payload.encode());
        Self { payload, tx_hash }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Exception> {
        Ok(Self {
            payload: Payload::decode(bytes)?,
            tx_hash: Hash::hash(bytes),
        })
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn hash(&self) -> &Hash {
        &self.tx_hash
    }
}

impl From<CallTx> for Tx {
    fn from(tx: CallTx) -> Self {
        Tx::new(Payload::Call(tx))
    }
}

impl From<SendTx> for Tx {
    fn from(tx: SendTx) -> Self {
        Tx::new(Payload::Send(tx))
    }
}
