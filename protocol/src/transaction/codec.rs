//! RLP wire codec.
//!
//! ```text
//! wire    = rlp([major, minor, nonce, gas_price, gas, to, value, data, extra, v, r, s, origin])
//! hashed  = rlp([major, minor, nonce, gas_price, gas, to, value, data, extra, v, r, s])
//! signing = rlp([major, minor, nonce, gas_price, gas, to, value, data, extra (, chain_id, 0, 0)])
//! ```
//!
//! An absent recipient is encoded as the empty string. Decoding accepts a
//! trailing-origin-less list as well, since externally signed transactions
//! arrive without one.

use alloy_primitives::{Address, Bytes, U256};
use alloy_rlp::{BufMut, Decodable, Encodable, Header};

use super::builder::{Transaction, TxSignature};
use super::types::Category;
use super::verification::TransactionError;

fn recipient_slice(to: &Option<Address>) -> &[u8] {
    match to {
        Some(addr) => addr.as_slice(),
        None => &[],
    }
}

impl Transaction {
    fn unsigned_fields_length(&self) -> usize {
        self.category.major().as_u8().length()
            + self.category.minor().as_u8().length()
            + self.nonce.length()
            + self.gas_price.length()
            + self.gas.length()
            + recipient_slice(&self.to).length()
            + self.value.length()
            + self.data.length()
            + self.extra.length()
    }

    fn encode_unsigned_fields(&self, out: &mut dyn BufMut) {
        self.category.major().as_u8().encode(out);
        self.category.minor().as_u8().encode(out);
        self.nonce.encode(out);
        self.gas_price.encode(out);
        self.gas.encode(out);
        recipient_slice(&self.to).encode(out);
        self.value.encode(out);
        self.data.encode(out);
        self.extra.encode(out);
    }

    fn signature_fields_length(&self) -> usize {
        self.signature.v.length() + self.signature.r.length() + self.signature.s.length()
    }

    fn encode_signature_fields(&self, out: &mut dyn BufMut) {
        self.signature.v.encode(out);
        self.signature.r.encode(out);
        self.signature.s.encode(out);
    }

    /// RLP preimage of [`Transaction::hash`].
    pub(crate) fn rlp_for_hash(&self) -> Vec<u8> {
        let payload_length = self.unsigned_fields_length() + self.signature_fields_length();
        let mut out = Vec::with_capacity(payload_length + 8);
        Header {
            list: true,
            payload_length,
        }
        .encode(&mut out);
        self.encode_unsigned_fields(&mut out);
        self.encode_signature_fields(&mut out);
        out
    }

    /// RLP preimage of [`Transaction::signing_hash`].
    pub(crate) fn rlp_for_signing(&self, chain_id: Option<u64>) -> Vec<u8> {
        let mut payload_length = self.unsigned_fields_length();
        if let Some(id) = chain_id {
            payload_length += id.length() + 0u8.length() * 2;
        }
        let mut out = Vec::with_capacity(payload_length + 8);
        Header {
            list: true,
            payload_length,
        }
        .encode(&mut out);
        self.encode_unsigned_fields(&mut out);
        if let Some(id) = chain_id {
            id.encode(&mut out);
            0u8.encode(&mut out);
            0u8.encode(&mut out);
        }
        out
    }

    /// Wire encoding, origin tag included.
    pub fn encode_wire(&self) -> Bytes {
        let mut out = Vec::with_capacity(self.length());
        self.encode(&mut out);
        out.into()
    }

    /// Decodes a wire-encoded transaction. Trailing bytes are an error.
    pub fn decode_wire(raw: &[u8]) -> Result<Self, TransactionError> {
        let mut buf = raw;
        let tx = Self::decode(&mut buf).map_err(|e| TransactionError::Decode(e.to_string()))?;
        if !buf.is_empty() {
            return Err(TransactionError::Decode(format!(
                "{} trailing bytes after transaction",
                buf.len()
            )));
        }
        Ok(tx)
    }
}

impl Encodable for Transaction {
    fn encode(&self, out: &mut dyn BufMut) {
        let payload_length =
            self.unsigned_fields_length() + self.signature_fields_length() + self.origin.length();
        Header {
            list: true,
            payload_length,
        }
        .encode(out);
        self.encode_unsigned_fields(out);
        self.encode_signature_fields(out);
        self.origin.encode(out);
    }

    fn length(&self) -> usize {
        let payload_length =
            self.unsigned_fields_length() + self.signature_fields_length() + self.origin.length();
        payload_length + alloy_rlp::length_of_length(payload_length)
    }
}

impl Decodable for Transaction {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let header = Header::decode(buf)?;
        if !header.list {
            return Err(alloy_rlp::Error::UnexpectedString);
        }
        if buf.len() < header.payload_length {
            return Err(alloy_rlp::Error::InputTooShort);
        }
        let started = buf.len();

        let major = u8::decode(buf)?;
        let minor = u8::decode(buf)?;
        let category = Category::from_raw(major, minor)
            .map_err(|_| alloy_rlp::Error::Custom("unknown transaction category"))?;
        let nonce = u64::decode(buf)?;
        let gas_price = U256::decode(buf)?;
        let gas = u64::decode(buf)?;
        let to = match Bytes::decode(buf)? {
            raw if raw.is_empty() => None,
            raw if raw.len() == 20 => Some(Address::from_slice(&raw)),
            _ => return Err(alloy_rlp::Error::Custom("recipient must be 0 or 20 bytes")),
        };
        let value = U256::decode(buf)?;
        let data = Bytes::decode(buf)?;
        let extra = Bytes::decode(buf)?;
        let signature = TxSignature {
            v: u64::decode(buf)?,
            r: U256::decode(buf)?,
            s: U256::decode(buf)?,
        };

        let consumed = started - buf.len();
        let origin = if consumed < header.payload_length {
            Bytes::decode(buf)?
        } else {
            Bytes::new()
        };

        let consumed = started - buf.len();
        if consumed != header.payload_length {
            return Err(alloy_rlp::Error::ListLengthMismatch {
                expected: header.payload_length,
                got: consumed,
            });
        }

        Ok(Transaction {
            category,
            nonce,
            gas_price,
            gas,
            to,
            value,
            data,
            extra,
            signature,
            origin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::builder::TransactionBuilder;
    use crate::transaction::types::{TxMajor, TxMinor};
    use alloy_primitives::address;

    fn stock_tx() -> Transaction {
        let mut tx = TransactionBuilder::new(
            Category::new(TxMajor::Stock, TxMinor::StockTransfer).unwrap(),
        )
        .to(address!("1111111111111111111111111111111111111111"))
        .value(U256::from(150u64))
        .gas(90_000)
        .gas_price(U256::from(18_000_000_000u64))
        .nonce(42)
        .data(vec![0xde, 0xad])
        .extra(b"memo".to_vec())
        .build();
        tx.signature = TxSignature {
            v: 2709,
            r: U256::from(7u64),
            s: U256::from(9u64),
        };
        tx
    }

    #[test]
    fn wire_preserves_every_field() {
        let mut tx = stock_tx();
        tx.set_origin(b"192.168.1.10".to_vec());
        let decoded = Transaction::decode_wire(&tx.encode_wire()).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.hash(), tx.hash());
    }

    #[test]
    fn creation_has_empty_recipient() {
        let tx = TransactionBuilder::new(Category::NORMAL)
            .data(vec![0x60, 0x00])
            .gas(100_000)
            .build();
        let decoded = Transaction::decode_wire(&tx.encode_wire()).unwrap();
        assert_eq!(decoded.to, None);
    }

    #[test]
    fn accepts_missing_origin() {
        let tx = stock_tx();
        let raw = tx.rlp_for_hash();
        let decoded = Transaction::decode_wire(&raw).unwrap();
        assert_eq!(decoded.hash(), tx.hash());
        assert!(decoded.origin.is_empty());
    }

    #[test]
    fn encoded_length_matches() {
        let tx = stock_tx();
        assert_eq!(tx.encode_wire().len(), tx.length());
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut raw = stock_tx().encode_wire().to_vec();
        raw.push(0x00);
        match Transaction::decode_wire(&raw) {
            Err(TransactionError::Decode(msg)) => assert!(msg.contains("trailing")),
            other => panic!("expected Decode, got {:?}", other),
        }
    }

    #[test]
    fn rejects_truncated_input() {
        let raw = stock_tx().encode_wire();
        assert!(Transaction::decode_wire(&raw[..raw.len() - 3]).is_err());
    }

    #[test]
    fn rejects_non_list() {
        assert!(Transaction::decode_wire(&[0x83, b'a', b'b', b'c']).is_err());
    }

    #[test]
    fn rejects_unknown_category() {
        let mut tx = stock_tx();
        tx.category = Category::NORMAL;
        // Short payload, so the list header is one byte and the major follows.
        let mut raw = tx.encode_wire().to_vec();
        assert_eq!(raw[1], 0x80);
        raw[1] = 0x09;
        assert!(Transaction::decode_wire(&raw).is_err());
    }
}
