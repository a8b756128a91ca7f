//! Canonical RLP wire codecs for headers, blocks, bodies and payloads.
//!
//! Field order is fixed and enforced by tests. Blocks keep two legacy null
//! slots between header and payload for positional compatibility with an
//! ancestor format that carried transactions and uncles at the block level;
//! decoders accept non-null legacy bodies but the node never writes
//! anything but empty lists there.

use alloy_rlp::{BufMut, Decodable, Encodable, EMPTY_LIST_CODE};

use crate::{
    aliases::{Address, BlockHash, Bloom, Bytes, B256, U256},
    header::{Block, Body, Header},
    payload::ExecutionPayload,
};

/// Splits an RLP list payload into raw per-element slices, headers included.
pub(crate) fn split_elements(mut payload: &[u8]) -> Result<Vec<&[u8]>, alloy_rlp::Error> {
    let mut elements = Vec::new();
    while !payload.is_empty() {
        let remaining = payload;
        let header = alloy_rlp::Header::decode(&mut payload)?;
        if payload.len() < header.payload_length {
            return Err(alloy_rlp::Error::InputTooShort);
        }
        payload = &payload[header.payload_length..];
        let consumed = remaining.len() - payload.len();
        elements.push(&remaining[..consumed]);
    }
    Ok(elements)
}

fn decode_list_payload<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], alloy_rlp::Error> {
    let header = alloy_rlp::Header::decode(buf)?;
    if !header.list {
        return Err(alloy_rlp::Error::UnexpectedString);
    }
    if buf.len() < header.payload_length {
        return Err(alloy_rlp::Error::InputTooShort);
    }
    let payload = &buf[..header.payload_length];
    *buf = &buf[header.payload_length..];
    Ok(payload)
}

// --- Header ---------------------------------------------------------------

fn header_payload_length(header: &Header, extra: &[u8]) -> usize {
    let nonce = header.nonce.to_be_bytes();
    header.parent_hash.length() +
        header.sha3_uncles.length() +
        header.miner.length() +
        header.state_root.length() +
        header.tx_root.length() +
        header.receipts_root.length() +
        header.logs_bloom.length() +
        header.difficulty.length() +
        header.number.length() +
        header.gas_limit.length() +
        header.gas_used.length() +
        header.timestamp.length() +
        extra.length() +
        header.mix_hash.length() +
        nonce.as_slice().length() +
        header.payload_hash.length()
}

/// Encodes the 16 header fields with a substituted `extraData`, which is
/// how the seal-erased hashing preimage is produced.
pub(crate) fn encode_header_with_extra(header: &Header, extra: &[u8], out: &mut Vec<u8>) {
    let payload_length = header_payload_length(header, extra);
    alloy_rlp::Header { list: true, payload_length }.encode(out);

    header.parent_hash.encode(out);
    header.sha3_uncles.encode(out);
    header.miner.encode(out);
    header.state_root.encode(out);
    header.tx_root.encode(out);
    header.receipts_root.encode(out);
    header.logs_bloom.encode(out);
    header.difficulty.encode(out);
    header.number.encode(out);
    header.gas_limit.encode(out);
    header.gas_used.encode(out);
    header.timestamp.encode(out);
    extra.encode(out);
    header.mix_hash.encode(out);
    header.nonce.to_be_bytes().as_slice().encode(out);
    header.payload_hash.encode(out);
}

impl Encodable for Header {
    fn encode(&self, out: &mut dyn BufMut) {
        let mut buf = Vec::new();
        encode_header_with_extra(self, self.extra_data.as_ref(), &mut buf);
        out.put_slice(&buf);
    }

    fn length(&self) -> usize {
        let payload_length = header_payload_length(self, self.extra_data.as_ref());
        payload_length + alloy_rlp::length_of_length(payload_length)
    }
}

impl Decodable for Header {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let mut payload = decode_list_payload(buf)?;
        let b = &mut payload;

        let parent_hash = BlockHash::decode(b)?;
        let sha3_uncles = B256::decode(b)?;
        let miner = Address::decode(b)?;
        let state_root = B256::decode(b)?;
        let tx_root = B256::decode(b)?;
        let receipts_root = B256::decode(b)?;
        let logs_bloom = Bloom::decode(b)?;
        let difficulty = u64::decode(b)?;
        let number = u64::decode(b)?;
        let gas_limit = u64::decode(b)?;
        let gas_used = u64::decode(b)?;
        let timestamp = u64::decode(b)?;
        let extra_data = Bytes::decode(b)?;
        let mix_hash = B256::decode(b)?;
        let nonce = decode_nonce(b)?;
        let payload_hash = BlockHash::decode(b)?;

        if !payload.is_empty() {
            return Err(alloy_rlp::Error::Custom("trailing bytes after header fields"));
        }

        let mut header = Header {
            parent_hash,
            sha3_uncles,
            miner,
            state_root,
            tx_root,
            receipts_root,
            logs_bloom,
            difficulty,
            number,
            gas_limit,
            gas_used,
            timestamp,
            extra_data,
            mix_hash,
            nonce,
            hash: BlockHash::ZERO,
            payload_hash,
        };
        header.compute_hash();
        Ok(header)
    }
}

/// The nonce travels as an 8-byte big-endian string; shorter (minimal)
/// encodings from foreign encoders are accepted.
fn decode_nonce(buf: &mut &[u8]) -> alloy_rlp::Result<u64> {
    let raw = Bytes::decode(buf)?;
    if raw.len() > 8 {
        return Err(alloy_rlp::Error::Overflow);
    }
    let mut padded = [0u8; 8];
    padded[8 - raw.len()..].copy_from_slice(&raw);
    Ok(u64::from_be_bytes(padded))
}

// --- Execution payload ----------------------------------------------------

fn payload_rlp_length(payload: &ExecutionPayload) -> usize {
    payload.parent_hash.length() +
        payload.fee_recipient.length() +
        payload.state_root.length() +
        payload.receipts_root.length() +
        payload.logs_bloom.length() +
        payload.number.length() +
        payload.gas_limit.length() +
        payload.gas_used.length() +
        payload.timestamp.length() +
        payload.extra_data.length() +
        payload.base_fee_per_gas.length() +
        payload.block_hash.length() +
        payload.transactions.length()
}

impl Encodable for ExecutionPayload {
    fn encode(&self, out: &mut dyn BufMut) {
        // prev_randao is Engine-API-only; the wire form is 13 fields.
        let payload_length = payload_rlp_length(self);
        alloy_rlp::Header { list: true, payload_length }.encode(out);

        self.parent_hash.encode(out);
        self.fee_recipient.encode(out);
        self.state_root.encode(out);
        self.receipts_root.encode(out);
        self.logs_bloom.encode(out);
        self.number.encode(out);
        self.gas_limit.encode(out);
        self.gas_used.encode(out);
        self.timestamp.encode(out);
        self.extra_data.encode(out);
        self.base_fee_per_gas.encode(out);
        self.block_hash.encode(out);
        self.transactions.encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = payload_rlp_length(self);
        payload_length + alloy_rlp::length_of_length(payload_length)
    }
}

impl Decodable for ExecutionPayload {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let mut payload = decode_list_payload(buf)?;
        let b = &mut payload;

        let decoded = ExecutionPayload {
            parent_hash: B256::decode(b)?,
            fee_recipient: Address::decode(b)?,
            state_root: B256::decode(b)?,
            receipts_root: B256::decode(b)?,
            logs_bloom: Bloom::decode(b)?,
            prev_randao: B256::ZERO,
            number: u64::decode(b)?,
            gas_limit: u64::decode(b)?,
            gas_used: u64::decode(b)?,
            timestamp: u64::decode(b)?,
            extra_data: Bytes::decode(b)?,
            base_fee_per_gas: U256::decode(b)?,
            block_hash: BlockHash::decode(b)?,
            transactions: Vec::<Bytes>::decode(b)?,
        };

        if !payload.is_empty() {
            return Err(alloy_rlp::Error::Custom("trailing bytes after payload fields"));
        }
        Ok(decoded)
    }
}

// --- Block / body ---------------------------------------------------------

impl Encodable for Block {
    fn encode(&self, out: &mut dyn BufMut) {
        // [header, nullArray, nullArray, payload]
        let payload_length = self.header.length() + 2 + self.payload.length();
        alloy_rlp::Header { list: true, payload_length }.encode(out);
        self.header.encode(out);
        out.put_u8(EMPTY_LIST_CODE);
        out.put_u8(EMPTY_LIST_CODE);
        self.payload.encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.header.length() + 2 + self.payload.length();
        payload_length + alloy_rlp::length_of_length(payload_length)
    }
}

impl Decodable for Block {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let payload = decode_list_payload(buf)?;
        let elements = split_elements(payload)?;

        // Legacy three-element blocks collapse the two null slots into one.
        let (header_raw, payload_raw) = match elements.len() {
            4 => (elements[0], elements[3]),
            3 => (elements[0], elements[2]),
            _ => return Err(alloy_rlp::Error::Custom("unexpected block element count")),
        };

        Ok(Block {
            header: Header::decode(&mut &header_raw[..])?,
            payload: ExecutionPayload::decode(&mut &payload_raw[..])?,
        })
    }
}

impl Encodable for Body {
    fn encode(&self, out: &mut dyn BufMut) {
        // [nullArray, nullArray, payload]
        let payload_length = 2 + self.payload.length();
        alloy_rlp::Header { list: true, payload_length }.encode(out);
        out.put_u8(EMPTY_LIST_CODE);
        out.put_u8(EMPTY_LIST_CODE);
        self.payload.encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = 2 + self.payload.length();
        payload_length + alloy_rlp::length_of_length(payload_length)
    }
}

impl Decodable for Body {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let payload = decode_list_payload(buf)?;
        let elements = split_elements(payload)?;
        let payload_raw = match elements.len() {
            3 => elements[2],
            2 => elements[1],
            _ => return Err(alloy_rlp::Error::Custom("unexpected body element count")),
        };
        Ok(Body { payload: ExecutionPayload::decode(&mut &payload_raw[..])? })
    }
}
