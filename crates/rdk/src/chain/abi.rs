//! Minimal Solidity ABI codec
//!
//! Covers the shapes the registry, ERC-20 and exchange contracts use: static words
//! (`address`, `uint256`, `bool`, `bytes32`) and dynamic arrays of them, plus the
//! `(bytes32,address[])[]` exchange listing returned by broker providers.

use rdk_common::amount::{self, Amount};
use rdk_common::Address;
use thiserror::Error;
use tiny_keccak::{Hasher, Keccak};

/// Size of an ABI word
pub const WORD: usize = 32;

/// ABI Error
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    /// Return data shorter than announced
    #[error("Return data too short: needed {needed} bytes, got {len}")]
    OutOfBounds {
        /// Bytes needed
        needed: usize,
        /// Bytes available
        len: usize,
    },
    /// Word is not a canonical bool
    #[error("Invalid bool word")]
    InvalidBool,
    /// Word is not a canonical address
    #[error("Invalid address word")]
    InvalidAddress,
    /// Offset or length does not fit in memory
    #[error("Invalid offset or length")]
    InvalidOffset,
    /// Identifier longer than 32 bytes
    #[error("`{0}` does not fit in bytes32")]
    Bytes32TooLong(String),
    /// Amount Error
    #[error(transparent)]
    Amount(#[from] amount::Error),
}

impl From<Error> for rdk_common::connector::Error {
    fn from(err: Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<Error> for rdk_common::Error {
    fn from(err: Error) -> Self {
        rdk_common::connector::Error::from(err).into()
    }
}

/// Keccak-256 hash
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    output
}

/// 4-byte function selector of a canonical signature such as `isRegistered(address)`
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut sel = [0u8; 4];
    sel.copy_from_slice(&hash[..4]);
    sel
}

/// Right padded UTF-8 `bytes32`
pub fn bytes32_from_str(value: &str) -> Result<[u8; 32], Error> {
    let bytes = value.as_bytes();
    if bytes.len() > WORD {
        return Err(Error::Bytes32TooLong(value.to_owned()));
    }

    let mut word = [0u8; 32];
    word[..bytes.len()].copy_from_slice(bytes);
    Ok(word)
}

/// ABI value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `address`
    Address(Address),
    /// `uint256`
    Uint(Amount),
    /// `bool`
    Bool(bool),
    /// `bytes32`
    FixedBytes32([u8; 32]),
    /// `T[]`
    Array(Vec<Token>),
}

impl Token {
    fn static_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        match self {
            Token::Address(address) => word[12..].copy_from_slice(address.as_bytes()),
            Token::Uint(amount) => word = amount.to_be_word(),
            Token::Bool(value) => word[31] = u8::from(*value),
            Token::FixedBytes32(bytes) => word = *bytes,
            Token::Array(_) => {}
        }
        word
    }
}

fn usize_word(value: usize) -> [u8; 32] {
    Amount::from(value as u128).to_be_word()
}

/// Encode a tuple of tokens (head/tail layout)
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_len = tokens.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        match token {
            Token::Array(items) => {
                head.extend_from_slice(&usize_word(head_len + tail.len()));
                tail.extend_from_slice(&usize_word(items.len()));
                tail.extend_from_slice(&encode(items));
            }
            token => head.extend_from_slice(&token.static_word()),
        }
    }

    head.extend_from_slice(&tail);
    head
}

/// Selector followed by the encoded arguments
pub fn encode_call(signature: &str, tokens: &[Token]) -> Vec<u8> {
    let mut data = selector(signature).to_vec();
    data.extend_from_slice(&encode(tokens));
    data
}

/// Encode a `(bytes32,address[])[]` value, the layout returned by broker exchange providers
pub fn encode_exchanges(exchanges: &[([u8; 32], Vec<Address>)]) -> Vec<u8> {
    let tuples: Vec<Vec<u8>> = exchanges
        .iter()
        .map(|(id, assets)| {
            encode(&[
                Token::FixedBytes32(*id),
                Token::Array(assets.iter().copied().map(Token::Address).collect()),
            ])
        })
        .collect();

    let mut data = usize_word(WORD).to_vec();
    data.extend_from_slice(&usize_word(tuples.len()));

    let mut offset = tuples.len() * WORD;
    for tuple in &tuples {
        data.extend_from_slice(&usize_word(offset));
        offset += tuple.len();
    }
    for tuple in tuples {
        data.extend_from_slice(&tuple);
    }

    data
}

fn word_at(data: &[u8], offset: usize) -> Result<&[u8], Error> {
    let end = offset.checked_add(WORD).ok_or(Error::InvalidOffset)?;
    data.get(offset..end).ok_or(Error::OutOfBounds {
        needed: end,
        len: data.len(),
    })
}

fn usize_at(data: &[u8], offset: usize) -> Result<usize, Error> {
    let word = word_at(data, offset)?;
    let value = Amount::from_be_word(word).map_err(|_| Error::InvalidOffset)?;
    usize::try_from(value.to_u128()).map_err(|_| Error::InvalidOffset)
}

/// Decode a `uint256` at word `index`
pub fn decode_uint(data: &[u8], index: usize) -> Result<Amount, Error> {
    Ok(Amount::from_be_word(word_at(data, index * WORD)?)?)
}

/// Decode a `uint256` at word `index`, clamping values that do not fit an [`Amount`]
pub fn decode_uint_saturating(data: &[u8], index: usize) -> Result<Amount, Error> {
    Ok(Amount::from_be_word_saturating(word_at(data, index * WORD)?)?)
}

/// Decode a `bool` at word `index`
pub fn decode_bool(data: &[u8], index: usize) -> Result<bool, Error> {
    bool_from_word(word_at(data, index * WORD)?)
}

/// Decode an `address` at word `index`
pub fn decode_address(data: &[u8], index: usize) -> Result<Address, Error> {
    address_from_word(word_at(data, index * WORD)?)
}

fn bool_from_word(word: &[u8]) -> Result<bool, Error> {
    if word[..31].iter().any(|b| *b != 0) {
        return Err(Error::InvalidBool);
    }

    match word[31] {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(Error::InvalidBool),
    }
}

fn address_from_word(word: &[u8]) -> Result<Address, Error> {
    if word[..12].iter().any(|b| *b != 0) {
        return Err(Error::InvalidAddress);
    }

    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&word[12..]);
    Ok(Address::new(bytes))
}

/// Words of a dynamic array whose offset sits at word `index`
fn array_words(data: &[u8], index: usize) -> Result<(usize, usize), Error> {
    let start = usize_at(data, index * WORD)?;
    let len = usize_at(data, start)?;
    let items_start = start.checked_add(WORD).ok_or(Error::InvalidOffset)?;

    // Bounds check up front so a bogus length cannot drive a huge allocation
    let end = len
        .checked_mul(WORD)
        .and_then(|size| size.checked_add(items_start))
        .ok_or(Error::InvalidOffset)?;
    if end > data.len() {
        return Err(Error::OutOfBounds {
            needed: end,
            len: data.len(),
        });
    }

    Ok((items_start, len))
}

/// Decode a `bool[]` whose offset sits at word `index`
pub fn decode_bool_array(data: &[u8], index: usize) -> Result<Vec<bool>, Error> {
    let (start, len) = array_words(data, index)?;
    (0..len)
        .map(|i| bool_from_word(word_at(data, start + i * WORD)?))
        .collect()
}

/// Decode an `address[]` whose offset sits at word `index`
pub fn decode_address_array(data: &[u8], index: usize) -> Result<Vec<Address>, Error> {
    let (start, len) = array_words(data, index)?;
    (0..len)
        .map(|i| address_from_word(word_at(data, start + i * WORD)?))
        .collect()
}

/// Decode a `uint256[]` whose offset sits at word `index`
pub fn decode_uint_array(data: &[u8], index: usize) -> Result<Vec<Amount>, Error> {
    let (start, len) = array_words(data, index)?;
    (0..len)
        .map(|i| Ok(Amount::from_be_word(word_at(data, start + i * WORD)?)?))
        .collect()
}

/// Decode a `(bytes32,address[])[]` whose offset sits at word `index`
pub fn decode_exchanges(data: &[u8], index: usize) -> Result<Vec<([u8; 32], Vec<Address>)>, Error> {
    let (items_start, len) = array_words(data, index)?;

    (0..len)
        .map(|i| {
            let tuple_start = items_start
                .checked_add(usize_at(data, items_start + i * WORD)?)
                .ok_or(Error::InvalidOffset)?;
            let tuple = data.get(tuple_start..).ok_or(Error::InvalidOffset)?;

            let mut exchange_id = [0u8; 32];
            exchange_id.copy_from_slice(word_at(tuple, 0)?);
            let assets = decode_address_array(tuple, 1)?;

            Ok((exchange_id, assets))
        })
        .collect()
}
