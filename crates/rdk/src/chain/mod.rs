//! Chain plumbing
//!
//! ABI codec, the JSON-RPC reader and the ERC-20 reads shared by the swap adapters.

use rdk_common::connector::{DynChainReader, TransactionRequest};
use rdk_common::{Address, Amount};

pub mod abi;
pub mod rpc;

pub use rpc::JsonRpcReader;

use self::abi::Token;

/// `allowance(owner, spender)` of an ERC-20 token.
///
/// Unlimited approvals (`type(uint256).max`) read as [`Amount::MAX`].
pub async fn erc20_allowance(
    reader: &DynChainReader,
    token: &Address,
    owner: &Address,
    spender: &Address,
) -> Result<Amount, rdk_common::connector::Error> {
    let data = abi::encode_call(
        "allowance(address,address)",
        &[Token::Address(*owner), Token::Address(*spender)],
    );
    let result = reader.call(token, &data).await?;
    Ok(abi::decode_uint_saturating(&result, 0)?)
}

/// `approve(spender, amount)` call on an ERC-20 token
pub fn erc20_approve(token: &Address, spender: &Address, amount: Amount) -> TransactionRequest {
    TransactionRequest::call(
        *token,
        abi::encode_call(
            "approve(address,uint256)",
            &[Token::Address(*spender), Token::Uint(amount)],
        ),
    )
}
