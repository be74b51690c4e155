// ERC20 read surface used for verification
//
// Only `balanceOf` and `decimals` are needed. Return data is read as the first
// 32-byte word so tokens with loose ABI encoders still decode.

use crate::error::{OverrideError, Result};
use crate::node::ChainNode;
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};

sol! {
    #[derive(Debug)]
    function balanceOf(address account) external view returns (uint256);

    #[derive(Debug)]
    function decimals() external view returns (uint8);
}

/// Calldata for `balanceOf(account)`.
pub fn balance_of_calldata(account: Address) -> Bytes {
    balanceOfCall { account }.abi_encode().into()
}

/// Calldata for `decimals()`.
pub fn decimals_calldata() -> Bytes {
    decimalsCall {}.abi_encode().into()
}

/// First 32-byte word of return data as an unsigned integer.
pub fn decode_uint_word(data: &[u8]) -> Option<U256> {
    let word = data.get(..32)?;
    Some(U256::from_be_slice(word))
}

/// Query `balanceOf(account)` on `token` through the node.
pub async fn balance_of<N: ChainNode>(node: &N, token: Address, account: Address) -> Result<U256> {
    let data = node.call(token, balance_of_calldata(account)).await?;
    decode_uint_word(&data).ok_or(OverrideError::MalformedBalance {
        token,
        account,
        len: data.len(),
    })
}

/// Query `decimals()` on `token`. `None` if the call fails or the value does not fit a `u8`.
pub async fn decimals<N: ChainNode>(node: &N, token: Address) -> Option<u8> {
    let data = node.call(token, decimals_calldata()).await.ok()?;
    let value = decode_uint_word(&data)?;
    u8::try_from(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn balance_of_selector_and_padding() {
        let holder = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        let data = balance_of_calldata(holder);
        assert_eq!(data.len(), 36);
        assert_eq!(&data[..4], &[0x70, 0xa0, 0x82, 0x31]);
        assert_eq!(&data[4..16], &[0u8; 12]);
        assert_eq!(&data[16..36], holder.as_slice());
    }

    #[test]
    fn decimals_selector() {
        assert_eq!(decimals_calldata().as_ref(), &[0x31, 0x3c, 0xe5, 0x67]);
    }

    #[test]
    fn decode_reads_first_word_only() {
        let mut data = vec![0u8; 64];
        data[31] = 42;
        data[63] = 99;
        assert_eq!(decode_uint_word(&data), Some(U256::from(42)));
    }

    #[test]
    fn decode_rejects_short_data() {
        assert_eq!(decode_uint_word(&[]), None);
        assert_eq!(decode_uint_word(&[1u8; 31]), None);
    }
}
