//! 细胞标识符编解码.
//!
//! 分割流程使用 `PREFIX-SUFFIX` 形式的文本标识符, 其中 `PREFIX` 是字母表
//! `a..=p` 上的字符串, 每个字符一一对应一个十六进制位 (`a -> 0`, `b -> 1`, ...,
//! `p -> f`); `SUFFIX` 是十进制的数据集分区号.
//!
//! 注意: 数组行使用的稠密数值 id 与本模块无关, 它只在抽取阶段按顺序分配.
//! 本模块仅用于和原始文本标识符空间互相对照 (例如按数值 id 关联分组表).

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Explorer 使用的标识符前缀宽度.
pub const VIEWER_PREFIX_WIDTH: usize = 8;

/// 前缀字母表. 第 `i` 个字符代表十六进制数 `i`.
const ALPHABET: [u8; 16] = *b"abcdefghijklmnop";

/// 前缀与后缀之间的分隔符.
const SEPARATOR: char = '-';

/// 解码错误. 只影响出错的那一个标识符.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// 缺少 `-` 分隔符.
    #[error("identifier `{0}` has no `-` separator")]
    MissingSeparator(String),

    /// 前缀中存在字母表以外的字符.
    #[error("symbol `{symbol}` of identifier `{id}` is outside `a..=p`")]
    UnknownSymbol {
        /// 出错的字符.
        symbol: char,
        /// 完整标识符.
        id: String,
    },

    /// 前缀为空.
    #[error("identifier `{0}` has an empty prefix")]
    EmptyPrefix(String),

    /// 前缀对应的数值超出 `u32`.
    #[error("prefix of identifier `{0}` does not fit in 32 bits")]
    PrefixOverflow(String),

    /// 后缀不是十进制整数.
    #[error("suffix of identifier `{0}` is not a decimal number")]
    InvalidSuffix(String),
}

/// 解码后的数值标识符.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId {
    /// 前缀对应的数值.
    pub value: u32,

    /// 数据集分区号.
    pub suffix: u32,
}

impl CellId {
    /// 初始化.
    #[inline]
    pub const fn new(value: u32, suffix: u32) -> Self {
        Self { value, suffix }
    }

    /// 以给定前缀宽度编码回文本标识符.
    #[inline]
    pub fn encode(&self, width: usize) -> String {
        encode(self.value, self.suffix, width)
    }
}

impl FromStr for CellId {
    type Err = DecodeError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s)
    }
}

/// 以 Explorer 的前缀宽度输出.
impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode(VIEWER_PREFIX_WIDTH))
    }
}

/// 字母表字符 -> 十六进制数值.
#[inline]
fn symbol_to_nibble(c: char) -> Option<u32> {
    match c {
        'a'..='p' => Some(c as u32 - 'a' as u32),
        _ => None,
    }
}

/// 将 `PREFIX-SUFFIX` 解码为数值标识符.
pub fn decode(id: &str) -> Result<CellId, DecodeError> {
    let (prefix, suffix) = id
        .split_once(SEPARATOR)
        .ok_or_else(|| DecodeError::MissingSeparator(id.to_owned()))?;

    if prefix.is_empty() {
        return Err(DecodeError::EmptyPrefix(id.to_owned()));
    }

    let mut value = 0u32;
    for symbol in prefix.chars() {
        let nibble = symbol_to_nibble(symbol).ok_or_else(|| DecodeError::UnknownSymbol {
            symbol,
            id: id.to_owned(),
        })?;
        value = value
            .checked_mul(16)
            .and_then(|v| v.checked_add(nibble))
            .ok_or_else(|| DecodeError::PrefixOverflow(id.to_owned()))?;
    }

    let suffix = suffix
        .parse::<u32>()
        .map_err(|_| DecodeError::InvalidSuffix(id.to_owned()))?;

    Ok(CellId { value, suffix })
}

/// 将数值编码为 `PREFIX-SUFFIX`.
///
/// 前缀至少占 `width` 个字符, 不足时在左侧以 `a` (即 0) 补齐.
pub fn encode(value: u32, suffix: u32, width: usize) -> String {
    let hex = format!("{value:0width$x}");
    let mut ans = String::with_capacity(hex.len() + 4);
    for digit in hex.bytes() {
        // `{:x}` 只输出 `0-9a-f`.
        let nibble = (digit as char).to_digit(16).unwrap_or_default();
        ans.push(ALPHABET[nibble as usize] as char);
    }
    ans.push(SEPARATOR);
    ans.push_str(&suffix.to_string());
    ans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_known_value() {
        // c -> 2, d -> 3, e -> 4.
        let id = decode("cde-12").unwrap();
        assert_eq!(id.value, 0x234);
        assert_eq!(id.value, 564);
        assert_eq!(id.suffix, 12);
    }

    #[test]
    fn test_roundtrip_keeps_prefix_symbols() {
        let id = decode("abc-7").unwrap();
        assert_eq!(id, CellId::new(0x012, 7));
        assert_eq!(id.encode(3), "abc-7");

        let id = decode("ffkkbpoa-1").unwrap();
        assert_eq!(id.to_string(), "ffkkbpoa-1");
    }

    #[test]
    fn test_full_alphabet() {
        let id = decode("abcdefgh-1").unwrap();
        assert_eq!(id.value, 0x0123_4567);
        let id = decode("ijklmnop-1").unwrap();
        assert_eq!(id.value, 0x89ab_cdef);
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(
            decode("abc"),
            Err(DecodeError::MissingSeparator("abc".to_string()))
        );
        assert_eq!(
            decode("abz-1"),
            Err(DecodeError::UnknownSymbol {
                symbol: 'z',
                id: "abz-1".to_string()
            })
        );
        assert!(matches!(decode("-1"), Err(DecodeError::EmptyPrefix(_))));
        assert!(matches!(decode("abc-x"), Err(DecodeError::InvalidSuffix(_))));
        assert!(matches!(decode("abc-1-2"), Err(DecodeError::InvalidSuffix(_))));
        assert!(matches!(
            decode("ppppppppp-1"),
            Err(DecodeError::PrefixOverflow(_))
        ));
    }

    #[test]
    fn test_parse_via_from_str() {
        let id: CellId = "ba-3".parse().unwrap();
        assert_eq!(id, CellId::new(16, 3));
    }
}
